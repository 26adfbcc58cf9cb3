//! `SimulatedBroker` (spec §4.4.2-§4.4.3): a per-strategy ledger generalized
//! from the teacher's `vault/paper_ledger.rs` (`VaultPaperLedger`) from
//! USDC/shares to cash/lots — running-average cost basis, cumulative fee
//! and slippage tracking, `apply_buy`/`apply_sell` returning actual filled
//! quantity.

use crate::engine::strategy::{Action, Fill};
use crate::error::BrokerError;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

const LOT_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy)]
pub enum OrderType {
    Market,
    Limit { limit_price: f64 },
}

#[derive(Debug, Clone, Serialize)]
pub struct Position {
    pub symbol: String,
    pub qty: i64,
    pub avg_price: f64,
    pub bought_date: NaiveDate,
    pub last_price: f64,
}

impl Position {
    /// A position acquired during session `d` cannot be sold before
    /// session `d+1` (spec §4.4.2).
    pub fn can_sell_today(&self, current_date: NaiveDate) -> bool {
        current_date > self.bought_date
    }

    pub fn cost_basis(&self) -> f64 {
        self.qty as f64 * self.avg_price
    }

    pub fn market_value(&self) -> f64 {
        self.qty as f64 * self.last_price
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.market_value() - self.cost_basis()
    }

    pub fn unrealized_pnl_pct(&self) -> f64 {
        let basis = self.cost_basis();
        if basis.abs() < 1e-9 {
            0.0
        } else {
            self.unrealized_pnl() / basis
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EquitySnapshot {
    pub date: NaiveDate,
    pub equity: f64,
    pub cash: f64,
    pub daily_pnl: f64,
    pub total_pnl: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionStats {
    pub trade_count: u64,
    pub reject_count: u64,
    pub total_fees: f64,
    pub total_slippage: f64,
}

pub struct SimulatedBroker {
    initial_cash: f64,
    cash: f64,
    positions: HashMap<String, Position>,
    slippage_bps: f64,
    fee_bps: f64,
    equity_curve: Vec<EquitySnapshot>,
    last_close_equity: f64,
    stats: ExecutionStats,
}

/// Sell sizing (spec §4.4.3, exact arithmetic): `r` is a proportion, never
/// divided by 100 again.
pub fn lot_sell_quantity(held_qty: i64, ratio: f64) -> i64 {
    let raw = held_qty as f64 * ratio;
    let mut q = ((raw / LOT_SIZE as f64).floor() as i64) * LOT_SIZE;
    if q < LOT_SIZE && raw > 0.0 {
        q = LOT_SIZE;
    }
    q.min(held_qty).max(0)
}

/// Buy sizing (spec §4.4.3, exact arithmetic).
pub fn lot_buy_quantity(cash: f64, ratio: f64, price: f64) -> i64 {
    if price <= 0.0 {
        return 0;
    }
    let raw = cash * ratio / price;
    let mut q = ((raw / LOT_SIZE as f64).floor() as i64) * LOT_SIZE;
    if q < LOT_SIZE && raw > 0.0 {
        q = LOT_SIZE;
    }
    q.max(0)
}

impl SimulatedBroker {
    pub fn new(initial_cash: f64, slippage_bps: f64, fee_bps: f64) -> Self {
        Self {
            initial_cash,
            cash: initial_cash,
            positions: HashMap::new(),
            slippage_bps,
            fee_bps,
            equity_curve: Vec::new(),
            last_close_equity: initial_cash,
            stats: ExecutionStats::default(),
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    /// Marks a position to the current tick price ahead of equity
    /// calculations; a no-op if the strategy holds nothing in `symbol`.
    pub fn mark(&mut self, symbol: &str, price: f64) {
        if let Some(pos) = self.positions.get_mut(symbol) {
            pos.last_price = price;
        }
    }

    pub fn equity(&self) -> f64 {
        self.cash + self.positions.values().map(Position::market_value).sum::<f64>()
    }

    /// A `Market` order fills immediately at `tick_price` plus slippage; a
    /// `Limit` order fills only when the opposing tick crosses the limit
    /// (spec §4.4.2).
    fn fill_price(&self, action: Action, tick_price: f64, order_type: OrderType) -> Option<f64> {
        match order_type {
            OrderType::Market => {
                let slip = tick_price * self.slippage_bps / 10_000.0;
                Some(match action {
                    Action::Buy => tick_price + slip,
                    Action::Sell => tick_price - slip,
                    Action::Hold => tick_price,
                })
            }
            OrderType::Limit { limit_price } => match action {
                Action::Buy if tick_price <= limit_price => Some(limit_price),
                Action::Sell if tick_price >= limit_price => Some(limit_price),
                _ => None,
            },
        }
    }

    pub fn buy(
        &mut self,
        symbol: &str,
        tick_price: f64,
        target_ratio: f64,
        order_type: OrderType,
        date: NaiveDate,
    ) -> Result<Option<Fill>, BrokerError> {
        if tick_price <= 0.0 {
            return Err(BrokerError::InvalidPrice(tick_price));
        }

        let Some(price) = self.fill_price(Action::Buy, tick_price, order_type) else {
            return Ok(None);
        };

        let qty = lot_buy_quantity(self.cash, target_ratio, price);
        if qty == 0 {
            return Ok(None);
        }

        let notional = qty as f64 * price;
        let fees = notional * self.fee_bps / 10_000.0;
        let needed = notional + fees;
        if needed > self.cash {
            self.stats.reject_count += 1;
            return Err(BrokerError::InsufficientCash {
                needed,
                available: self.cash,
            });
        }

        self.cash -= needed;
        self.stats.total_fees += fees;
        self.stats.trade_count += 1;

        let entry = self.positions.entry(symbol.to_string()).or_insert_with(|| Position {
            symbol: symbol.to_string(),
            qty: 0,
            avg_price: price,
            bought_date: date,
            last_price: price,
        });
        let new_qty = entry.qty + qty;
        entry.avg_price = (entry.avg_price * entry.qty as f64 + price * qty as f64) / new_qty as f64;
        entry.qty = new_qty;
        entry.bought_date = date;
        entry.last_price = price;

        self.record_snapshot(date);

        Ok(Some(Fill {
            symbol: symbol.to_string(),
            action: Action::Buy,
            quantity: qty,
            price,
        }))
    }

    pub fn sell(
        &mut self,
        symbol: &str,
        tick_price: f64,
        target_ratio: f64,
        order_type: OrderType,
        date: NaiveDate,
    ) -> Result<Option<Fill>, BrokerError> {
        if tick_price <= 0.0 {
            return Err(BrokerError::InvalidPrice(tick_price));
        }

        let held_qty = match self.positions.get(symbol) {
            Some(pos) => {
                if !pos.can_sell_today(date) {
                    return Err(BrokerError::T1Violation {
                        symbol: symbol.to_string(),
                        bought_date: pos.bought_date.to_string(),
                    });
                }
                pos.qty
            }
            None => return Ok(None),
        };

        let Some(price) = self.fill_price(Action::Sell, tick_price, order_type) else {
            return Ok(None);
        };

        let qty = lot_sell_quantity(held_qty, target_ratio);
        if qty == 0 {
            return Ok(None);
        }
        if qty > held_qty {
            return Err(BrokerError::ExceedsHolding {
                requested: qty,
                held: held_qty,
            });
        }

        let proceeds = qty as f64 * price;
        let fees = proceeds * self.fee_bps / 10_000.0;
        self.cash += proceeds - fees;
        self.stats.total_fees += fees;
        self.stats.trade_count += 1;

        let remaining = held_qty - qty;
        if remaining == 0 {
            self.positions.remove(symbol);
        } else if let Some(pos) = self.positions.get_mut(symbol) {
            pos.qty = remaining;
            pos.last_price = price;
        }

        self.record_snapshot(date);

        Ok(Some(Fill {
            symbol: symbol.to_string(),
            action: Action::Sell,
            quantity: qty,
            price,
        }))
    }

    /// Recorded after each fill and once per clock tick (spec §4.4.2).
    pub fn record_snapshot(&mut self, date: NaiveDate) {
        let equity = self.equity();
        let daily_pnl = equity - self.last_close_equity;
        let total_pnl = equity - self.initial_cash;
        self.equity_curve.push(EquitySnapshot {
            date,
            equity,
            cash: self.cash,
            daily_pnl,
            total_pnl,
        });
    }

    /// Called once at the end of each session to roll `last_close_equity`
    /// forward for the next day's `daily_pnl` baseline.
    pub fn on_day_end(&mut self) {
        self.last_close_equity = self.equity();
    }

    pub fn equity_curve(&self) -> &[EquitySnapshot] {
        &self.equity_curve
    }

    pub fn stats(&self) -> &ExecutionStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, day).unwrap()
    }

    #[test]
    fn sell_sizing_honours_intent_with_a_minimum_of_one_lot() {
        // spec example: r is a proportion, not divided by 100 again.
        assert_eq!(lot_sell_quantity(1000, 0.5), 500);
        assert_eq!(lot_sell_quantity(150, 0.1), 100); // raw=15 -> rounds up to one lot
        assert_eq!(lot_sell_quantity(1000, 0.0), 0);
        assert_eq!(lot_sell_quantity(50, 1.0), 50); // full residual close, may be < 1 lot
    }

    #[test]
    fn buy_sizing_floors_to_whole_lots() {
        assert_eq!(lot_buy_quantity(100_000.0, 0.5, 100.0), 500);
        assert_eq!(lot_buy_quantity(1_000.0, 0.05, 100.0), 100); // raw=0.5 -> rounds up to one lot
    }

    #[test]
    fn buy_then_sell_updates_cash_and_cost_basis() {
        let mut broker = SimulatedBroker::new(1_000_000.0, 0.0, 0.0);
        let fill = broker.buy("600519", 100.0, 0.5, OrderType::Market, d(2)).unwrap().unwrap();
        assert_eq!(fill.quantity, 5000);
        assert_eq!(broker.position("600519").unwrap().avg_price, 100.0);

        let err = broker.sell("600519", 101.0, 1.0, OrderType::Market, d(2)).unwrap_err();
        assert!(matches!(err, BrokerError::T1Violation { .. }));

        broker.sell("600519", 101.0, 1.0, OrderType::Market, d(3)).unwrap();
        assert!(broker.position("600519").is_none());
    }

    #[test]
    fn a_tiny_sell_ratio_against_a_large_position_still_fills_one_lot() {
        // The sizing formula itself honours intent: raw>0 always rounds up
        // to at least one lot rather than silently dropping the order.
        let mut broker = SimulatedBroker::new(1_000_000.0, 0.0, 0.0);
        broker.buy("600519", 100.0, 1.0, OrderType::Market, d(2)).unwrap();
        let fill = broker
            .sell("600519", 100.0, 0.001, OrderType::Market, d(3))
            .unwrap()
            .unwrap();
        assert_eq!(fill.quantity, 100);
    }
}
