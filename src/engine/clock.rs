//! The market clock (spec §4.4): drives N strategies in lockstep against
//! one tick per symbol per session, applying the stale-bar failure policy
//! from §4.4.6 before any strategy ever sees a bar.

use crate::engine::broker::{OrderType, SimulatedBroker};
use crate::engine::performance::StrategyPerformance;
use crate::engine::portfolio::{OtherPositionSummary, PortfolioState, PositionView};
use crate::engine::strategy::{Action, Strategy};
use crate::external::MarketBar;
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::warn;

/// A cached bar may be reused once with a stale flag; the very next
/// consecutive stale tick drops the symbol from the tick entirely (spec
/// §4.4.6).
const MAX_CONSECUTIVE_STALE_TICKS: u32 = 1;

struct StaleBar {
    bar: MarketBar,
    consecutive_stale_ticks: u32,
}

pub struct StrategySlot {
    pub strategy: Box<dyn Strategy>,
    pub broker: SimulatedBroker,
    pub performance: StrategyPerformance,
}

impl StrategySlot {
    pub fn new(strategy: Box<dyn Strategy>, broker: SimulatedBroker) -> Self {
        let performance = StrategyPerformance::new(strategy.id().to_string());
        Self { strategy, broker, performance }
    }
}

#[derive(Debug, Default)]
pub struct TickReport {
    pub symbols_ticked: Vec<String>,
    pub symbols_skipped: Vec<String>,
    pub symbols_stale: Vec<String>,
}

pub struct MarketClock {
    symbols: Vec<String>,
    stale_cache: HashMap<String, StaleBar>,
}

impl MarketClock {
    pub fn new(symbols: Vec<String>) -> Self {
        Self {
            symbols,
            stale_cache: HashMap::new(),
        }
    }

    /// Resolves a live bar per symbol for `date`, applying the stale-bar
    /// policy, then drives every strategy slot against every resolved
    /// symbol. `fetch` returns `None` when the Timeout Wrapper's budget
    /// for that symbol was exceeded — the clock never synthesises bars.
    pub fn tick(
        &mut self,
        date: NaiveDate,
        fetch: &dyn Fn(&str) -> Option<MarketBar>,
        slots: &mut [StrategySlot],
    ) -> TickReport {
        let mut report = TickReport::default();

        for symbol in self.symbols.clone() {
            let bar = match fetch(&symbol) {
                Some(bar) => {
                    self.stale_cache.remove(&symbol);
                    report.symbols_ticked.push(symbol.clone());
                    bar
                }
                None => match self.stale_cache.get_mut(&symbol) {
                    Some(entry) if entry.consecutive_stale_ticks < MAX_CONSECUTIVE_STALE_TICKS => {
                        entry.consecutive_stale_ticks += 1;
                        warn!(symbol = %symbol, consecutive = entry.consecutive_stale_ticks, "reusing stale bar");
                        report.symbols_stale.push(symbol.clone());
                        report.symbols_ticked.push(symbol.clone());
                        entry.bar
                    }
                    Some(_) => {
                        self.stale_cache.remove(&symbol);
                        report.symbols_skipped.push(symbol.clone());
                        continue;
                    }
                    None => {
                        report.symbols_skipped.push(symbol.clone());
                        continue;
                    }
                },
            };

            if !self.stale_cache.contains_key(&symbol) {
                self.stale_cache.insert(
                    symbol.clone(),
                    StaleBar {
                        bar,
                        consecutive_stale_ticks: 0,
                    },
                );
            }

            for slot in slots.iter_mut() {
                slot.broker.mark(&symbol, bar.close);
                let state = build_portfolio_state(&slot.broker, &symbol, date);
                let signal = slot.strategy.generate_signal(&symbol, &bar, &state);

                // Captured before the order mutates or clears the position,
                // so a Sell fill's realized P&L can be attributed to the
                // price it was actually bought at.
                let pre_trade_avg_price = slot.broker.position(&symbol).map(|p| p.avg_price);

                let fill = match signal.action {
                    Action::Buy => slot.broker.buy(&symbol, bar.close, signal.target_ratio, OrderType::Market, date),
                    Action::Sell => slot.broker.sell(&symbol, bar.close, signal.target_ratio, OrderType::Market, date),
                    Action::Hold => Ok(None),
                };

                match fill {
                    Ok(Some(fill)) => {
                        if fill.action == Action::Sell {
                            if let Some(avg_price) = pre_trade_avg_price {
                                let realized_pnl = (fill.price - avg_price) * fill.quantity as f64;
                                slot.performance.record_trade(realized_pnl);
                            }
                        }
                        slot.strategy.on_fill(&fill);
                    }
                    Ok(None) => {}
                    Err(e) => warn!(symbol = %symbol, error = %e, "order rejected"),
                }

                slot.performance.unrealized_pnl =
                    slot.broker.positions().map(|p| p.unrealized_pnl()).sum();
            }
        }

        for slot in slots.iter_mut() {
            slot.broker.record_snapshot(date);
            slot.strategy.on_day_end();
        }
        slots.iter_mut().for_each(|s| s.broker.on_day_end());

        report
    }
}

/// Builds the portfolio-state contract (spec §4.4.4) for `symbol` straight
/// off `broker` — no synthesised fields.
pub fn build_portfolio_state(broker: &SimulatedBroker, symbol: &str, current_date: NaiveDate) -> PortfolioState {
    let cash = broker.cash();
    let total_equity = broker.equity();
    let position = broker.position(symbol);

    let other_positions = broker
        .positions()
        .filter(|p| p.symbol != symbol)
        .map(|p| OtherPositionSummary {
            symbol: p.symbol.clone(),
            market_value: p.market_value(),
            unrealized_pnl: p.unrealized_pnl(),
        })
        .collect();

    let position_value = position.map(|p| p.market_value()).unwrap_or(0.0);

    PortfolioState {
        cash,
        total_equity,
        has_position: position.is_some(),
        position: position.map(|p| PositionView {
            qty: p.qty,
            avg_price: p.avg_price,
            cost_basis: p.cost_basis(),
            market_value: p.market_value(),
            unrealized_pnl: p.unrealized_pnl(),
            unrealized_pnl_pct: p.unrealized_pnl_pct(),
            can_sell_today: p.can_sell_today(current_date),
            bought_date: p.bought_date,
        }),
        cash_ratio: if total_equity > 0.0 { cash / total_equity } else { 0.0 },
        position_ratio: if total_equity > 0.0 { position_value / total_equity } else { 0.0 },
        other_positions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::portfolio::PortfolioState;
    use crate::engine::strategy::{Signal, Strategy};

    fn bar(date: NaiveDate, close: f64) -> MarketBar {
        MarketBar {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
        }
    }

    struct AlwaysBuy;
    impl Strategy for AlwaysBuy {
        fn id(&self) -> &str {
            "always_buy"
        }
        fn name(&self) -> &str {
            "AlwaysBuy"
        }
        fn generate_signal(&mut self, _symbol: &str, _bar: &MarketBar, state: &PortfolioState) -> Signal {
            if state.has_position {
                Signal::hold("already long")
            } else {
                Signal {
                    action: Action::Buy,
                    target_ratio: 0.5,
                    reason: "test".into(),
                    confidence: 1.0,
                }
            }
        }
    }

    struct BuyThenSell;
    impl Strategy for BuyThenSell {
        fn id(&self) -> &str {
            "buy_then_sell"
        }
        fn name(&self) -> &str {
            "BuyThenSell"
        }
        fn generate_signal(&mut self, _symbol: &str, _bar: &MarketBar, state: &PortfolioState) -> Signal {
            match &state.position {
                Some(p) if p.can_sell_today => Signal {
                    action: Action::Sell,
                    target_ratio: 1.0,
                    reason: "test".into(),
                    confidence: 1.0,
                },
                Some(_) => Signal::hold("not yet sellable"),
                None => Signal {
                    action: Action::Buy,
                    target_ratio: 0.5,
                    reason: "test".into(),
                    confidence: 1.0,
                },
            }
        }
    }

    #[test]
    fn a_profitable_round_trip_updates_the_slot_performance() {
        let mut clock = MarketClock::new(vec!["600519".to_string()]);
        let mut slots = vec![StrategySlot::new(Box::new(BuyThenSell), SimulatedBroker::new(1_000_000.0, 0.0, 0.0))];
        let d0 = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let d1 = d0.succ_opt().unwrap();

        clock.tick(d0, &|_| Some(bar(d0, 100.0)), &mut slots);
        assert_eq!(slots[0].performance.total_trades, 0);

        clock.tick(d1, &|_| Some(bar(d1, 110.0)), &mut slots);
        assert_eq!(slots[0].performance.total_trades, 1);
        assert_eq!(slots[0].performance.winning_trades, 1);
        assert!(slots[0].performance.realized_pnl > 0.0);
        assert_eq!(slots[0].performance.unrealized_pnl, 0.0);
    }

    #[test]
    fn tick_skips_a_symbol_after_the_second_consecutive_stale_reuse() {
        let mut clock = MarketClock::new(vec!["600519".to_string()]);
        let mut slots = vec![StrategySlot::new(Box::new(AlwaysBuy), SimulatedBroker::new(1_000_000.0, 0.0, 0.0))];
        let d0 = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();

        let fresh = Some(bar(d0, 100.0));
        clock.tick(d0, &|_| fresh, &mut slots);

        let stale_fetch = |_: &str| None;
        // One reuse is allowed, flagged as stale.
        let r1 = clock.tick(d0.succ_opt().unwrap(), &stale_fetch, &mut slots);
        assert_eq!(r1.symbols_stale, vec!["600519".to_string()]);

        // The very next consecutive stale tick evicts the symbol.
        let r2 = clock.tick(d0.succ_opt().unwrap().succ_opt().unwrap(), &stale_fetch, &mut slots);
        assert_eq!(r2.symbols_skipped, vec!["600519".to_string()]);
    }
}
