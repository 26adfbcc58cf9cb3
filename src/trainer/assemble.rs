//! `assemble_episode` (spec §4.5) and the whitelist-based `decision_context`
//! text it builds. Only fields that existed at decision time ever reach
//! this text — no trade outcome, no PnL, no forward-looking field (spec
//! §4.2.2 / invariant I1).

use crate::external::AnalysisOutcome;
use crate::memory::{AgentAnalysis, MarketState, TradeOutcome, TradingEpisode, CURRENT_SCHEMA_VERSION};
use chrono::NaiveDate;
use std::fmt::Write as _;

/// Builds the decision-time text from a fixed whitelist of attributes on
/// `MarketState`, `DecisionChain`, and non-error `AgentAnalysis` entries.
pub fn build_decision_context(state: &MarketState, outcome: &AnalysisOutcome) -> String {
    let mut text = String::new();
    let _ = write!(
        text,
        "symbol={} date={} close={:.4} rsi={} macd={} ma_short={} ma_long={} regime={}",
        state.symbol,
        state.date,
        state.close,
        fmt_opt(state.rsi),
        fmt_opt(state.macd),
        fmt_opt(state.ma_short),
        fmt_opt(state.ma_long),
        state.regime.as_deref().unwrap_or("unknown"),
    );

    let _ = write!(
        text,
        " | bull: {} | bear: {} | judge: {} | risk: {}",
        outcome.decision_chain.bull_argument,
        outcome.decision_chain.bear_argument,
        outcome.decision_chain.judge_decision,
        outcome.decision_chain.risk_decision,
    );

    for analysis in outcome.analyses.iter().filter(|a| !a.is_error) {
        let _ = write!(
            text,
            " | {}: direction={:?} confidence={:.2} reasoning={}",
            analysis.agent_name, analysis.direction, analysis.confidence, analysis.reasoning
        );
    }

    text
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.4}")).unwrap_or_else(|| "na".to_string())
}

pub fn assemble_episode(
    symbol: &str,
    date: NaiveDate,
    market_state: MarketState,
    analyses: Vec<AgentAnalysis>,
    decision_context: String,
    decision_chain: crate::memory::DecisionChain,
    outcome: TradeOutcome,
) -> TradingEpisode {
    let outcome_result = outcome.narrative();
    let success = outcome.pct_return > 0.0;
    TradingEpisode {
        schema_version: CURRENT_SCHEMA_VERSION,
        episode_id: TradingEpisode::episode_id_for(date, symbol),
        date,
        symbol: symbol.to_string(),
        market_state,
        analyses,
        decision_chain,
        outcome_result,
        outcome,
        decision_context,
        success,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{DecisionChain, Direction};

    #[test]
    fn decision_context_never_mentions_the_trade_outcome() {
        let state = MarketState {
            date: NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(),
            symbol: "600519".to_string(),
            open: 100.0,
            high: 101.0,
            low: 99.0,
            close: 100.5,
            volume: 1.0,
            rsi: Some(55.0),
            macd: Some(0.3),
            ma_short: Some(99.0),
            ma_long: Some(98.0),
            regime: Some("uptrend".to_string()),
        };
        let outcome = AnalysisOutcome {
            analyses: vec![AgentAnalysis {
                agent_name: "bull".to_string(),
                direction: Direction::Long,
                confidence: 0.8,
                reasoning: "momentum".to_string(),
                execution_time_ms: 1,
                is_error: false,
            }],
            decision_chain: DecisionChain {
                bull_argument: "strong momentum".to_string(),
                bear_argument: "overbought".to_string(),
                judge_decision: "buy".to_string(),
                risk_decision: "approved".to_string(),
                final_action: Direction::Long,
            },
            final_action: Direction::Long,
            target_ratio: 0.3,
        };

        let text = build_decision_context(&state, &outcome);
        assert!(!text.to_lowercase().contains("return"));
        assert!(!text.to_lowercase().contains("pnl"));
        assert!(text.contains("momentum"));
    }
}
