// Copyright 2025 itscheems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Summary performance metrics computed from the equity curve and the
//! FIFO-matched trade ledger (§4.8). Has no counterpart in the
//! distilled run-loop summary, added as an ambient supplement comparable
//! production backtesters carry.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::lots::CompletedTrade;
use crate::portfolio::EquityPoint;

const TRADING_PERIODS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PerformanceMetrics {
	pub total_return: f64,
	pub annualized_return: f64,
	pub max_drawdown: f64,
	pub sharpe_ratio: f64,
	pub trade_count: u64,
	pub win_rate: f64,
	pub avg_profit_loss_ratio: f64,
}

/// Computes `PerformanceMetrics` from a completed run's equity history
/// and closed-trade ledger; stateless, holds no cached result.
pub struct PerformanceAnalyzer;

impl PerformanceAnalyzer {
	/// `equity_history` must carry at least one point (§4.7 Run loop step
	/// 3 fabricates a synthetic point when the backtester never observed
	/// a Market event, so this never needs to special-case emptiness).
	pub fn calculate_metrics(equity_history: &[EquityPoint], trades: &[CompletedTrade]) -> PerformanceMetrics {
		if equity_history.is_empty() {
			return PerformanceMetrics::default();
		}

		let initial = equity_history.first().map(|p| p.equity).unwrap_or(0.0);
		let final_equity = equity_history.last().map(|p| p.equity).unwrap_or(0.0);
		let total_return = if initial != 0.0 { final_equity / initial - 1.0 } else { 0.0 };

		let returns: Vec<f64> =
			equity_history.windows(2).map(|w| if w[0].equity != 0.0 { (w[1].equity - w[0].equity) / w[0].equity } else { 0.0 }).collect();

		let (annualized_return, sharpe_ratio) = if returns.len() >= 2 {
			let mean_return = (&returns[..]).mean();
			let volatility = (&returns[..]).std_dev();
			let sharpe = if volatility > 0.0 { (mean_return / volatility) * TRADING_PERIODS_PER_YEAR.sqrt() } else { 0.0 };
			let annualized = (1.0 + total_return).powf(TRADING_PERIODS_PER_YEAR / returns.len() as f64) - 1.0;
			(annualized, sharpe)
		} else {
			(total_return, 0.0)
		};

		let max_drawdown = Self::max_drawdown(equity_history);
		let (trade_count, win_rate, avg_profit_loss_ratio) = Self::trade_stats(trades);

		PerformanceMetrics { total_return, annualized_return, max_drawdown, sharpe_ratio, trade_count, win_rate, avg_profit_loss_ratio }
	}

	fn max_drawdown(equity_history: &[EquityPoint]) -> f64 {
		let mut peak = f64::MIN;
		let mut worst = 0.0;
		for point in equity_history {
			if point.equity > peak {
				peak = point.equity;
			}
			if peak > 0.0 {
				let drawdown = (peak - point.equity) / peak;
				if drawdown > worst {
					worst = drawdown;
				}
			}
		}
		worst
	}

	fn trade_stats(trades: &[CompletedTrade]) -> (u64, f64, f64) {
		if trades.is_empty() {
			return (0, 0.0, 0.0);
		}
		let pnls: Vec<f64> = trades.iter().map(CompletedTrade::pnl).collect();
		let wins: Vec<f64> = pnls.iter().copied().filter(|&p| p > 0.0).collect();
		let losses: Vec<f64> = pnls.iter().copied().filter(|&p| p < 0.0).collect();

		let win_rate = wins.len() as f64 / pnls.len() as f64;
		let avg_win = if wins.is_empty() { 0.0 } else { wins.iter().sum::<f64>() / wins.len() as f64 };
		let avg_loss = if losses.is_empty() { 0.0 } else { losses.iter().sum::<f64>() / losses.len() as f64 };
		let avg_profit_loss_ratio = if avg_loss != 0.0 { (avg_win / avg_loss.abs()).abs() } else { 0.0 };

		(pnls.len() as u64, win_rate, avg_profit_loss_ratio)
	}
}
