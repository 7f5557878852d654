//! Game rewards. The games themselves run elsewhere; the ledger only
//! enforces the daily attempt quota and books what they paid out.

use rust_decimal::Decimal;
use tracing::info;

use super::{Applied, Engine};
use crate::error::LedgerError;
use crate::ledger::lock;
use crate::types::{naira, GameStats, Notice, Transaction, TransactionKind};

impl Engine {
    /// Spend one attempt at `game_id` and credit `reward` to trading
    /// capital. Returns the updated per-game stats.
    pub fn record_game_reward(
        &self,
        id: &str,
        game_id: &str,
        reward: Decimal,
    ) -> Result<Applied<GameStats>, LedgerError> {
        if reward < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(reward));
        }
        let handle = self.require(id)?;
        let mut account = lock(&handle);

        let remaining = match account.game_attempts.get(game_id) {
            None => return Err(LedgerError::UnknownGame(game_id.to_string())),
            Some(0) => return Err(LedgerError::NoAttemptsLeft(game_id.to_string())),
            Some(n) => n - 1,
        };
        let capital = account
            .trading_capital
            .checked_add(reward)
            .ok_or(LedgerError::InvalidAmount(reward))?;
        let stats = account
            .game_stats
            .get(game_id)
            .cloned()
            .unwrap_or_default()
            .with_play(reward)
            .ok_or(LedgerError::InvalidAmount(reward))?;

        account.game_attempts.insert(game_id.to_string(), remaining);
        account.trading_capital = capital;
        account.game_stats.insert(game_id.to_string(), stats.clone());

        self.transactions.append(
            Transaction::completed(id, reward, TransactionKind::GameReward, self.clock.now_utc())
                .with_description(game_id),
        );

        info!(user_id = %id, game_id, reward = %reward, remaining, "Game reward recorded");

        let notice = Notice::new(
            id,
            format!(
                "🎮 You won {} in {game_id}! It has been added to your trading capital ({remaining} attempts left today).",
                naira(reward)
            ),
        );
        Ok(Applied::new(stats, vec![notice]))
    }
}
