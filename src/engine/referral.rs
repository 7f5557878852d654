//! ReferralTracker — credits referrers, capped at `max_referrals`.
//!
//! A referred account can be credited to one referrer only. Ineligible
//! referrals are ignored without touching either account; only an unknown
//! referrer or a self-referral is reported as an error.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use super::activation::{activation_notice, try_activate};
use super::{Applied, Engine};
use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::ledger::users::lock_pair;
use crate::types::{naira, Notice, Transaction, TransactionKind, UserAccount};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// Referrer already collected the maximum number of referral bonuses.
    BonusCapReached,
    /// The referred user was already credited to a referrer.
    AlreadyReferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReferralOutcome {
    Credited { referrals_count: u32, activated: bool },
    Ignored { reason: IgnoreReason },
}

/// Apply one referral bonus to `referrer`. Returns false, leaving the
/// account untouched, once the bonus is no longer available.
pub fn credit_referral(config: &LedgerConfig, referrer: &mut UserAccount) -> bool {
    if !referrer.referral_bonus_eligible || referrer.referrals_count >= config.max_referrals {
        return false;
    }

    referrer.referrals_count += 1;
    referrer.balance += config.referral_bonus;
    referrer.trading_capital += config.referral_bonus;

    if referrer.referrals_count >= config.max_referrals {
        referrer.referral_bonus_eligible = false;
    }
    true
}

impl Engine {
    /// Credit `referrer_id` for bringing in `referred_id`. The referred
    /// account is created if this is its first interaction.
    pub fn apply_referral(
        &self,
        referrer_id: &str,
        referred_id: &str,
    ) -> Result<Applied<ReferralOutcome>, LedgerError> {
        if referrer_id == referred_id {
            return Err(LedgerError::SelfReferral(referrer_id.to_string()));
        }
        let referrer_handle = self.require(referrer_id)?;
        let (referred_handle, _) = self.account_handle(referred_id);

        let (mut referrer, mut referred) =
            lock_pair((referrer_id, &referrer_handle), (referred_id, &referred_handle));

        if referred.referred_by.is_some() {
            debug!(referrer_id, referred_id, "Referral ignored: already referred");
            return Ok(Applied::quiet(ReferralOutcome::Ignored {
                reason: IgnoreReason::AlreadyReferred,
            }));
        }

        if !credit_referral(&self.config, &mut referrer) {
            debug!(referrer_id, referred_id, "Referral ignored: bonus cap reached");
            return Ok(Applied::quiet(ReferralOutcome::Ignored {
                reason: IgnoreReason::BonusCapReached,
            }));
        }
        referred.referred_by = Some(referrer_id.to_string());
        drop(referred);

        self.transactions.append(
            Transaction::completed(
                referrer_id,
                self.config.referral_bonus,
                TransactionKind::ReferralBonus,
                self.clock.now_utc(),
            )
            .with_description(format!("referred {referred_id}")),
        );

        let activated = try_activate(&self.config, &mut referrer);

        info!(
            referrer_id,
            referred_id,
            referrals = referrer.referrals_count,
            activated,
            "Referral credited"
        );

        let mut notices = vec![Notice::new(
            referrer_id,
            format!(
                "🎉 New referral! Total: {}/{} ({} earned)",
                referrer.referrals_count,
                self.config.max_referrals,
                naira(self.config.referral_bonus * Decimal::from(referrer.referrals_count)),
            ),
        )];
        if activated {
            notices.push(activation_notice(&referrer));
        }

        Ok(Applied::new(
            ReferralOutcome::Credited {
                referrals_count: referrer.referrals_count,
                activated,
            },
            notices,
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::test_engine;
    use rust_decimal_macros::dec;

    #[test]
    fn test_credit_referral_increments() {
        let cfg = LedgerConfig::default();
        let mut acct = UserAccount::sample("r");
        assert!(credit_referral(&cfg, &mut acct));
        assert_eq!(acct.referrals_count, 1);
        assert_eq!(acct.balance, dec!(10000));
        assert_eq!(acct.trading_capital, dec!(10000));
        assert!(acct.referral_bonus_eligible);
    }

    #[test]
    fn test_credit_referral_caps_at_max() {
        let cfg = LedgerConfig::default();
        let mut acct = UserAccount::sample("r");
        for _ in 0..6 {
            assert!(credit_referral(&cfg, &mut acct));
        }
        assert_eq!(acct.referrals_count, 6);
        assert!(!acct.referral_bonus_eligible);
        assert_eq!(acct.trading_capital, dec!(35000));

        assert!(!credit_referral(&cfg, &mut acct));
        assert_eq!(acct.referrals_count, 6);
        assert_eq!(acct.balance, dec!(35000));
    }

    #[test]
    fn test_sixth_referral_activates_with_ads_done() {
        let (engine, _) = test_engine(LedgerConfig::default());
        engine.create_or_get_user("R");
        for i in 0..5 {
            engine.apply_referral("R", &format!("x{i}")).unwrap();
        }
        engine.users().update("R", |a| a.ads_watched_today = 20);
        let before = engine.user("R").unwrap();
        assert_eq!(before.referrals_count, 5);
        assert!(before.referral_bonus_eligible);

        let out = engine.apply_referral("R", "X").unwrap();
        assert_eq!(
            out.value,
            ReferralOutcome::Credited { referrals_count: 6, activated: true }
        );
        assert_eq!(out.notices.len(), 2);

        let after = engine.user("R").unwrap();
        assert_eq!(after.referrals_count, 6);
        assert_eq!(after.balance, before.balance + dec!(5000));
        assert!(!after.referral_bonus_eligible);
        assert!(after.trading_active);
        assert_eq!(after.trading_capital, dec!(35000));
    }

    #[test]
    fn test_seventh_referral_is_ignored() {
        let (engine, _) = test_engine(LedgerConfig::default());
        engine.create_or_get_user("R");
        for i in 0..6 {
            engine.apply_referral("R", &format!("x{i}")).unwrap();
        }
        let out = engine.apply_referral("R", "late").unwrap();
        assert_eq!(
            out.value,
            ReferralOutcome::Ignored { reason: IgnoreReason::BonusCapReached }
        );
        assert!(out.notices.is_empty());
        assert_eq!(engine.user("R").unwrap().referrals_count, 6);
        assert!(engine.user("late").unwrap().referred_by.is_none());
        assert_eq!(
            engine.transactions().count("R", TransactionKind::ReferralBonus),
            6
        );
    }

    #[test]
    fn test_replayed_referral_is_ignored() {
        let (engine, _) = test_engine(LedgerConfig::default());
        engine.create_or_get_user("R");
        engine.apply_referral("R", "X").unwrap();
        let replay = engine.apply_referral("R", "X").unwrap();
        assert_eq!(
            replay.value,
            ReferralOutcome::Ignored { reason: IgnoreReason::AlreadyReferred }
        );
        assert_eq!(engine.user("R").unwrap().referrals_count, 1);
        assert_eq!(engine.user("X").unwrap().referred_by.as_deref(), Some("R"));
    }

    #[test]
    fn test_self_and_unknown_referrer_rejected() {
        let (engine, _) = test_engine(LedgerConfig::default());
        engine.create_or_get_user("R");
        assert_eq!(
            engine.apply_referral("R", "R"),
            Err(LedgerError::SelfReferral("R".to_string()))
        );
        assert_eq!(
            engine.apply_referral("ghost", "X"),
            Err(LedgerError::UnknownUser("ghost".to_string()))
        );
        assert!(!engine.users().contains("X"));
    }

    #[test]
    fn test_referral_records_transaction() {
        let (engine, _) = test_engine(LedgerConfig::default());
        engine.create_or_get_user("R");
        engine.apply_referral("R", "X").unwrap();
        let txs = engine.transactions_for("R");
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].kind, TransactionKind::ReferralBonus);
        assert_eq!(txs[0].amount, dec!(5000));
        assert_eq!(txs[0].description.as_deref(), Some("referred X"));
    }
}
