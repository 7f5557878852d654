//! VerificationGate — marks a user payout-eligible after the external
//! payment confirmation arrives. Confirming twice never credits twice.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use super::{Applied, Engine};
use crate::error::LedgerError;
use crate::ledger::lock;
use crate::types::{naira, Notice, Transaction, TransactionKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerificationOutcome {
    Verified { credited: Decimal },
    AlreadyVerified,
}

impl Engine {
    pub fn confirm_verification(&self, id: &str) -> Result<Applied<VerificationOutcome>, LedgerError> {
        let handle = self.require(id)?;
        let mut account = lock(&handle);

        if account.verified {
            debug!(user_id = %id, "Duplicate verification confirmation ignored");
            return Ok(Applied::quiet(VerificationOutcome::AlreadyVerified));
        }

        let credit = self.config.verification_credit;
        account.verified = true;
        account.withdrawable_profit += credit;
        self.transactions.append(
            Transaction::completed(id, credit, TransactionKind::VerificationCredit, self.clock.now_utc())
                .with_description("verification fee credit"),
        );

        info!(user_id = %id, credit = %credit, "Account verified");

        let notice = Notice::new(
            id,
            format!(
                "✅ Account verified! {} has been credited to your withdrawable balance.",
                naira(credit)
            ),
        );
        Ok(Applied::new(VerificationOutcome::Verified { credited: credit }, vec![notice]))
    }
}
