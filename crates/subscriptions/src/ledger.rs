//! Balance ledger operations
//!
//! Debits and credits against a subscriber's remaining rental limit. Both
//! validate the amount before touching the store and report the balance after
//! the change.

use serde::Serialize;

use crate::error::{SubscriptionError, SubscriptionResult};
use crate::lifecycle::{resolve_user, CallerIdentity, SubscriptionLifecycle};
use crate::validation::{validate_amount, Validator};

/// Result of a successful balance change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceReceipt {
    pub remaining: i64,
    pub message: String,
}

impl SubscriptionLifecycle {
    /// Subtract `amount` from the caller's balance.
    ///
    /// All or nothing: a debit larger than the balance fails with
    /// [`SubscriptionError::InsufficientBalance`] and leaves it unchanged.
    pub async fn extract_from_balance(
        &self,
        caller: &dyn CallerIdentity,
        amount: i64,
    ) -> SubscriptionResult<BalanceReceipt> {
        let user_id = resolve_user(caller)?;
        let mut v = Validator::new();
        validate_amount(&mut v, amount);
        v.finish()?;

        match self.store.debit_balance(user_id, amount).await {
            Ok(remaining) => {
                tracing::info!(user_id, amount, remaining, "Balance debited");
                Ok(BalanceReceipt {
                    remaining,
                    message: format!("{amount} extracted from balance"),
                })
            }
            Err(e) => {
                let err = SubscriptionError::from(e);
                if let SubscriptionError::InsufficientBalance { remaining } = &err {
                    tracing::info!(
                        user_id,
                        amount,
                        remaining = *remaining,
                        "Debit rejected, insufficient balance"
                    );
                }
                Err(err)
            }
        }
    }

    /// Add `amount` to the caller's balance
    pub async fn add_to_balance(
        &self,
        caller: &dyn CallerIdentity,
        amount: i64,
    ) -> SubscriptionResult<BalanceReceipt> {
        let user_id = resolve_user(caller)?;
        let mut v = Validator::new();
        validate_amount(&mut v, amount);
        v.finish()?;

        let remaining = self.store.credit_balance(user_id, amount).await?;
        tracing::info!(user_id, amount, remaining, "Balance credited");

        Ok(BalanceReceipt {
            remaining,
            message: format!("{amount} added to balance"),
        })
    }
}
