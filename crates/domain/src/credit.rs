//! Credit service: signup bonus, admin adjustments, balance and history.
//!
//! Purchase debits and refunds are owned by the checkout orchestrators;
//! this service covers the remaining ledger kinds.

use common::{Money, UserId};
use store::{CommerceStore, CreditMovement, CreditTransactionKind, CreditTransactionRecord};

use crate::error::CreditError;

/// One-time store credit granted on signup.
pub const INITIAL_BONUS: Money = Money::from_cents(10_000);

/// Service for credit balance operations outside checkout.
pub struct CreditService<S> {
    store: S,
}

impl<S: CommerceStore> CreditService<S> {
    /// Creates a new credit service on the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Grants the one-time signup bonus. Rejected if the user's ledger
    /// already holds an `InitialBonus` row.
    #[tracing::instrument(skip(self))]
    pub async fn grant_initial_bonus(&self, user_id: UserId) -> Result<Money, CreditError> {
        let history = self.store.credit_history(user_id).await?;
        if history
            .iter()
            .any(|row| row.kind == CreditTransactionKind::InitialBonus)
        {
            return Err(CreditError::BonusAlreadyGranted(user_id));
        }

        self.store
            .credit_adjust(CreditMovement {
                user_id,
                amount: INITIAL_BONUS,
                ledger_row: CreditTransactionRecord::new(
                    user_id,
                    INITIAL_BONUS,
                    CreditTransactionKind::InitialBonus,
                    None,
                    "welcome bonus",
                ),
            })
            .await?;

        Ok(self.store.credit_balance(user_id).await?)
    }

    /// Applies a signed administrative adjustment. Debits are guarded
    /// against overdrawing the balance.
    #[tracing::instrument(skip(self))]
    pub async fn admin_adjust(
        &self,
        user_id: UserId,
        amount: Money,
        note: impl Into<String> + std::fmt::Debug,
    ) -> Result<Money, CreditError> {
        if amount == Money::zero() {
            return Err(CreditError::ZeroAmount);
        }

        self.store
            .credit_adjust(CreditMovement {
                user_id,
                amount,
                ledger_row: CreditTransactionRecord::new(
                    user_id,
                    amount,
                    CreditTransactionKind::AdminAdjust,
                    None,
                    note.into(),
                ),
            })
            .await?;

        Ok(self.store.credit_balance(user_id).await?)
    }

    /// Returns the user's materialized balance.
    pub async fn balance(&self, user_id: UserId) -> Result<Money, CreditError> {
        Ok(self.store.credit_balance(user_id).await?)
    }

    /// Returns the user's ledger rows, oldest first.
    pub async fn history(&self, user_id: UserId) -> Result<Vec<CreditTransactionRecord>, CreditError> {
        Ok(self.store.credit_history(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use store::{MemoryCommerceStore, UserRecord};

    use super::*;

    async fn setup() -> (CreditService<MemoryCommerceStore>, UserId) {
        let store = MemoryCommerceStore::new();
        let user_id = UserId::new();
        store
            .insert_user(UserRecord {
                id: user_id,
                credit_balance: Money::zero(),
            })
            .await
            .unwrap();
        (CreditService::new(store), user_id)
    }

    #[tokio::test]
    async fn initial_bonus_is_one_time() {
        let (service, user_id) = setup().await;

        let balance = service.grant_initial_bonus(user_id).await.unwrap();
        assert_eq!(balance, INITIAL_BONUS);

        let result = service.grant_initial_bonus(user_id).await;
        assert!(matches!(result, Err(CreditError::BonusAlreadyGranted(_))));
        assert_eq!(service.balance(user_id).await.unwrap(), INITIAL_BONUS);
    }

    #[tokio::test]
    async fn admin_adjust_updates_balance_and_ledger() {
        let (service, user_id) = setup().await;

        service
            .admin_adjust(user_id, Money::from_cents(500), "goodwill")
            .await
            .unwrap();
        let balance = service
            .admin_adjust(user_id, Money::from_cents(-200), "correction")
            .await
            .unwrap();
        assert_eq!(balance.cents(), 300);

        let history = service.history(user_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history
            .iter()
            .all(|row| row.kind == CreditTransactionKind::AdminAdjust));
    }

    #[tokio::test]
    async fn debit_adjust_cannot_overdraw() {
        let (service, user_id) = setup().await;

        let result = service
            .admin_adjust(user_id, Money::from_cents(-100), "oops")
            .await;
        assert!(matches!(result, Err(CreditError::InsufficientCredit { .. })));
    }

    #[tokio::test]
    async fn zero_adjust_is_rejected() {
        let (service, user_id) = setup().await;
        let result = service.admin_adjust(user_id, Money::zero(), "noop").await;
        assert!(matches!(result, Err(CreditError::ZeroAmount)));
    }

    #[tokio::test]
    async fn unknown_user_is_reported() {
        let (service, _) = setup().await;
        let result = service.balance(UserId::new()).await;
        assert!(matches!(result, Err(CreditError::UserNotFound(_))));
    }
}
