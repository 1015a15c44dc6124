use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable integer key of a ledger account.
///
/// Ordering on `AccountId` is the global lock acquisition order, see
/// [`crate::domain::lock_order`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AccountId(pub i64);

impl AccountId {
    pub fn value(&self) -> i64 {
        self.0
    }

    /// Big-endian key bytes; ids are positive so byte order matches numeric order.
    pub fn to_key(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for AccountId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// A strictly positive amount of money in the smallest currency unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Amount(i64);

impl Amount {
    pub fn new(value: i64) -> Result<Self, LedgerError> {
        if value > 0 {
            Ok(Self(value))
        } else {
            Err(LedgerError::ValidationError(format!(
                "Amount must be positive, got {}",
                value
            )))
        }
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// The debit side of this amount, as a signed entry value.
    pub fn debit(&self) -> i64 {
        -self.0
    }

    /// The credit side of this amount, as a signed entry value.
    pub fn credit(&self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for Amount {
    type Error = LedgerError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for i64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// A ledger account row.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Account {
    pub id: AccountId,
    pub owner: String,
    pub currency: String,
    /// Balance in the smallest currency unit.
    pub balance: i64,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Whether the current balance can cover a debit of `amount`.
    pub fn can_cover(&self, amount: Amount) -> bool {
        self.balance >= amount.value()
    }

    /// Balance after applying `delta`, or `None` on overflow.
    pub fn balance_after(&self, delta: i64) -> Option<i64> {
        self.balance.checked_add(delta)
    }
}

/// Parameters for provisioning a new account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAccountParams {
    pub owner: String,
    pub currency: String,
    /// Opening balance; recorded together with an opening entry when non-zero.
    pub balance: i64,
}

impl CreateAccountParams {
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.owner.trim().is_empty() {
            return Err(LedgerError::ValidationError(
                "Account owner must not be empty".to_string(),
            ));
        }
        if self.currency.trim().is_empty() {
            return Err(LedgerError::ValidationError(
                "Account currency must not be empty".to_string(),
            ));
        }
        if self.balance < 0 {
            return Err(LedgerError::ValidationError(format!(
                "Opening balance must not be negative, got {}",
                self.balance
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(balance: i64) -> Account {
        Account {
            id: AccountId(1),
            owner: "alice".to_string(),
            currency: "USD".to_string(),
            balance,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(1).is_ok());
        assert!(matches!(
            Amount::new(0),
            Err(LedgerError::ValidationError(_))
        ));
        assert!(matches!(
            Amount::new(-5),
            Err(LedgerError::ValidationError(_))
        ));
    }

    #[test]
    fn test_amount_sides_sum_to_zero() {
        let amount = Amount::new(30).unwrap();
        assert_eq!(amount.debit() + amount.credit(), 0);
    }

    #[test]
    fn test_can_cover() {
        let acc = account(10);
        assert!(acc.can_cover(Amount::new(10).unwrap()));
        assert!(!acc.can_cover(Amount::new(30).unwrap()));
    }

    #[test]
    fn test_balance_after_overflow() {
        let acc = account(i64::MAX);
        assert_eq!(acc.balance_after(1), None);
        assert_eq!(acc.balance_after(-1), Some(i64::MAX - 1));
    }

    #[test]
    fn test_account_id_key_order_matches_numeric_order() {
        assert!(AccountId(2).to_key() < AccountId(10).to_key());
        assert!(AccountId(255).to_key() < AccountId(256).to_key());
    }

    #[test]
    fn test_create_account_params_validation() {
        let mut params = CreateAccountParams {
            owner: "alice".to_string(),
            currency: "USD".to_string(),
            balance: 100,
        };
        assert!(params.validate().is_ok());

        params.balance = -1;
        assert!(matches!(
            params.validate(),
            Err(LedgerError::ValidationError(_))
        ));

        params.balance = 0;
        params.owner = " ".to_string();
        assert!(matches!(
            params.validate(),
            Err(LedgerError::ValidationError(_))
        ));
    }

    #[test]
    fn test_account_json_shape() {
        let json = serde_json::to_value(account(42)).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["balance"], 42);
        assert_eq!(json["currency"], "USD");
    }
}
