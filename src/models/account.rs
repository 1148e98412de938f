//! Account data model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Represents an account record from the database.
///
/// # Database Table
///
/// Maps to the `accounts` table. Accounts are seeded out of band and are
/// never created or deleted by the ledger itself.
///
/// # Balance Storage
///
/// Balances are stored as `i64` cents to avoid floating-point precision issues.
///
/// - `balance_cents` is the authoritative total
/// - `available_balance_cents` is the total minus outstanding holds
///
/// `available_balance_cents <= balance_cents` always holds (database CHECK
/// constraint). Both change only through `AccountRepository::adjust_balances`.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct Account {
    pub id: Uuid,

    /// Card number used to address the account.
    pub account_number: String,

    #[serde(skip_serializing)]
    pub cvv: String,

    pub expiry_month: i32,

    pub expiry_year: i32,

    pub balance_cents: i64,

    pub available_balance_cents: i64,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Funds currently reserved by authorizations that have not been
    /// captured or voided yet.
    pub fn held_cents(&self) -> i64 {
        self.balance_cents - self.available_balance_cents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_funds_are_the_gap_between_balances() {
        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            account_number: "4111111111111111".to_string(),
            cvv: "123".to_string(),
            expiry_month: 12,
            expiry_year: 2030,
            balance_cents: 10_000,
            available_balance_cents: 7_500,
            created_at: now,
            updated_at: now,
        };

        assert_eq!(account.held_cents(), 2_500);

        let json = serde_json::to_value(&account).unwrap();
        assert!(json.get("cvv").is_none());
    }
}
