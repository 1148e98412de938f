//! Account ledger.
//!
//! Reads by identity, a locking read for read-decide-adjust sequences, and
//! atomic delta adjustment of both balances.

use tracing::Span;
use uuid::Uuid;

use crate::{db::Executor, error::StoreError, models::account::Account};

#[derive(Clone)]
pub struct AccountRepository {
    exec: Executor,
    span: Span,
}

impl AccountRepository {
    pub fn new(exec: Executor) -> Self {
        let span = tracing::debug_span!(parent: exec.span(), "accounts");
        Self { exec, span }
    }

    /// # Errors
    ///
    /// - `NotFound` if no account has this id
    pub async fn find_by_id(&self, id: Uuid) -> Result<Account, StoreError> {
        let query = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, account_number, cvv, expiry_month, expiry_year,
                   balance_cents, available_balance_cents, created_at, updated_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id);

        self.exec
            .fetch_optional("find account by id", query)
            .await?
            .ok_or_else(|| StoreError::not_found("account", id))
    }

    /// # Errors
    ///
    /// - `NotFound` if no account has this number
    pub async fn find_by_account_number(
        &self,
        account_number: &str,
    ) -> Result<Account, StoreError> {
        let query = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, account_number, cvv, expiry_month, expiry_year,
                   balance_cents, available_balance_cents, created_at, updated_at
            FROM accounts
            WHERE account_number = $1
            "#,
        )
        .bind(account_number);

        self.exec
            .fetch_optional("find account by number", query)
            .await?
            .ok_or_else(|| StoreError::not_found("account", account_number))
    }

    /// Read an account and take an exclusive row lock on it.
    ///
    /// The lock is held until the enclosing transaction commits or rolls
    /// back, so concurrent callers locking the same account queue up behind
    /// each other. Take it before any balance-affecting decision and keep the
    /// transaction open through the matching `adjust_balances`.
    ///
    /// Only meaningful on a transactional executor. On a pooled executor the
    /// statement autocommits and the lock is released as soon as the row is
    /// returned, which reintroduces lost updates for read-decide-adjust logic.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no account has this number
    pub async fn find_by_account_number_for_update(
        &self,
        account_number: &str,
    ) -> Result<Account, StoreError> {
        if !self.exec.is_transactional() {
            tracing::warn!(
                parent: &self.span,
                "row lock requested outside a transaction; it is released immediately"
            );
        }

        let query = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, account_number, cvv, expiry_month, expiry_year,
                   balance_cents, available_balance_cents, created_at, updated_at
            FROM accounts
            WHERE account_number = $1
            FOR UPDATE
            "#,
        )
        .bind(account_number);

        let account = self
            .exec
            .fetch_optional("find and lock account", query)
            .await?
            .ok_or_else(|| StoreError::not_found("account", account_number))?;

        tracing::debug!(parent: &self.span, account_id = %account.id, "account locked");
        Ok(account)
    }

    /// Add `balance_delta` and `available_delta` to the account's balances.
    ///
    /// Both deltas apply in one `UPDATE` relative to the current row values,
    /// so concurrent adjustments compose without lost updates. A zero delta
    /// on an existing account succeeds.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no account has this id
    /// - `ConstraintViolation` if the result would leave the available
    ///   balance above the total balance
    pub async fn adjust_balances(
        &self,
        account_id: Uuid,
        balance_delta: i64,
        available_delta: i64,
    ) -> Result<(), StoreError> {
        let query = sqlx::query(
            r#"
            UPDATE accounts
            SET balance_cents = balance_cents + $2,
                available_balance_cents = available_balance_cents + $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(account_id)
        .bind(balance_delta)
        .bind(available_delta);

        let rows_affected = self.exec.execute("adjust account balances", query).await?;
        if rows_affected == 0 {
            return Err(StoreError::not_found("account", account_id));
        }

        tracing::debug!(
            parent: &self.span,
            %account_id,
            balance_delta,
            available_delta,
            "account balances adjusted"
        );
        Ok(())
    }
}
