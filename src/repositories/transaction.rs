//! Payment-record store.
//!
//! Persists authorization, capture, void and refund records and answers the
//! "has X already been captured / voided / refunded" question through
//! [`TransactionRepository::find_by_reference`].
//!
//! The `(reference_id, type)` pair is UNIQUE in the schema. Callers should
//! run `find_by_reference` and `create` in the same transaction; if two
//! requests still race, the loser's `create` fails with `Conflict`.

use tracing::Span;
use uuid::Uuid;

use crate::{
    db::Executor,
    error::StoreError,
    models::transaction::{
        NewTransaction, Transaction, TransactionRow, TransactionStatus, TransactionType,
    },
};

#[derive(Clone)]
pub struct TransactionRepository {
    exec: Executor,
    span: Span,
}

impl TransactionRepository {
    pub fn new(exec: Executor) -> Self {
        let span = tracing::debug_span!(parent: exec.span(), "transactions");
        Self { exec, span }
    }

    /// Insert a new payment record and return it as stored.
    ///
    /// # Errors
    ///
    /// - `Invalid` if the record fails validation
    /// - `Metadata` if the metadata cannot be encoded
    /// - `Conflict` if a record of this type already references the same id
    /// - `ConstraintViolation` if the account or referenced record does not exist
    pub async fn create(&self, new: NewTransaction) -> Result<Transaction, StoreError> {
        new.validate()?;
        let metadata = new.encoded_metadata()?;
        let id = new.id.unwrap_or_else(Uuid::new_v4);

        let query = sqlx::query_as::<_, TransactionRow>(
            r#"
            INSERT INTO transactions (
                id, account_id, type, amount_cents, currency,
                reference_id, status, expires_at, metadata, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, COALESCE($10, NOW()))
            RETURNING id, account_id, type, amount_cents, currency,
                      reference_id, status, expires_at, metadata, created_at
            "#,
        )
        .bind(id)
        .bind(new.account_id)
        .bind(new.transaction_type.as_str())
        .bind(new.amount_cents)
        .bind(&new.currency)
        .bind(new.reference_id)
        .bind(new.status.as_str())
        .bind(new.expires_at)
        .bind(metadata)
        .bind(new.created_at);

        let row = self
            .exec
            .fetch_optional("create transaction", query)
            .await?
            .ok_or_else(|| StoreError::not_found("transaction", id))?;

        tracing::debug!(
            parent: &self.span,
            transaction_id = %id,
            transaction_type = %new.transaction_type,
            status = %new.status,
            "transaction created"
        );
        Transaction::try_from(row)
    }

    /// # Errors
    ///
    /// - `NotFound` if no record has this id
    pub async fn find_by_id(&self, id: Uuid) -> Result<Transaction, StoreError> {
        let query = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT id, account_id, type, amount_cents, currency,
                   reference_id, status, expires_at, metadata, created_at
            FROM transactions
            WHERE id = $1
            "#,
        )
        .bind(id);

        self.exec
            .fetch_optional("find transaction", query)
            .await?
            .ok_or_else(|| StoreError::not_found("transaction", id))?
            .try_into()
    }

    /// The record of `transaction_type` that references `reference_id`, if any.
    ///
    /// `Ok(None)` means the referenced record has not been acted upon with
    /// this operation yet.
    pub async fn find_by_reference(
        &self,
        reference_id: Uuid,
        transaction_type: TransactionType,
    ) -> Result<Option<Transaction>, StoreError> {
        let query = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT id, account_id, type, amount_cents, currency,
                   reference_id, status, expires_at, metadata, created_at
            FROM transactions
            WHERE reference_id = $1 AND type = $2
            "#,
        )
        .bind(reference_id)
        .bind(transaction_type.as_str());

        self.exec
            .fetch_optional("find transaction by reference", query)
            .await?
            .map(Transaction::try_from)
            .transpose()
    }

    /// Every record owned by an account, oldest first.
    pub async fn find_by_account(&self, account_id: Uuid) -> Result<Vec<Transaction>, StoreError> {
        let query = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT id, account_id, type, amount_cents, currency,
                   reference_id, status, expires_at, metadata, created_at
            FROM transactions
            WHERE account_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(account_id);

        self.exec
            .fetch_all("list account transactions", query)
            .await?
            .into_iter()
            .map(Transaction::try_from)
            .collect()
    }

    /// Overwrite a record's status.
    ///
    /// No transition check happens here; see
    /// [`TransactionStatus::can_transition_to`].
    ///
    /// # Errors
    ///
    /// - `NotFound` if no record has this id
    pub async fn update_status(
        &self,
        id: Uuid,
        status: TransactionStatus,
    ) -> Result<(), StoreError> {
        let query = sqlx::query(
            r#"
            UPDATE transactions
            SET status = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str());

        let rows_affected = self.exec.execute("update transaction status", query).await?;
        if rows_affected == 0 {
            return Err(StoreError::not_found("transaction", id));
        }

        tracing::debug!(
            parent: &self.span,
            transaction_id = %id,
            %status,
            "transaction status updated"
        );
        Ok(())
    }
}
