//! Payment record models.
//!
//! This module defines:
//! - `TransactionType` / `TransactionStatus`: operation kind and lifecycle state
//! - `Transaction`: a persisted authorization, capture, void or refund
//! - `NewTransaction`: insert payload with validation
//! - `TransactionRow`: raw row shape read from the `transactions` table

use std::{collections::HashMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

/// Free-form metadata attached to a payment record, stored as JSONB.
pub type Metadata = HashMap<String, serde_json::Value>;

/// Kind of payment operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Authorization,
    Capture,
    Void,
    Refund,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Authorization => "AUTHORIZATION",
            TransactionType::Capture => "CAPTURE",
            TransactionType::Void => "VOID",
            TransactionType::Refund => "REFUND",
        }
    }

    /// Type of the record this operation acts upon.
    ///
    /// Captures and voids act on an authorization, refunds on a capture.
    /// Authorizations reference nothing.
    pub fn reference_type(&self) -> Option<TransactionType> {
        match self {
            TransactionType::Authorization => None,
            TransactionType::Capture | TransactionType::Void => {
                Some(TransactionType::Authorization)
            }
            TransactionType::Refund => Some(TransactionType::Capture),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AUTHORIZATION" => Ok(TransactionType::Authorization),
            "CAPTURE" => Ok(TransactionType::Capture),
            "VOID" => Ok(TransactionType::Void),
            "REFUND" => Ok(TransactionType::Refund),
            other => Err(StoreError::UnknownValue {
                kind: "transaction type",
                value: other.to_string(),
            }),
        }
    }
}

/// Lifecycle state of a payment record.
///
/// ```text
/// PENDING -> AUTHORIZED -> CAPTURED -> REFUNDED
///                      \-> VOIDED
///                      \-> EXPIRED
/// PENDING | AUTHORIZED -> FAILED
/// ```
///
/// The store persists whatever status it is given; legality of a change is
/// decided by the caller, which can consult [`TransactionStatus::can_transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Authorized,
    Captured,
    Voided,
    Refunded,
    Expired,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Authorized => "AUTHORIZED",
            TransactionStatus::Captured => "CAPTURED",
            TransactionStatus::Voided => "VOIDED",
            TransactionStatus::Refunded => "REFUNDED",
            TransactionStatus::Expired => "EXPIRED",
            TransactionStatus::Failed => "FAILED",
        }
    }

    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;

        matches!(
            (*self, next),
            (Pending, Authorized)
                | (Pending, Failed)
                | (Authorized, Captured)
                | (Authorized, Voided)
                | (Authorized, Expired)
                | (Authorized, Failed)
                | (Captured, Refunded)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Voided
                | TransactionStatus::Refunded
                | TransactionStatus::Expired
                | TransactionStatus::Failed
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TransactionStatus::Pending),
            "AUTHORIZED" => Ok(TransactionStatus::Authorized),
            "CAPTURED" => Ok(TransactionStatus::Captured),
            "VOIDED" => Ok(TransactionStatus::Voided),
            "REFUNDED" => Ok(TransactionStatus::Refunded),
            "EXPIRED" => Ok(TransactionStatus::Expired),
            "FAILED" => Ok(TransactionStatus::Failed),
            other => Err(StoreError::UnknownValue {
                kind: "transaction status",
                value: other.to_string(),
            }),
        }
    }
}

/// A payment operation record from the `transactions` table.
///
/// Records are never deleted; `status` is the only field that changes after
/// insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: Uuid,

    pub account_id: Uuid,

    #[serde(rename = "type")]
    pub transaction_type: TransactionType,

    pub amount_cents: i64,

    /// ISO 4217 code
    pub currency: String,

    /// Record this operation acts upon (see [`TransactionType::reference_type`])
    pub reference_id: Option<Uuid>,

    pub status: TransactionStatus,

    /// Authorizations only
    pub expires_at: Option<DateTime<Utc>>,

    pub metadata: Option<Metadata>,

    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Type of the referenced record, if this record references one.
    pub fn reference_type(&self) -> Option<TransactionType> {
        self.reference_id.and(self.transaction_type.reference_type())
    }
}

/// Raw `transactions` row; enum columns are stored as text.
#[derive(Debug, sqlx::FromRow)]
pub struct TransactionRow {
    pub id: Uuid,
    pub account_id: Uuid,
    #[sqlx(rename = "type")]
    pub transaction_type: String,
    pub amount_cents: i64,
    pub currency: String,
    pub reference_id: Option<Uuid>,
    pub status: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let metadata = row
            .metadata
            .map(serde_json::from_value::<Metadata>)
            .transpose()?;

        Ok(Transaction {
            id: row.id,
            account_id: row.account_id,
            transaction_type: row.transaction_type.parse()?,
            amount_cents: row.amount_cents,
            currency: row.currency,
            reference_id: row.reference_id,
            status: row.status.parse()?,
            expires_at: row.expires_at,
            metadata,
            created_at: row.created_at,
        })
    }
}

/// Insert payload for `TransactionRepository::create`.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    /// Generated when absent
    pub id: Option<Uuid>,
    pub account_id: Uuid,
    pub transaction_type: TransactionType,
    pub amount_cents: i64,
    pub currency: String,
    pub reference_id: Option<Uuid>,
    pub status: TransactionStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub metadata: Option<Metadata>,
    /// Defaults to the database's `NOW()` when absent
    pub created_at: Option<DateTime<Utc>>,
}

impl NewTransaction {
    pub fn new(
        account_id: Uuid,
        transaction_type: TransactionType,
        amount_cents: i64,
        status: TransactionStatus,
    ) -> Self {
        Self {
            id: None,
            account_id,
            transaction_type,
            amount_cents,
            currency: "USD".to_string(),
            reference_id: None,
            status,
            expires_at: None,
            metadata: None,
            created_at: None,
        }
    }

    pub fn reference(mut self, reference_id: Uuid) -> Self {
        self.reference_id = Some(reference_id);
        self
    }

    pub fn expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Check the record is well formed before it is sent to the database.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.amount_cents <= 0 {
            return Err(StoreError::Invalid(
                "amount_cents must be positive".to_string(),
            ));
        }

        if self.currency.len() != 3 || !self.currency.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(StoreError::Invalid(format!(
                "currency {:?} is not a three-letter code",
                self.currency
            )));
        }

        match (self.transaction_type.reference_type(), self.reference_id) {
            (Some(expected), None) => {
                return Err(StoreError::Invalid(format!(
                    "{} requires a reference to its {}",
                    self.transaction_type, expected
                )));
            }
            (None, Some(_)) => {
                return Err(StoreError::Invalid(format!(
                    "{} cannot reference another record",
                    self.transaction_type
                )));
            }
            _ => {}
        }

        if self.expires_at.is_some() && self.transaction_type != TransactionType::Authorization {
            return Err(StoreError::Invalid(
                "only authorizations expire".to_string(),
            ));
        }

        Ok(())
    }

    /// Metadata encoded for the JSONB column.
    pub fn encoded_metadata(&self) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self
            .metadata
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(metadata: Option<serde_json::Value>) -> TransactionRow {
        TransactionRow {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            transaction_type: "CAPTURE".to_string(),
            amount_cents: 2_500,
            currency: "USD".to_string(),
            reference_id: Some(Uuid::new_v4()),
            status: "CAPTURED".to_string(),
            expires_at: None,
            metadata,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn reference_types_follow_the_operation_chain() {
        assert_eq!(TransactionType::Authorization.reference_type(), None);
        assert_eq!(
            TransactionType::Capture.reference_type(),
            Some(TransactionType::Authorization)
        );
        assert_eq!(
            TransactionType::Void.reference_type(),
            Some(TransactionType::Authorization)
        );
        assert_eq!(
            TransactionType::Refund.reference_type(),
            Some(TransactionType::Capture)
        );
    }

    #[test]
    fn status_transitions() {
        use TransactionStatus::*;

        assert!(Pending.can_transition_to(Authorized));
        assert!(Authorized.can_transition_to(Captured));
        assert!(Authorized.can_transition_to(Voided));
        assert!(Captured.can_transition_to(Refunded));

        assert!(!Captured.can_transition_to(Voided));
        assert!(!Voided.can_transition_to(Captured));
        assert!(!Refunded.can_transition_to(Captured));
        assert!(!Pending.can_transition_to(Captured));

        assert!(Voided.is_terminal());
        assert!(!Captured.is_terminal());
    }

    #[test]
    fn unknown_text_is_rejected() {
        let err = "SETTLED".parse::<TransactionStatus>().unwrap_err();
        assert!(matches!(
            err,
            StoreError::UnknownValue {
                kind: "transaction status",
                ..
            }
        ));
        assert!("capture".parse::<TransactionType>().is_err());
    }

    #[test]
    fn row_with_metadata_object_decodes() {
        let txn = Transaction::try_from(row(Some(json!({ "merchant": "acme", "attempt": 2 }))))
            .unwrap();

        let metadata = txn.metadata.as_ref().unwrap();
        assert_eq!(metadata["merchant"], json!("acme"));
        assert_eq!(metadata["attempt"], json!(2));
        assert_eq!(txn.transaction_type, TransactionType::Capture);
        assert_eq!(txn.reference_type(), Some(TransactionType::Authorization));
    }

    #[test]
    fn row_with_non_object_metadata_fails() {
        let err = Transaction::try_from(row(Some(json!([1, 2, 3])))).unwrap_err();
        assert!(matches!(err, StoreError::Metadata(_)));
    }

    #[test]
    fn validation_rejects_malformed_records() {
        let account = Uuid::new_v4();
        let auth = NewTransaction::new(
            account,
            TransactionType::Authorization,
            1_000,
            TransactionStatus::Authorized,
        );
        assert!(auth.validate().is_ok());

        let zero = NewTransaction::new(
            account,
            TransactionType::Authorization,
            0,
            TransactionStatus::Authorized,
        );
        assert!(matches!(zero.validate(), Err(StoreError::Invalid(_))));

        let orphan_capture = NewTransaction::new(
            account,
            TransactionType::Capture,
            1_000,
            TransactionStatus::Captured,
        );
        assert!(orphan_capture.validate().is_err());

        let referencing_auth = auth.clone().reference(Uuid::new_v4());
        assert!(referencing_auth.validate().is_err());

        let expiring_refund = NewTransaction::new(
            account,
            TransactionType::Refund,
            1_000,
            TransactionStatus::Refunded,
        )
        .reference(Uuid::new_v4())
        .expires_at(Utc::now());
        assert!(expiring_refund.validate().is_err());

        let mut lowercase = auth;
        lowercase.currency = "usd".to_string();
        assert!(lowercase.validate().is_err());
    }

    #[test]
    fn metadata_is_encoded_as_an_object() {
        let mut metadata = Metadata::new();
        metadata.insert("order".to_string(), json!("ord_42"));

        let new = NewTransaction::new(
            Uuid::new_v4(),
            TransactionType::Authorization,
            500,
            TransactionStatus::Authorized,
        )
        .metadata(metadata);

        assert_eq!(
            new.encoded_metadata().unwrap(),
            Some(json!({ "order": "ord_42" }))
        );
    }
}
