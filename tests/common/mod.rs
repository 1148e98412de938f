#![allow(dead_code)]

use bank_ledger::Database;
use sqlx::PgPool;
use uuid::Uuid;

pub fn database(pool: PgPool) -> Database {
    Database::new(pool, tracing::Span::none())
}

/// Insert an account whose balances both start at `balance_cents`.
pub async fn seed_account(pool: &PgPool, account_number: &str, balance_cents: i64) -> Uuid {
    sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO accounts (account_number, cvv, expiry_month, expiry_year,
                              balance_cents, available_balance_cents)
        VALUES ($1, '123', 12, 2030, $2, $2)
        RETURNING id
        "#,
    )
    .bind(account_number)
    .bind(balance_cents)
    .fetch_one(pool)
    .await
    .expect("seed account")
}

pub async fn count_idempotency_rows(pool: &PgPool, key: &str, request_path: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM idempotency_keys WHERE key = $1 AND request_path = $2",
    )
    .bind(key)
    .bind(request_path)
    .fetch_one(pool)
    .await
    .expect("count idempotency rows")
}
