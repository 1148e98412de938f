mod common;

use std::time::Duration as StdDuration;

use bank_ledger::{
    maintenance::IdempotencySweeper, models::idempotency::NewIdempotencyRecord,
    repositories::IdempotencyRepository,
};
use chrono::{Duration, Utc};
use sqlx::PgPool;

const PATH: &str = "/api/v1/authorizations";

#[sqlx::test]
#[ignore = "needs Postgres at DATABASE_URL"]
async fn get_of_unknown_key_is_absent(pool: PgPool) {
    let db = common::database(pool);
    let repo = IdempotencyRepository::new(db.executor());

    assert_eq!(repo.get("never-stored", PATH).await.unwrap(), None);
}

#[sqlx::test]
#[ignore = "needs Postgres at DATABASE_URL"]
async fn first_write_wins(pool: PgPool) {
    let db = common::database(pool.clone());
    let repo = IdempotencyRepository::new(db.executor());

    let first = NewIdempotencyRecord::new("key-1", PATH, 201, br#"{"id":"first"}"#.to_vec());
    let second = NewIdempotencyRecord::new("key-1", PATH, 402, br#"{"id":"second"}"#.to_vec());

    assert!(repo.store(&first).await.unwrap());
    assert!(!repo.store(&second).await.unwrap());

    let cached = repo.get("key-1", PATH).await.unwrap().unwrap();
    assert_eq!(cached.response_status, 201);
    assert_eq!(cached.response_body, first.response_body);
    assert_eq!(common::count_idempotency_rows(&pool, "key-1", PATH).await, 1);
}

#[sqlx::test]
#[ignore = "needs Postgres at DATABASE_URL"]
async fn same_key_on_another_path_is_independent(pool: PgPool) {
    let db = common::database(pool);
    let repo = IdempotencyRepository::new(db.executor());

    repo.store(&NewIdempotencyRecord::new("key-2", PATH, 201, b"auth".to_vec()))
        .await
        .unwrap();
    let capture = NewIdempotencyRecord::new("key-2", "/api/v1/captures", 200, b"capture".to_vec());
    assert!(repo.store(&capture).await.unwrap());

    assert_eq!(repo.get("key-2", PATH).await.unwrap().unwrap().response_body, b"auth");
    assert_eq!(
        repo.get("key-2", "/api/v1/captures")
            .await
            .unwrap()
            .unwrap()
            .response_body,
        b"capture"
    );
}

#[sqlx::test]
#[ignore = "needs Postgres at DATABASE_URL"]
async fn concurrent_first_attempts_agree_on_one_winner(pool: PgPool) {
    let db = common::database(pool.clone());

    let mut handles = Vec::new();
    for i in 0..6 {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            let record = NewIdempotencyRecord::new(
                "race-key",
                PATH,
                200 + i,
                format!(r#"{{"attempt":{i}}}"#).into_bytes(),
            );
            let repo = IdempotencyRepository::new(db.executor());
            let inserted = repo.store(&record).await?;
            let winner = repo.store_or_get(&record).await?;
            Ok::<_, bank_ledger::StoreError>((inserted, winner))
        }));
    }

    let mut winners = Vec::new();
    let mut inserted = 0;
    for handle in handles {
        let (won, record) = handle.await.unwrap().unwrap();
        inserted += won as usize;
        winners.push(record);
    }

    assert_eq!(inserted, 1);
    assert!(winners.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(common::count_idempotency_rows(&pool, "race-key", PATH).await, 1);

    let repo = IdempotencyRepository::new(db.executor());
    assert_eq!(repo.get("race-key", PATH).await.unwrap().as_ref(), winners.first());
}

#[sqlx::test]
#[ignore = "needs Postgres at DATABASE_URL"]
async fn purge_removes_exactly_the_expired_rows(pool: PgPool) {
    let db = common::database(pool);
    let repo = IdempotencyRepository::new(db.executor());

    let now = Utc::now();
    let cutoff = now - Duration::hours(24);

    for (key, created_at) in [
        ("two-days", now - Duration::hours(48)),
        ("just-expired", cutoff - Duration::seconds(1)),
        ("at-cutoff", cutoff),
        ("fresh", now - Duration::hours(1)),
    ] {
        let record =
            NewIdempotencyRecord::new(key, PATH, 200, b"{}".to_vec()).created_at(created_at);
        repo.store(&record).await.unwrap();
    }

    assert_eq!(repo.purge(cutoff).await.unwrap(), 2);
    assert_eq!(repo.purge(cutoff).await.unwrap(), 0);

    assert!(repo.get("two-days", PATH).await.unwrap().is_none());
    assert!(repo.get("just-expired", PATH).await.unwrap().is_none());
    assert!(repo.get("at-cutoff", PATH).await.unwrap().is_some());
    assert!(repo.get("fresh", PATH).await.unwrap().is_some());
}

#[sqlx::test]
#[ignore = "needs Postgres at DATABASE_URL"]
async fn sweeper_applies_the_retention_window(pool: PgPool) {
    let db = common::database(pool);
    let repo = IdempotencyRepository::new(db.executor());

    let now = Utc::now();
    let stale = NewIdempotencyRecord::new("stale", PATH, 200, b"{}".to_vec())
        .created_at(now - Duration::hours(30));
    repo.store(&stale).await.unwrap();
    repo.store(&NewIdempotencyRecord::new("recent", PATH, 200, b"{}".to_vec()))
        .await
        .unwrap();

    let sweeper =
        IdempotencySweeper::new(db.clone(), Duration::hours(24), StdDuration::from_secs(3600))
            .unwrap();
    assert_eq!(sweeper.sweep_once().await.unwrap(), 1);

    assert!(repo.get("stale", PATH).await.unwrap().is_none());
    assert!(repo.get("recent", PATH).await.unwrap().is_some());
}
