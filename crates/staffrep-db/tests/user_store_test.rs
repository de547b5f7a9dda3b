//! Integration tests for both user record store backends.
//!
//! Every scenario runs against in-memory SurrealDB and in-memory SQLite.

use staffrep_core::error::StaffError;
use staffrep_core::models::reputation::{ReputationAction, ReputationLogEntry};
use staffrep_core::models::user::{
    CounterDelta, LeaderboardField, LoaStatus, UserMutation, UserUpdate,
};
use staffrep_core::repository::UserRepository;
use staffrep_db::repository::{SqliteUserRepository, SurrealUserRepository};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

/// Helper: spin up in-memory SurrealDB and run migrations.
async fn surreal() -> SurrealUserRepository<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    staffrep_db::run_migrations(&db).await.unwrap();
    SurrealUserRepository::new(db)
}

fn sqlite() -> SqliteUserRepository {
    SqliteUserRepository::open_memory().unwrap()
}

fn entry(ts: i64, action: ReputationAction, amount: i64, reason: &str) -> ReputationLogEntry {
    ReputationLogEntry {
        timestamp: ts,
        moderator_id: "900".into(),
        action,
        amount,
        reason: reason.into(),
    }
}

// -----------------------------------------------------------------------
// Shared scenarios
// -----------------------------------------------------------------------

async fn get_or_create_defaults(repo: &impl UserRepository) {
    let err = repo.get_user("100").await.unwrap_err();
    assert!(matches!(err, StaffError::NotFound { .. }));

    let created = repo.get_or_create_user("100").await.unwrap();
    assert_eq!(created.user_id, "100");
    assert_eq!(created.positive_rep, 0);
    assert_eq!(created.negative_rep, 0);
    assert!(created.reputation_history.is_empty());
    assert_eq!(created.loa_status, LoaStatus::default());

    // Second call returns the stored record, not a fresh one.
    repo.update_user(
        "100",
        UserUpdate {
            positive_rep: Some(3),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let again = repo.get_or_create_user("100").await.unwrap();
    assert_eq!(again.positive_rep, 3);
}

async fn round_trip(repo: &impl UserRepository) {
    let history = vec![
        entry(1_000, ReputationAction::AddPos, 2, "covered a shift"),
        entry(2_000, ReputationAction::AddNeg, 1, "missed a ticket"),
        entry(3_000, ReputationAction::Promote, 0, "Authorized by lead"),
    ];
    let loa = LoaStatus::active(4_000, "exams");

    let written = repo
        .update_user(
            "200",
            UserUpdate {
                positive_rep: Some(4),
                negative_rep: Some(1),
                reputation_history: Some(history.clone()),
                loa_status: Some(loa.clone()),
            },
        )
        .await
        .unwrap();

    let read = repo.get_user("200").await.unwrap();
    assert_eq!(read, written);
    assert_eq!(read.reputation_history, history);
    assert_eq!(read.loa_status, loa);
}

async fn partial_update_merges(repo: &impl UserRepository) {
    repo.update_user(
        "300",
        UserUpdate {
            positive_rep: Some(5),
            negative_rep: Some(2),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let merged = repo
        .update_user(
            "300",
            UserUpdate {
                negative_rep: Some(0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(merged.positive_rep, 5);
    assert_eq!(merged.negative_rep, 0);
}

async fn leaderboard_orders_and_truncates(repo: &impl UserRepository) {
    for (id, pos) in [("a", 5u32), ("b", 20), ("c", 10)] {
        repo.update_user(
            id,
            UserUpdate {
                positive_rep: Some(pos),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }

    let top = repo
        .leaderboard(LeaderboardField::PositiveRep, 2)
        .await
        .unwrap();
    let values: Vec<u32> = top.iter().map(|u| u.positive_rep).collect();
    assert_eq!(values, vec![20, 10]);

    let all = repo
        .leaderboard(LeaderboardField::PositiveRep, 10)
        .await
        .unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[2].user_id, "a");
}

async fn transaction_applies_in_order(repo: &impl UserRepository) {
    repo.update_user(
        "400",
        UserUpdate {
            positive_rep: Some(12),
            negative_rep: Some(3),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let committed = repo
        .transaction(
            "400",
            vec![
                UserMutation::Update(UserUpdate::reset_counters()),
                UserMutation::AdjustCounters(CounterDelta {
                    positive: 1,
                    negative: -5,
                }),
                UserMutation::AppendLog(entry(5_000, ReputationAction::Reset, 0, "slate")),
            ],
        )
        .await
        .unwrap();

    assert_eq!(committed.positive_rep, 1);
    assert_eq!(committed.negative_rep, 0);
    assert_eq!(committed.reputation_history.len(), 1);

    let stored = repo.get_user("400").await.unwrap();
    assert_eq!(stored, committed);
}

// -----------------------------------------------------------------------
// SurrealDB
// -----------------------------------------------------------------------

#[tokio::test]
async fn surreal_get_or_create_defaults() {
    get_or_create_defaults(&surreal().await).await;
}

#[tokio::test]
async fn surreal_round_trip() {
    round_trip(&surreal().await).await;
}

#[tokio::test]
async fn surreal_partial_update_merges() {
    partial_update_merges(&surreal().await).await;
}

#[tokio::test]
async fn surreal_leaderboard() {
    leaderboard_orders_and_truncates(&surreal().await).await;
}

#[tokio::test]
async fn surreal_transaction() {
    transaction_applies_in_order(&surreal().await).await;
}

#[tokio::test]
async fn surreal_concurrent_appends_are_not_lost() {
    let repo = surreal().await;
    let mut handles = Vec::new();
    for i in 0..10 {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            repo.transaction(
                "500",
                vec![UserMutation::AppendLog(entry(
                    i,
                    ReputationAction::AddPos,
                    1,
                    "burst",
                ))],
            )
            .await
            .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let record = repo.get_user("500").await.unwrap();
    assert_eq!(record.reputation_history.len(), 10);
}

// -----------------------------------------------------------------------
// SQLite
// -----------------------------------------------------------------------

#[tokio::test]
async fn sqlite_get_or_create_defaults() {
    get_or_create_defaults(&sqlite()).await;
}

#[tokio::test]
async fn sqlite_round_trip() {
    round_trip(&sqlite()).await;
}

#[tokio::test]
async fn sqlite_partial_update_merges() {
    partial_update_merges(&sqlite()).await;
}

#[tokio::test]
async fn sqlite_leaderboard() {
    leaderboard_orders_and_truncates(&sqlite()).await;
}

#[tokio::test]
async fn sqlite_transaction() {
    transaction_applies_in_order(&sqlite()).await;
}
