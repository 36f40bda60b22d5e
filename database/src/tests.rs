use crate::Database;
use resolved_core::{CoreError, DatabaseError, ScoreBound, ScoredMember, SetStore, SortedSetStore};
use std::env;

async fn setup_test_db() -> Database {
    let db_path = env::temp_dir().join(format!("test_resolved_{}.db", uuid::Uuid::new_v4()));
    let db_url = format!("sqlite://{}", db_path.display());

    let mut db = Database::new(db_url);
    db.connect()
        .await
        .expect("Failed to connect to test database");
    db.run_migrations().await.expect("Failed to run migrations");

    db
}

#[tokio::test]
async fn test_database_connection_and_migrations() {
    let db = setup_test_db().await;

    // Migrations are re-runnable
    db.run_migrations().await.expect("Failed to rerun migrations");
    db.close().await;
}

#[tokio::test]
async fn test_unconnected_database_reports_not_connected() {
    let db = Database::new("sqlite://unused.db".to_string());
    let err = db.sorted_set_members("anything").await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::Database(DatabaseError::NotConnected)
    ));
}

#[tokio::test]
async fn test_sorted_set_add_rescores_member() {
    let db = setup_test_db().await;

    db.sorted_set_add("topics:recent", 100, "1").await.unwrap();
    db.sorted_set_add("topics:recent", 300, "1").await.unwrap();
    db.sorted_set_add("topics:recent", 200, "2").await.unwrap();

    let members = db.rev_range_with_scores("topics:recent").await.unwrap();
    assert_eq!(
        members,
        vec![ScoredMember::new("1", 300), ScoredMember::new("2", 200)]
    );

    let scores = db
        .sorted_set_scores("topics:recent", &["2".to_string(), "9".to_string()])
        .await
        .unwrap();
    assert_eq!(scores, vec![Some(200), None]);
}

#[tokio::test]
async fn test_rev_range_by_score_across_keys() {
    let db = setup_test_db().await;

    db.sorted_set_add("cid:1:tids:lastposttime", 500, "10").await.unwrap();
    db.sorted_set_add("cid:2:tids:lastposttime", 900, "20").await.unwrap();
    db.sorted_set_add("cid:2:tids:lastposttime", 100, "21").await.unwrap();

    let keys = vec![
        "cid:1:tids:lastposttime".to_string(),
        "cid:2:tids:lastposttime".to_string(),
    ];
    let members = db
        .rev_range_by_score_with_scores(&keys, ScoreBound::Inclusive(500), ScoreBound::Unbounded)
        .await
        .unwrap();
    assert_eq!(
        members,
        vec![ScoredMember::new("20", 900), ScoredMember::new("10", 500)]
    );

    let none = db
        .rev_range_by_score_with_scores(&[], ScoreBound::Unbounded, ScoreBound::Unbounded)
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_range_by_score_pages() {
    let db = setup_test_db().await;

    for (score, pid) in [(10, "1"), (20, "2"), (30, "3"), (40, "4")] {
        db.sorted_set_add("tid:5:posts", score, pid).await.unwrap();
    }

    let page = db
        .range_by_score("tid:5:posts", 0, 3, ScoreBound::Exclusive(10), ScoreBound::Unbounded)
        .await
        .unwrap();
    assert_eq!(page, vec!["2", "3", "4"]);

    let rest = db
        .range_by_score("tid:5:posts", 3, 3, ScoreBound::Exclusive(10), ScoreBound::Unbounded)
        .await
        .unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_set_operations() {
    let db = setup_test_db().await;

    db.set_add("tid:3:resolved", "3").await.unwrap();
    db.set_add("tid:3:resolved", "3").await.unwrap();
    assert_eq!(db.set_members("tid:3:resolved").await.unwrap(), vec!["3"]);
    assert!(db.is_set_member("tid:3:resolved", "3").await.unwrap());

    db.set_remove("tid:3:resolved", "3").await.unwrap();
    assert!(!db.is_set_member("tid:3:resolved", "3").await.unwrap());
}
