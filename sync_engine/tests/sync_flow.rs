mod support;

use pm_common::CurrencyMap;
use support::{prepare_test_env, random_db_path, FakePanel};
use sync_engine::{
    db_types::{CabinetOutcome, NewCabinet, SyncJobStatus},
    panel_types::PanelTransaction,
    CabinetApi,
    JobApi,
    JobQueryFilter,
    SqliteDatabase,
    SyncApi,
    TransactionStore,
};

fn tx(external_id: &str, wallet: &str, amount: i64) -> PanelTransaction {
    PanelTransaction::new(external_id, wallet)
        .with_amount(CurrencyMap::new().with_amount("643", amount))
        .with_status(2)
}

async fn new_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

#[tokio::test]
async fn single_cabinet_sync_end_to_end() {
    let db = new_db().await;
    let cabinets = CabinetApi::new(db.clone());
    let jobs = JobApi::new(db.clone());
    let cabinet = cabinets.create(NewCabinet::new("Main desk", "ann", "pw")).await.unwrap();

    let panel = FakePanel::new().with_pages("ann", vec![vec![tx("100", "w1", 1000)], vec![tx("101", "w2", 2500)]]);
    let job = jobs.request_sync(Some(cabinet.id), 2).await.unwrap();
    assert_eq!(job.status, SyncJobStatus::Pending);
    assert!(job.start_sync_at.is_none());

    let api = SyncApi::new(db.clone(), panel.clone());
    let terminal = api.process_sync_orders().await.unwrap();
    assert_eq!(terminal.len(), 1);

    let job = jobs.job(job.id).await.unwrap();
    assert_eq!(job.status, SyncJobStatus::Completed);
    assert!(job.start_sync_at.is_some());
    assert!(job.end_sync_at.is_some());
    assert_eq!(job.processed.len(), 1);
    assert_eq!(job.processed[&cabinet.id], CabinetOutcome::Synced { total_processed: 2, new_transactions: 2 });

    assert_eq!(db.transaction_count(Some(cabinet.id)).await.unwrap(), 2);
    let stored = db.fetch_transaction("100", cabinet.id).await.unwrap().expect("transaction 100 should be stored");
    assert_eq!(stored.wallet, "w1");
    assert_eq!(stored.status, 2);
    assert_eq!(stored.amount.get("643").unwrap().as_i64(), Some(1000));
}

#[tokio::test]
async fn resync_ingests_nothing_new() {
    let db = new_db().await;
    let cabinets = CabinetApi::new(db.clone());
    let jobs = JobApi::new(db.clone());
    let cabinet = cabinets.create(NewCabinet::new("Main desk", "ann", "pw")).await.unwrap();
    let panel = FakePanel::new().with_pages("ann", vec![vec![tx("100", "w1", 1000), tx("101", "w2", 2000)]]);
    let api = SyncApi::new(db.clone(), panel.clone());

    jobs.request_sync(Some(cabinet.id), 5).await.unwrap();
    api.process_sync_orders().await.unwrap();
    assert_eq!(db.transaction_count(None).await.unwrap(), 2);

    // Same listing again: everything is a duplicate.
    let second = jobs.request_sync(Some(cabinet.id), 5).await.unwrap();
    api.process_sync_orders().await.unwrap();
    let second = jobs.job(second.id).await.unwrap();
    assert_eq!(second.status, SyncJobStatus::Completed);
    assert_eq!(second.processed[&cabinet.id], CabinetOutcome::Synced { total_processed: 2, new_transactions: 0 });
    assert_eq!(db.transaction_count(None).await.unwrap(), 2);
}

#[tokio::test]
async fn pagination_stops_at_first_empty_page() {
    let db = new_db().await;
    let cabinets = CabinetApi::new(db.clone());
    let jobs = JobApi::new(db.clone());
    let cabinet = cabinets.create(NewCabinet::new("Main desk", "ann", "pw")).await.unwrap();
    // Two pages of data; page 3 and beyond are empty.
    let panel = FakePanel::new()
        .with_pages("ann", vec![vec![tx("100", "w1", 100), tx("101", "w1", 200)], vec![tx("102", "w2", 300)]]);
    let api = SyncApi::new(db.clone(), panel.clone());

    let job = jobs.request_sync(Some(cabinet.id), 10).await.unwrap();
    api.process_sync_orders().await.unwrap();

    let job = jobs.job(job.id).await.unwrap();
    assert_eq!(job.processed[&cabinet.id], CabinetOutcome::Synced { total_processed: 3, new_transactions: 3 });
    // Pages 1 and 2 had data, page 3 was the empty terminator. Page 4..10 were never requested.
    assert_eq!(panel.fetch_calls(), 3);
    assert_eq!(db.transaction_count(None).await.unwrap(), 3);
}

#[tokio::test]
async fn failing_cabinet_does_not_poison_siblings() {
    let db = new_db().await;
    let cabinets = CabinetApi::new(db.clone());
    let jobs = JobApi::new(db.clone());
    let a = cabinets.create(NewCabinet::new("A", "alice", "pw")).await.unwrap();
    let b = cabinets.create(NewCabinet::new("B", "bob", "pw")).await.unwrap();
    let c = cabinets.create(NewCabinet::new("C", "carol", "pw")).await.unwrap();

    let panel = FakePanel::new()
        .with_pages("alice", vec![vec![tx("1", "w", 10)]])
        .with_rejected_login("bob")
        .with_pages("carol", vec![vec![tx("1", "w", 10), tx("2", "w", 20)]]);
    let api = SyncApi::new(db.clone(), panel.clone());

    let job = jobs.request_sync(None, 3).await.unwrap();
    api.process_sync_orders().await.unwrap();

    let job = jobs.job(job.id).await.unwrap();
    // The job covers all cabinets, so one bad login does not fail the job as a whole.
    assert_eq!(job.status, SyncJobStatus::Completed);
    assert_eq!(job.processed.len(), 3);
    assert_eq!(job.processed[&a.id], CabinetOutcome::Synced { total_processed: 1, new_transactions: 1 });
    assert_eq!(job.processed[&c.id], CabinetOutcome::Synced { total_processed: 2, new_transactions: 2 });
    let failure = job.processed[&b.id].failure_message().expect("cabinet B should have failed");
    assert!(failure.contains("locked"), "unexpected message: {failure}");
    // External ids are only unique within a cabinet: "1" exists under both A and C.
    assert_eq!(db.transaction_count(None).await.unwrap(), 3);
}

#[tokio::test]
async fn single_cabinet_rejection_fails_the_job() {
    let db = new_db().await;
    let cabinets = CabinetApi::new(db.clone());
    let jobs = JobApi::new(db.clone());
    let cabinet = cabinets.create(NewCabinet::new("B", "bob", "pw")).await.unwrap();
    let panel = FakePanel::new().with_rejected_login("bob");
    let api = SyncApi::new(db.clone(), panel.clone());

    let job = jobs.request_sync(Some(cabinet.id), 1).await.unwrap();
    api.process_sync_orders().await.unwrap();

    let job = jobs.job(job.id).await.unwrap();
    assert_eq!(job.status, SyncJobStatus::Failed);
    assert!(job.end_sync_at.is_some());
    let error = job.last_error.as_deref().expect("failed job should carry its error");
    assert!(error.contains("locked"), "unexpected message: {error}");
    assert!(job.processed[&cabinet.id].is_failure());
    assert_eq!(db.transaction_count(None).await.unwrap(), 0);
}

#[tokio::test]
async fn missing_cabinet_fails_without_touching_the_panel() {
    let db = new_db().await;
    let jobs = JobApi::new(db.clone());
    let panel = FakePanel::new();
    let api = SyncApi::new(db.clone(), panel.clone());

    let job = jobs.request_sync(Some(9999), 1).await.unwrap();
    api.process_sync_orders().await.unwrap();

    let job = jobs.job(job.id).await.unwrap();
    assert_eq!(job.status, SyncJobStatus::Failed);
    assert!(job.last_error.as_deref().unwrap().contains("does not exist"));
    assert!(job.processed.is_empty());
    assert_eq!(panel.auth_calls(), 0);
    assert_eq!(panel.fetch_calls(), 0);
}

#[tokio::test]
async fn jobs_are_processed_in_creation_order_and_always_end_terminal() {
    let db = new_db().await;
    let cabinets = CabinetApi::new(db.clone());
    let jobs = JobApi::new(db.clone());
    let cabinet = cabinets.create(NewCabinet::new("Main desk", "ann", "pw")).await.unwrap();
    let panel = FakePanel::new().with_pages("ann", vec![vec![tx("100", "w1", 100)]]);
    let api = SyncApi::new(db.clone(), panel.clone());

    let first = jobs.request_sync(Some(cabinet.id), 1).await.unwrap();
    let second = jobs.request_sync(None, 1).await.unwrap();
    let third = jobs.request_sync(Some(9999), 1).await.unwrap();

    let terminal = api.process_sync_orders().await.unwrap();
    let ids = terminal.iter().map(|j| j.id).collect::<Vec<i64>>();
    assert_eq!(ids, vec![first.id, second.id, third.id]);
    assert!(terminal.iter().all(|j| j.status.is_terminal()));

    // Nothing is left pending or in progress.
    let open = jobs
        .search(
            JobQueryFilter::default().with_status(SyncJobStatus::Pending).with_status(SyncJobStatus::InProgress),
        )
        .await
        .unwrap();
    assert!(open.is_empty());
}

#[tokio::test]
async fn all_cabinets_job_with_no_cabinets_completes_empty() {
    let db = new_db().await;
    let jobs = JobApi::new(db.clone());
    let api = SyncApi::new(db.clone(), FakePanel::new());

    let job = jobs.request_sync(None, 1).await.unwrap();
    api.process_sync_orders().await.unwrap();

    let job = jobs.job(job.id).await.unwrap();
    assert_eq!(job.status, SyncJobStatus::Completed);
    assert!(job.processed.is_empty());
}
