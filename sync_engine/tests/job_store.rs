mod support;

use chrono::Duration;
use pm_common::CurrencyMap;
use support::{prepare_test_env, random_db_path};
use sync_engine::{
    db_types::{CabinetOutcome, NewCabinet, SyncJobStatus},
    panel_types::PanelTransaction,
    persist_batch,
    CabinetApi,
    CabinetManagement,
    JobApi,
    JobQueryFilter,
    JobStore,
    SqliteDatabase,
    SyncEngineError,
    TransactionStore,
};

async fn new_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

#[tokio::test]
async fn job_status_transitions_are_guarded() {
    let db = new_db().await;
    let jobs = JobApi::new(db.clone());
    let job = jobs.request_sync(None, 1).await.unwrap();

    // Completing a job that was never started is illegal.
    let err = db.complete_job(job.id).await.unwrap_err();
    assert!(matches!(err, SyncEngineError::IllegalJobTransition { found: SyncJobStatus::Pending, .. }));

    let started = db.mark_job_in_progress(job.id).await.unwrap();
    assert_eq!(started.status, SyncJobStatus::InProgress);
    assert!(started.start_sync_at.is_some());

    // Starting it twice is illegal too.
    let err = db.mark_job_in_progress(job.id).await.unwrap_err();
    assert!(matches!(err, SyncEngineError::IllegalJobTransition { found: SyncJobStatus::InProgress, .. }));

    let completed = db.complete_job(job.id).await.unwrap();
    assert_eq!(completed.status, SyncJobStatus::Completed);
    assert!(completed.end_sync_at.is_some());

    // Terminal means terminal: no transition may leave Completed.
    assert!(db.fail_job(job.id, "too late").await.is_err());
    assert!(db.mark_job_in_progress(job.id).await.is_err());
    let job = jobs.job(job.id).await.unwrap();
    assert_eq!(job.status, SyncJobStatus::Completed);
    assert!(job.last_error.is_none());
}

#[tokio::test]
async fn cabinet_outcomes_accumulate_per_key() {
    let db = new_db().await;
    let jobs = JobApi::new(db.clone());
    let job = jobs.request_sync(None, 1).await.unwrap();
    db.mark_job_in_progress(job.id).await.unwrap();

    let first = CabinetOutcome::Synced { total_processed: 5, new_transactions: 3 };
    let second = CabinetOutcome::Failed { message: "login locked".to_string() };
    db.record_cabinet_outcome(job.id, 1, first.clone()).await.unwrap();
    let job_after = db.record_cabinet_outcome(job.id, 2, second.clone()).await.unwrap();

    // Both keys survive; recording cabinet 2 must not clobber cabinet 1.
    assert_eq!(job_after.processed.len(), 2);
    assert_eq!(job_after.processed[&1], first);
    assert_eq!(job_after.processed[&2], second);

    // Partial progress is visible to a poller while the job is still running.
    assert_eq!(job_after.status, SyncJobStatus::InProgress);
    let polled = jobs.job(job.id).await.unwrap();
    assert_eq!(polled.processed.len(), 2);
}

#[tokio::test]
async fn search_filters_and_orders_newest_first() {
    let db = new_db().await;
    let jobs = JobApi::new(db.clone());
    let a = jobs.request_sync(Some(1), 1).await.unwrap();
    let b = jobs.request_sync(Some(2), 1).await.unwrap();
    let c = jobs.request_sync(Some(1), 3).await.unwrap();
    db.mark_job_in_progress(b.id).await.unwrap();
    db.fail_job(b.id, "boom").await.unwrap();

    let all = jobs.search(JobQueryFilter::default()).await.unwrap();
    assert_eq!(all.iter().map(|j| j.id).collect::<Vec<i64>>(), vec![c.id, b.id, a.id]);

    let failed = jobs.search(JobQueryFilter::default().with_status(SyncJobStatus::Failed)).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, b.id);
    assert_eq!(failed[0].last_error.as_deref(), Some("boom"));

    let for_cabinet_1 = jobs.search(JobQueryFilter::default().with_cabinet_id(1)).await.unwrap();
    assert_eq!(for_cabinet_1.iter().map(|j| j.id).collect::<Vec<i64>>(), vec![c.id, a.id]);

    let paged = jobs.search(JobQueryFilter::default().with_limit(1).with_offset(1)).await.unwrap();
    assert_eq!(paged.len(), 1);
    assert_eq!(paged[0].id, b.id);
}

#[tokio::test]
async fn stale_in_progress_jobs_are_swept() {
    let db = new_db().await;
    let jobs = JobApi::new(db.clone());
    let stale = jobs.request_sync(None, 1).await.unwrap();
    let fresh = jobs.request_sync(None, 1).await.unwrap();
    db.mark_job_in_progress(stale.id).await.unwrap();
    db.mark_job_in_progress(fresh.id).await.unwrap();

    // Backdate the stale job's start to simulate a worker that died two hours ago.
    sqlx::query("UPDATE sync_jobs SET start_sync_at = datetime('now', '-2 hours') WHERE id = $1")
        .bind(stale.id)
        .execute(db.pool())
        .await
        .unwrap();

    let swept = jobs.fail_stale_jobs(Duration::hours(1)).await.unwrap();
    assert_eq!(swept.len(), 1);
    assert_eq!(swept[0].id, stale.id);
    assert_eq!(swept[0].status, SyncJobStatus::Failed);
    assert!(swept[0].last_error.as_deref().unwrap().contains("abandoned"));

    // The fresh job is untouched.
    let fresh = jobs.job(fresh.id).await.unwrap();
    assert_eq!(fresh.status, SyncJobStatus::InProgress);
}

#[tokio::test]
async fn zero_page_depth_is_rejected() {
    let db = new_db().await;
    let jobs = JobApi::new(db.clone());
    assert!(matches!(jobs.request_sync(None, 0).await, Err(SyncEngineError::ZeroPageDepth)));
}

#[tokio::test]
async fn persist_batch_counts_duplicates_exactly() {
    let db = new_db().await;
    let cabinets = CabinetApi::new(db.clone());
    let cabinet = cabinets.create(NewCabinet::new("Main desk", "ann", "pw")).await.unwrap();
    let batch = vec![
        PanelTransaction::new("100", "w1").with_amount(CurrencyMap::new().with_amount("643", 100)),
        PanelTransaction::new("101", "w2").with_amount(CurrencyMap::new().with_amount("643", 200)),
        // Same external id twice in one batch: the second occurrence is a duplicate.
        PanelTransaction::new("100", "w1").with_amount(CurrencyMap::new().with_amount("643", 100)),
    ];

    let tally = persist_batch(&db, cabinet.id, &batch).await;
    assert_eq!(tally.total_processed, 3);
    assert_eq!(tally.new_transactions, 2);
    assert_eq!(tally.duplicates_skipped(), 1);
    assert_eq!(tally.total_processed, tally.new_transactions + tally.duplicates_skipped());
    assert_eq!(db.transaction_count(Some(cabinet.id)).await.unwrap(), 2);

    // Running the same batch again ingests nothing and changes nothing.
    let again = persist_batch(&db, cabinet.id, &batch).await;
    assert_eq!(again.total_processed, 3);
    assert_eq!(again.new_transactions, 0);
    assert_eq!(again.duplicates_skipped(), 3);
    assert_eq!(db.transaction_count(Some(cabinet.id)).await.unwrap(), 2);
}

#[tokio::test]
async fn cabinet_crud_roundtrip() {
    let db = new_db().await;
    let api = CabinetApi::new(db.clone());
    let cabinet = api.create(NewCabinet::new("Main desk", "ann", "pw")).await.unwrap();
    assert_eq!(cabinet.login, "ann");
    assert_eq!(cabinet.password.reveal(), "pw");

    let update = sync_engine::db_types::UpdateCabinetRequest::default().with_name("Night desk").with_password("pw2");
    let updated = api.update(cabinet.id, update).await.unwrap();
    assert_eq!(updated.name, "Night desk");
    assert_eq!(updated.login, "ann");
    assert_eq!(updated.password.reveal(), "pw2");

    let listed = api.list().await.unwrap();
    assert_eq!(listed.len(), 1);

    // An empty update is a no-op, not a silent success.
    let err = db.update_cabinet(cabinet.id, Default::default()).await.unwrap_err();
    assert!(matches!(err, SyncEngineError::CabinetModificationNoOp));

    api.delete(cabinet.id).await.unwrap();
    assert!(api.list().await.unwrap().is_empty());
    assert!(matches!(api.cabinet(cabinet.id).await, Err(SyncEngineError::CabinetNotFound(_))));
}
