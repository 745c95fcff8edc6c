use chrono::{Duration, Utc};

use underwriter::application::ports::{JobRepository, RepositoryError};
use underwriter::domain::{InsuranceType, Job, JobError, JobStatus, JobUpdate, ObjectKey};
use underwriter::infrastructure::persistence::InMemoryJobRepository;

fn job(key: &str) -> Job {
    Job::new(ObjectKey::from_raw(key), InsuranceType::Life)
}

#[tokio::test]
async fn given_created_job_when_creating_twice_then_constraint_violation_is_returned() {
    let repository = InMemoryJobRepository::new();
    let job = job("uploads/a.pdf");

    repository.create(&job).await.unwrap();
    let error = repository.create(&job).await.unwrap_err();

    assert!(matches!(error, RepositoryError::ConstraintViolation(_)));
}

#[tokio::test]
async fn given_stale_expected_status_when_transitioning_then_conflict_is_returned() {
    let repository = InMemoryJobRepository::new();
    let job = job("uploads/a.pdf");
    repository.create(&job).await.unwrap();
    repository
        .transition(job.id, JobStatus::Created, &JobUpdate::claim(JobStatus::Classifying))
        .await
        .unwrap();

    let error = repository
        .transition(job.id, JobStatus::Created, &JobUpdate::claim(JobStatus::Classifying))
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        RepositoryError::Conflict {
            expected: JobStatus::Created,
            actual: JobStatus::Classifying,
            ..
        }
    ));
}

#[tokio::test]
async fn given_illegal_target_when_transitioning_then_record_is_unchanged() {
    let repository = InMemoryJobRepository::new();
    let job = job("uploads/a.pdf");
    repository.create(&job).await.unwrap();

    let error = repository
        .transition(job.id, JobStatus::Created, &JobUpdate::claim(JobStatus::Analyzing))
        .await
        .unwrap_err();

    assert!(matches!(error, RepositoryError::InvalidTransition { .. }));
    let stored = repository.get_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored, job);
}

#[tokio::test]
async fn given_missing_job_when_transitioning_then_not_found_is_returned() {
    let repository = InMemoryJobRepository::new();
    let job = job("uploads/a.pdf");

    let error = repository
        .transition(job.id, JobStatus::Created, &JobUpdate::claim(JobStatus::Classifying))
        .await
        .unwrap_err();

    assert!(matches!(error, RepositoryError::NotFound(_)));
}

#[tokio::test]
async fn given_several_jobs_for_one_key_when_finding_latest_then_newest_is_returned() {
    let repository = InMemoryJobRepository::new();
    let mut older = job("uploads/a.pdf");
    older.created_at = Utc::now() - Duration::hours(1);
    let newer = job("uploads/a.pdf");
    repository.insert_raw(older).await;
    repository.insert_raw(newer.clone()).await;
    repository.insert_raw(job("uploads/b.pdf")).await;

    let latest = repository
        .find_latest_by_source_key(&ObjectKey::from_raw("uploads/a.pdf"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(latest.id, newer.id);
}

#[tokio::test]
async fn given_jobs_when_listing_recent_then_newest_come_first_up_to_limit() {
    let repository = InMemoryJobRepository::new();
    for hours in [3, 1, 2] {
        let mut job = job(&format!("uploads/{hours}.pdf"));
        job.created_at = Utc::now() - Duration::hours(hours);
        repository.insert_raw(job).await;
    }

    let recent = repository.list_recent(2).await.unwrap();

    let names: Vec<&str> = recent.iter().map(|j| j.original_filename.as_str()).collect();
    assert_eq!(names, vec!["1.pdf", "2.pdf"]);
}

#[tokio::test]
async fn given_mixed_jobs_when_listing_terminal_before_cutoff_then_only_old_terminal_jobs_match() {
    let repository = InMemoryJobRepository::new();
    let now = Utc::now();

    let mut old_failed = job("uploads/old.pdf");
    old_failed.apply(&JobUpdate::fail(JobError::new("Classify", "x")), now - Duration::days(9));
    let mut recent_failed = job("uploads/recent.pdf");
    recent_failed.apply(&JobUpdate::fail(JobError::new("Classify", "x")), now);
    let mut old_running = job("uploads/running.pdf");
    old_running.updated_at = now - Duration::days(30);

    for job in [old_failed.clone(), recent_failed, old_running] {
        repository.insert_raw(job).await;
    }

    let expired = repository
        .list_terminal_before(now - Duration::days(7))
        .await
        .unwrap();

    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].id, old_failed.id);
}

#[tokio::test]
async fn given_job_when_deleting_then_second_delete_reports_nothing_removed() {
    let repository = InMemoryJobRepository::new();
    let job = job("uploads/a.pdf");
    repository.create(&job).await.unwrap();

    assert!(repository.delete(job.id).await.unwrap());
    assert!(!repository.delete(job.id).await.unwrap());
    assert!(repository.is_empty().await);
}
