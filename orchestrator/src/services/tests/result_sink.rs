//! Tests for the per-session result logs

use std::sync::Arc;

use chrono::NaiveDate;
use shared::{ApplicationOutcome, FailureReason, SkipReason};
use tempfile::TempDir;
use tokio::fs;

use super::common::{result_record, with_timeout};
use crate::services::result_sink::{log_file_date, sanitize_profile_name, FileResultSink};
use crate::traits::ResultSink;

#[test]
fn test_sanitize_profile_name() {
    assert_eq!(sanitize_profile_name("CA Sota"), "CA_Sota");
    assert_eq!(sanitize_profile_name("  a/b: c  "), "ab_c");
    assert_eq!(sanitize_profile_name("Profile_211"), "Profile_211");
}

#[test]
fn test_log_file_date() {
    assert_eq!(
        log_file_date("Applied_Jobs_CA_Sota_20240503.jsonl"),
        NaiveDate::from_ymd_opt(2024, 5, 3)
    );
    assert_eq!(log_file_date("Applied_Jobs_x_2024.jsonl"), None);
    assert_eq!(log_file_date("applied_jobs.json"), None);
}

#[tokio::test]
async fn test_records_are_appended_per_profile_and_day() {
    let dir = TempDir::new().unwrap();
    let sink = FileResultSink::in_dir(dir.path());

    sink.record(&result_record("CA Sota", 1, 3, ApplicationOutcome::Applied))
        .await
        .unwrap();
    sink.record(&result_record(
        "CA Sota",
        2,
        3,
        ApplicationOutcome::Skipped(SkipReason::AlreadyApplied),
    ))
    .await
    .unwrap();
    sink.record(&result_record("CA Sota", 3, 4, ApplicationOutcome::Applied))
        .await
        .unwrap();

    let day3 = sink.log_path("CA Sota", NaiveDate::from_ymd_opt(2024, 5, 3).unwrap());
    assert!(day3.ends_with("results/Applied_Jobs_CA_Sota_20240503.jsonl"));
    let content = fs::read_to_string(&day3).await.unwrap();
    assert_eq!(content.lines().count(), 2);

    let records = sink.read_all().await.unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(sink.log_files().await.unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_appends_keep_lines_intact() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(FileResultSink::in_dir(dir.path()));

    let mut handles = Vec::new();
    for job in 0..40 {
        let sink = sink.clone();
        handles.push(tokio::spawn(async move {
            let outcome = if job % 2 == 0 {
                ApplicationOutcome::Applied
            } else {
                ApplicationOutcome::Failed(FailureReason::Timeout)
            };
            sink.record(&result_record("Shared", job, 5, outcome)).await
        }));
    }
    for handle in handles {
        with_timeout(handle).await.unwrap().unwrap().unwrap();
    }

    let records = sink.read_all().await.unwrap();
    assert_eq!(records.len(), 40);
}

#[tokio::test]
async fn test_read_all_skips_malformed_lines() {
    let dir = TempDir::new().unwrap();
    let sink = FileResultSink::in_dir(dir.path());
    sink.record(&result_record("P", 1, 6, ApplicationOutcome::Applied))
        .await
        .unwrap();

    let path = sink.log_path("P", NaiveDate::from_ymd_opt(2024, 5, 6).unwrap());
    let mut content = fs::read_to_string(&path).await.unwrap();
    content.push_str("garbage\n");
    fs::write(&path, content).await.unwrap();

    assert_eq!(sink.read_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_cleanup_removes_only_old_logs() {
    let dir = TempDir::new().unwrap();
    let sink = FileResultSink::in_dir(dir.path());
    for day in [1, 10, 20] {
        sink.record(&result_record("P", u64::from(day), day, ApplicationOutcome::Applied))
            .await
            .unwrap();
    }

    let today = NaiveDate::from_ymd_opt(2024, 5, 25).unwrap();
    let removed = sink.cleanup_older_than(10, today).await.unwrap();

    assert_eq!(removed.len(), 2);
    let remaining = sink.log_files().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].1, NaiveDate::from_ymd_opt(2024, 5, 20).unwrap());
}

#[tokio::test]
async fn test_missing_results_dir_is_empty() {
    let dir = TempDir::new().unwrap();
    let sink = FileResultSink::in_dir(dir.path().join("nowhere"));
    assert!(sink.read_all().await.unwrap().is_empty());
}
