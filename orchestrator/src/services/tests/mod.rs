//! Service-specific tests
//!
//! Each file-backed service works against its own temporary directory.

mod result_sink;

pub mod common {
    use chrono::{TimeZone, Utc};
    use shared::{ApplicationOutcome, JobId, ProfileId};
    use std::time::Duration;
    use tokio::time::timeout;

    use crate::traits::ResultRecord;

    /// Standard timeout for async operations in tests
    pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    pub async fn with_timeout<T, F>(future: F) -> Result<T, tokio::time::error::Elapsed>
    where
        F: std::future::Future<Output = T>,
    {
        timeout(TEST_TIMEOUT, future).await
    }

    pub fn result_record(profile: &str, job: u64, day: u32, outcome: ApplicationOutcome) -> ResultRecord {
        ResultRecord {
            timestamp: Utc.with_ymd_and_hms(2024, 5, day, 9, 30, 0).unwrap(),
            profile: ProfileId(211),
            profile_name: profile.to_string(),
            job_id: JobId::from(job),
            title: "Frontend Engineer".to_string(),
            company: "Acme".to_string(),
            location: "Remote".to_string(),
            search: "react @ EMEA".to_string(),
            outcome,
            result: outcome.label().to_string(),
        }
    }
}
