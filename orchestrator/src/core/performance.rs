//! Performance analysis over result logs and run snapshots
//!
//! Pure computation only: the history file and the result logs are read by
//! `services`, then handed to the functions here.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::{ApplicationOutcome, ProfileId, SkipReason};
use uuid::Uuid;

use super::state::SessionStats;
use crate::traits::ResultRecord;

/// Success rate below which a profile is flagged
pub const LOW_SUCCESS_RATE: f64 = 50.0;
/// Success rate above which a profile could take more volume
pub const HIGH_SUCCESS_RATE: f64 = 80.0;
/// Share of blacklisted encounters per application that is considered high
pub const HIGH_BLACKLIST_RATIO: f64 = 0.3;
/// Duplicate encounters above which searches look exhausted
pub const MANY_DUPLICATES: u32 = 10;

fn rate(successes: u32, applications: u32) -> f64 {
    match applications {
        0 => 0.0,
        n => successes as f64 / n as f64 * 100.0,
    }
}

/// Per-session figures stored in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPerformance {
    pub name: String,
    pub applications: u32,
    pub successes: u32,
    pub failures: u32,
    pub success_rate: f64,
}

impl SessionPerformance {
    pub fn from_stats(name: impl Into<String>, stats: &SessionStats) -> Self {
        Self {
            name: name.into(),
            applications: stats.attempts(),
            successes: stats.applied,
            failures: stats.failed,
            success_rate: stats.success_rate(),
        }
    }
}

/// One entry of the append-only performance history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub timestamp: DateTime<Utc>,
    pub run_id: Uuid,
    pub per_session: BTreeMap<ProfileId, SessionPerformance>,
}

impl PerformanceSnapshot {
    pub fn total_successes(&self) -> u32 {
        self.per_session.values().map(|p| p.successes).sum()
    }
}

/// Aggregated result-log figures for one profile
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileReport {
    pub total_applications: u32,
    pub successful: u32,
    pub failed: u32,
    pub blacklisted: u32,
    pub already_applied: u32,
    pub active_days: BTreeSet<NaiveDate>,
}

impl ProfileReport {
    pub fn success_rate(&self) -> f64 {
        rate(self.successful, self.total_applications)
    }

    pub fn applications_per_day(&self) -> f64 {
        match self.active_days.len() {
            0 => 0.0,
            days => self.total_applications as f64 / days as f64,
        }
    }

    fn add(&mut self, record: &ResultRecord) {
        self.active_days.insert(record.timestamp.date_naive());
        match record.outcome {
            ApplicationOutcome::Applied => {
                self.successful += 1;
                self.total_applications += 1;
            }
            ApplicationOutcome::Failed(_) => {
                self.failed += 1;
                self.total_applications += 1;
            }
            ApplicationOutcome::Skipped(SkipReason::Blacklisted)
            | ApplicationOutcome::Skipped(SkipReason::TitleMismatch) => self.blacklisted += 1,
            ApplicationOutcome::Skipped(SkipReason::AlreadyApplied) => self.already_applied += 1,
            ApplicationOutcome::Skipped(SkipReason::QuotaReached) => {}
        }
    }
}

/// Per-profile analysis of every result log
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LogAnalysis {
    pub profiles: BTreeMap<String, ProfileReport>,
}

impl LogAnalysis {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ResultRecord>) -> Self {
        let mut profiles: BTreeMap<String, ProfileReport> = BTreeMap::new();
        for record in records {
            profiles
                .entry(record.profile_name.clone())
                .or_default()
                .add(record);
        }
        Self { profiles }
    }

    pub fn total_applications(&self) -> u32 {
        self.profiles.values().map(|p| p.total_applications).sum()
    }

    pub fn total_successful(&self) -> u32 {
        self.profiles.values().map(|p| p.successful).sum()
    }

    pub fn total_failed(&self) -> u32 {
        self.profiles.values().map(|p| p.failed).sum()
    }

    pub fn success_rate(&self) -> f64 {
        rate(self.total_successful(), self.total_applications())
    }

    /// Profile with the most successful applications; ties go to the first name
    pub fn best_profile(&self) -> Option<(&str, &ProfileReport)> {
        self.profiles
            .iter()
            .fold(None, |best: Option<(&String, &ProfileReport)>, (name, report)| match best {
                Some((_, b)) if b.successful >= report.successful => best,
                _ => Some((name, report)),
            })
            .map(|(name, report)| (name.as_str(), report))
    }

    pub fn recommendations(&self) -> Vec<Recommendation> {
        let mut out = Vec::new();
        for (name, report) in &self.profiles {
            if report.total_applications == 0 {
                continue;
            }

            let success_rate = report.success_rate();
            if success_rate < LOW_SUCCESS_RATE {
                out.push(Recommendation::new(name, Advice::LowSuccessRate));
            } else if success_rate > HIGH_SUCCESS_RATE {
                out.push(Recommendation::new(name, Advice::HighSuccessRate));
            }
            if report.blacklisted as f64 > report.total_applications as f64 * HIGH_BLACKLIST_RATIO {
                out.push(Recommendation::new(name, Advice::HighBlacklistRate));
            }
            if report.already_applied > MANY_DUPLICATES {
                out.push(Recommendation::new(name, Advice::ManyDuplicates));
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Advice {
    LowSuccessRate,
    HighSuccessRate,
    HighBlacklistRate,
    ManyDuplicates,
}

impl Advice {
    pub fn message(&self) -> &'static str {
        match self {
            Advice::LowSuccessRate => {
                "⚠️ Low success rate: review application criteria and search filters"
            }
            Advice::HighSuccessRate => {
                "✅ Excellent success rate: consider raising the per-profile limit"
            }
            Advice::HighBlacklistRate => {
                "⚠️ High blacklist encounter rate: review the blacklist or narrow search terms"
            }
            Advice::ManyDuplicates => {
                "ℹ️ Many duplicate encounters: try other locations or keywords"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub profile: String,
    pub advice: Advice,
}

impl Recommendation {
    fn new(profile: &str, advice: Advice) -> Self {
        Self {
            profile: profile.to_string(),
            advice,
        }
    }
}

/// One row of a profile's trend table
#[derive(Debug, Clone, PartialEq)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub applications: u32,
    pub successes: u32,
    pub success_rate: f64,
}

/// Snapshot history of the last `days` days, grouped by profile name
pub fn trends(
    history: &[PerformanceSnapshot],
    days: u32,
    now: DateTime<Utc>,
) -> BTreeMap<String, Vec<TrendPoint>> {
    let cutoff = now - ChronoDuration::days(i64::from(days));
    let mut recent: Vec<&PerformanceSnapshot> =
        history.iter().filter(|s| s.timestamp >= cutoff).collect();
    recent.sort_by_key(|s| s.timestamp);

    let mut by_profile: BTreeMap<String, Vec<TrendPoint>> = BTreeMap::new();
    for snapshot in recent {
        for perf in snapshot.per_session.values() {
            by_profile.entry(perf.name.clone()).or_default().push(TrendPoint {
                date: snapshot.timestamp.date_naive(),
                applications: perf.applications,
                successes: perf.successes,
                success_rate: perf.success_rate,
            });
        }
    }
    by_profile
}
