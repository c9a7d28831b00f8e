//! Test fixtures and data for orchestrator tests
//!
//! Consistent profiles, postings and configurations used across all suites.

use shared::{DelayRange, JobPosting, ProfileDescriptor, RunConfig, RunMode};

/// Standard test data and fixtures
pub struct TestFixtures;

impl TestFixtures {
    pub const PROFILE_1: u32 = 211;
    pub const PROFILE_2: u32 = 212;
    pub const PROFILE_3: u32 = 213;

    pub const BLACKLISTED_COMPANY: &'static str = "Crossover";

    pub fn profile(id: u32) -> ProfileDescriptor {
        ProfileDescriptor::new(id, format!("Profile {id}"))
    }

    /// `count` profiles numbered from `PROFILE_1`
    pub fn profiles(count: u32) -> Vec<ProfileDescriptor> {
        (0..count).map(|i| Self::profile(Self::PROFILE_1 + i)).collect()
    }

    pub fn posting(id: u64) -> JobPosting {
        JobPosting {
            id: id.into(),
            title: "Frontend Engineer".to_string(),
            company: format!("Company {id}"),
            location: "Remote".to_string(),
        }
    }

    pub fn postings(ids: impl IntoIterator<Item = u64>) -> Vec<JobPosting> {
        ids.into_iter().map(Self::posting).collect()
    }

    pub fn blacklisted_posting(id: u64) -> JobPosting {
        JobPosting {
            company: format!("{} Inc", Self::BLACKLISTED_COMPANY),
            ..Self::posting(id)
        }
    }

    pub fn keywords(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("keyword{i}")).collect()
    }

    /// Configuration with zero delays, one page per search and one location
    pub fn config(profiles: Vec<ProfileDescriptor>) -> RunConfig {
        let mut config = RunConfig {
            profiles,
            ..RunConfig::default()
        };
        config.search.keywords = Self::keywords(1);
        config.search.locations = vec!["EMEA".to_string()];
        config.filters.blacklist_companies = vec![Self::BLACKLISTED_COMPANY.to_string()];
        config.schedule.mode = RunMode::Sequential;
        config.schedule.application_delay = DelayRange::zero();
        config.schedule.session_switch_delay = DelayRange::zero();
        config.schedule.stagger_delay = DelayRange::zero();
        config.schedule.search_delay = DelayRange::zero();
        config.schedule.seed = Some(7);
        config.limits.max_pages_per_search = 1;
        config.limits.attempt_timeout_secs = 5;
        config
    }
}
