//! Run configuration types
//!
//! A `RunConfig` is loaded once from a JSON file before the orchestrator
//! starts and is read-only afterwards. Every field has a default so a partial
//! file is enough.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{SharedError, SharedResult};
use crate::types::ProfileDescriptor;

/// How the orchestrator schedules session workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    #[default]
    Sequential,
    Parallel,
}

impl std::str::FromStr for RunMode {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sequential" => Ok(RunMode::Sequential),
            "parallel" => Ok(RunMode::Parallel),
            _ => Err(SharedError::invalid_config("mode", s)),
        }
    }
}

/// Longest delay a configured range may ask for
pub const MAX_DELAY_SECS: f64 = 24.0 * 60.0 * 60.0;

/// Closed interval of seconds a randomized delay is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl DelayRange {
    pub const fn secs(min_secs: f64, max_secs: f64) -> Self {
        Self { min_secs, max_secs }
    }

    /// Range that always yields exactly `delay`
    pub fn fixed(delay: Duration) -> Self {
        let secs = delay.as_secs_f64();
        Self { min_secs: secs, max_secs: secs }
    }

    pub const fn zero() -> Self {
        Self { min_secs: 0.0, max_secs: 0.0 }
    }

    pub fn min(&self) -> Duration {
        Duration::try_from_secs_f64(self.min_secs).unwrap_or(Duration::ZERO)
    }

    pub fn max(&self) -> Duration {
        Duration::try_from_secs_f64(self.max_secs).unwrap_or(Duration::ZERO)
    }

    fn validate(&self, field: &str) -> SharedResult<()> {
        let valid = self.min_secs.is_finite()
            && self.max_secs.is_finite()
            && self.min_secs >= 0.0
            && self.min_secs <= self.max_secs
            && self.max_secs <= MAX_DELAY_SECS;
        if valid {
            Ok(())
        } else {
            Err(SharedError::invalid_config(
                field,
                format!("[{}, {}]", self.min_secs, self.max_secs),
            ))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExperienceLevel {
    Internship,
    #[serde(rename = "Entry level")]
    EntryLevel,
    Associate,
    #[serde(rename = "Mid-Senior level")]
    MidSenior,
    Director,
    Executive,
}

impl ExperienceLevel {
    pub fn code(&self) -> &'static str {
        match self {
            ExperienceLevel::Internship => "1",
            ExperienceLevel::EntryLevel => "2",
            ExperienceLevel::Associate => "3",
            ExperienceLevel::MidSenior => "4",
            ExperienceLevel::Director => "5",
            ExperienceLevel::Executive => "6",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobType {
    #[serde(rename = "Full-time")]
    FullTime,
    #[serde(rename = "Part-time")]
    PartTime,
    Contract,
    Temporary,
    Volunteer,
    Internship,
    Other,
}

impl JobType {
    pub fn code(&self) -> &'static str {
        match self {
            JobType::FullTime => "F",
            JobType::PartTime => "P",
            JobType::Contract => "C",
            JobType::Temporary => "T",
            JobType::Volunteer => "V",
            JobType::Internship => "I",
            JobType::Other => "O",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkplaceType {
    #[serde(rename = "On-site")]
    OnSite,
    Remote,
    Hybrid,
}

impl WorkplaceType {
    pub fn code(&self) -> &'static str {
        match self {
            WorkplaceType::OnSite => "1",
            WorkplaceType::Remote => "2",
            WorkplaceType::Hybrid => "3",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DatePosted {
    #[default]
    #[serde(rename = "Any Time")]
    AnyTime,
    #[serde(rename = "Past Month")]
    PastMonth,
    #[serde(rename = "Past Week")]
    PastWeek,
    #[serde(rename = "Past 24 hours")]
    PastDay,
}

impl DatePosted {
    /// Value of the time-posted-range parameter, `None` for any time
    pub fn code(&self) -> Option<&'static str> {
        match self {
            DatePosted::AnyTime => None,
            DatePosted::PastMonth => Some("r2592000"),
            DatePosted::PastWeek => Some("r604800"),
            DatePosted::PastDay => Some("r86400"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalaryFloor {
    #[serde(rename = "$40,000+")]
    K40,
    #[serde(rename = "$60,000+")]
    K60,
    #[serde(rename = "$80,000+")]
    K80,
    #[serde(rename = "$100,000+")]
    K100,
    #[serde(rename = "$120,000+")]
    K120,
    #[serde(rename = "$140,000+")]
    K140,
    #[serde(rename = "$160,000+")]
    K160,
    #[serde(rename = "$180,000+")]
    K180,
    #[serde(rename = "$200,000+")]
    K200,
}

impl SalaryFloor {
    pub fn code(&self) -> &'static str {
        match self {
            SalaryFloor::K40 => "1",
            SalaryFloor::K60 => "2",
            SalaryFloor::K80 => "3",
            SalaryFloor::K100 => "4",
            SalaryFloor::K120 => "5",
            SalaryFloor::K140 => "6",
            SalaryFloor::K160 => "7",
            SalaryFloor::K180 => "8",
            SalaryFloor::K200 => "9",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    Recent,
    Relevant,
}

impl SortOrder {
    pub fn code(&self) -> &'static str {
        match self {
            SortOrder::Recent => "DD",
            SortOrder::Relevant => "R",
        }
    }
}

/// Inputs of the search cross-product
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: String,
    pub keywords: Vec<String>,
    pub locations: Vec<String>,
    pub easy_apply_only: bool,
    pub experience_levels: Vec<ExperienceLevel>,
    pub date_posted: DatePosted,
    pub job_types: Vec<JobType>,
    pub workplace: Vec<WorkplaceType>,
    pub salary: Option<SalaryFloor>,
    pub sort: SortOrder,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.linkedin.com/jobs/search/".to_string(),
            keywords: vec![
                "react".to_string(),
                "javascript".to_string(),
                "frontend".to_string(),
                "typescript".to_string(),
            ],
            locations: vec!["EMEA".to_string()],
            easy_apply_only: true,
            experience_levels: vec![
                ExperienceLevel::EntryLevel,
                ExperienceLevel::Associate,
                ExperienceLevel::MidSenior,
                ExperienceLevel::Director,
                ExperienceLevel::Executive,
            ],
            date_posted: DatePosted::AnyTime,
            job_types: vec![JobType::FullTime, JobType::PartTime, JobType::Contract],
            workplace: vec![WorkplaceType::Remote],
            salary: Some(SalaryFloor::K60),
            sort: SortOrder::Recent,
        }
    }
}

/// Static candidate filters applied before any dedup interaction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Companies to avoid, matched case-insensitively as substrings
    pub blacklist_companies: Vec<String>,
    /// Title keywords to avoid, matched case-insensitively as substrings
    pub blacklist_titles: Vec<String>,
    /// When non-empty, only these companies are applied to
    pub only_apply_companies: Vec<String>,
    /// Case-insensitive regex an acceptable title must match
    pub title_format: Option<String>,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl FilterConfig {
    /// Filters that let every posting through
    pub fn none() -> Self {
        Self {
            blacklist_companies: Vec::new(),
            blacklist_titles: Vec::new(),
            only_apply_companies: Vec::new(),
            title_format: None,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            blacklist_companies: strings(&[
                "EPAM",
                "primeit",
                "ERP",
                "Luxoft",
                "Intellias",
                "GR4",
                "Devoteam",
                "Signify Technology",
                "Crossover",
                "YouGov",
                "Trust In SODA",
                "URBAN LINKER",
                "ALTEN",
                "VIEWNEXT",
                "Braintrust",
                "Mentor Talent Acquisition",
                "Hays",
                "Theta",
                "atSistemas",
                "Cloudflare",
                "Solas IT Recruitment",
                "THRIVE",
                "Noir",
                "Treatwell",
                "Storyteq",
                "Vivid",
                "Infinity Quest",
                "Mindrift",
            ]),
            blacklist_titles: strings(&[
                "Quality Assurance",
                "Mentor",
                "Microsoft Dynamics 365",
                "Sales",
                "AEM",
                "Test",
                "Embedded",
                "Adult",
                "Intern",
            ]),
            only_apply_companies: Vec::new(),
            title_format: Some(
                "(javascript|typescript|frontend|front-end|front end|fullstack|full-stack|full stack|react|angular|vue|next|nuxt|gatsby|node|express|nest|js|software|web).*(dev|engineer|manager|architect|programmer|expert)"
                    .to_string(),
            ),
        }
    }
}

/// Scheduling mode and pacing bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub mode: RunMode,
    pub max_concurrent: usize,
    pub application_delay: DelayRange,
    pub session_switch_delay: DelayRange,
    pub stagger_delay: DelayRange,
    pub search_delay: DelayRange,
    /// Seed for the delay RNG; random when absent
    pub seed: Option<u64>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Sequential,
            max_concurrent: 2,
            application_delay: DelayRange::secs(30.0, 90.0),
            session_switch_delay: DelayRange::secs(60.0, 120.0),
            stagger_delay: DelayRange::secs(10.0, 20.0),
            search_delay: DelayRange::secs(30.0, 60.0),
            seed: None,
        }
    }
}

/// Quotas, budgets and retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitConfig {
    pub max_applications_per_profile: u32,
    pub max_applications_per_run: u32,
    pub max_pages_per_search: u32,
    pub max_searches_per_profile: u32,
    pub attempt_timeout_secs: u64,
    pub max_retry_attempts: u32,
    /// Free unsuccessful jobs for a later attempt within the same run
    pub allow_retry: bool,
}

impl LimitConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_applications_per_profile: 30,
            max_applications_per_run: 100,
            max_pages_per_search: 5,
            max_searches_per_profile: 10,
            attempt_timeout_secs: 120,
            max_retry_attempts: 3,
            allow_retry: false,
        }
    }
}

/// Complete, read-only configuration of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub profiles: Vec<ProfileDescriptor>,
    pub search: SearchConfig,
    pub filters: FilterConfig,
    pub schedule: ScheduleConfig,
    pub limits: LimitConfig,
    pub data_dir: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            profiles: Vec::new(),
            search: SearchConfig::default(),
            filters: FilterConfig::default(),
            schedule: ScheduleConfig::default(),
            limits: LimitConfig::default(),
            data_dir: PathBuf::from("data"),
        }
    }
}

impl RunConfig {
    /// Load a configuration file; missing fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> SharedResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SharedError::ConfigLoad {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| SharedError::ConfigLoad {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Reject configurations that cannot produce a meaningful run
    pub fn validate(&self) -> SharedResult<()> {
        if self.profiles.is_empty() {
            return Err(SharedError::invalid_config("profiles", "[]"));
        }
        if self.search.keywords.is_empty() {
            return Err(SharedError::invalid_config("search.keywords", "[]"));
        }
        if self.search.locations.is_empty() {
            return Err(SharedError::invalid_config("search.locations", "[]"));
        }
        if self.schedule.max_concurrent == 0 {
            return Err(SharedError::invalid_config("schedule.max_concurrent", 0));
        }
        if self.limits.attempt_timeout_secs == 0 {
            return Err(SharedError::invalid_config("limits.attempt_timeout_secs", 0));
        }
        if self.limits.max_retry_attempts == 0 {
            return Err(SharedError::invalid_config("limits.max_retry_attempts", 0));
        }

        self.schedule.application_delay.validate("schedule.application_delay")?;
        self.schedule.session_switch_delay.validate("schedule.session_switch_delay")?;
        self.schedule.stagger_delay.validate("schedule.stagger_delay")?;
        self.schedule.search_delay.validate("schedule.search_delay")?;

        let mut seen = std::collections::HashSet::new();
        for profile in &self.profiles {
            if !seen.insert(profile.id) {
                return Err(SharedError::invalid_config("profiles", profile.id));
            }
        }
        Ok(())
    }
}
