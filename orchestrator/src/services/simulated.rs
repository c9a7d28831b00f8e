//! Simulated collaborators for dry runs
//!
//! Deterministic stand-ins for a browser backend. Postings are drawn from a
//! bounded id pool so different searches overlap, which exercises the dedup
//! store the way real result pages do.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{
    session_debug, ApplicationOutcome, FailureReason, JobId, JobPosting, ProfileDescriptor,
    ProfileId, SearchTask,
};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::{Applier, JobSource, LoginPrompt, SessionHandle, SessionProvider};

/// First posting id of the simulated pool
const POSTING_ID_BASE: u64 = 3_790_000_000;

const TITLES: &[&str] = &[
    "Frontend Engineer",
    "Senior React Developer",
    "TypeScript Developer",
    "Full Stack Engineer",
    "JavaScript Developer",
    "UI Engineer",
];

const COMPANIES: &[&str] = &["Acme", "Globex", "Initech", "Umbrella", "Hooli", "Vandelay"];

/// Session provider that always opens, optionally refusing some profiles
#[derive(Default)]
pub struct SimulatedSessionProvider {
    unavailable: HashSet<ProfileId>,
    logged_out: HashSet<ProfileId>,
    open_sessions: AtomicUsize,
}

impl SimulatedSessionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail to open the given profile
    pub fn with_unavailable(mut self, profile: ProfileId) -> Self {
        self.unavailable.insert(profile);
        self
    }

    /// Report the given profile as never logged in
    pub fn with_logged_out(mut self, profile: ProfileId) -> Self {
        self.logged_out.insert(profile);
        self
    }

    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionProvider for SimulatedSessionProvider {
    async fn open(&self, profile: &ProfileDescriptor) -> OrchestratorResult<SessionHandle> {
        if self.unavailable.contains(&profile.id) {
            return Err(OrchestratorError::SessionOpenFailed {
                profile: profile.id,
                reason: "profile is not available".to_string(),
            });
        }
        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(SessionHandle::new(profile.id, format!("sim://{}", profile.id)))
    }

    async fn close(&self, handle: SessionHandle) -> OrchestratorResult<()> {
        session_debug!(handle.profile, "Closing simulated session {}", handle.endpoint);
        self.open_sessions.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    async fn is_authenticated(&self, handle: &SessionHandle) -> OrchestratorResult<bool> {
        Ok(!self.logged_out.contains(&handle.profile))
    }
}

/// Login prompt that returns immediately
pub struct AutoLoginPrompt;

#[async_trait]
impl LoginPrompt for AutoLoginPrompt {
    async fn wait_for_login(&self, _profile: &ProfileDescriptor) -> OrchestratorResult<()> {
        Ok(())
    }
}

/// Job source producing reproducible pages of postings
pub struct SimulatedJobSource {
    seed: u64,
    pool_size: u64,
    page_size: usize,
    pages: u32,
}

impl SimulatedJobSource {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            pool_size: 200,
            page_size: 10,
            pages: 2,
        }
    }

    /// Number of distinct posting ids the pages draw from
    pub fn with_pool_size(mut self, pool_size: u64) -> Self {
        self.pool_size = pool_size.max(1);
        self
    }

    pub fn with_pages(mut self, pages: u32, page_size: usize) -> Self {
        self.pages = pages;
        self.page_size = page_size;
        self
    }

    fn page_rng(&self, task: &SearchTask, page: u32) -> StdRng {
        let mut hasher = DefaultHasher::new();
        self.seed.hash(&mut hasher);
        task.to_string().hash(&mut hasher);
        page.hash(&mut hasher);
        StdRng::seed_from_u64(hasher.finish())
    }
}

#[async_trait]
impl JobSource for SimulatedJobSource {
    async fn list_candidates(
        &self,
        task: &SearchTask,
        session: &SessionHandle,
        page: u32,
    ) -> OrchestratorResult<Vec<JobPosting>> {
        session_debug!(session.profile, "Listing {}", task.descriptor.page_url(page));
        if page >= self.pages {
            return Ok(Vec::new());
        }

        let mut rng = self.page_rng(task, page);
        let postings = (0..self.page_size)
            .map(|_| {
                let offset = rng.gen_range(0..self.pool_size);
                let title = TITLES[(offset as usize) % TITLES.len()];
                let company = COMPANIES[(offset as usize / TITLES.len()) % COMPANIES.len()];
                JobPosting {
                    id: JobId::from(POSTING_ID_BASE + offset),
                    title: title.to_string(),
                    company: company.to_string(),
                    location: task.location.clone(),
                }
            })
            .collect();
        Ok(postings)
    }
}

/// Applier that succeeds with a fixed probability
pub struct SimulatedApplier {
    success_rate: f64,
    rng: Mutex<StdRng>,
}

impl SimulatedApplier {
    pub fn new(seed: u64, success_rate: f64) -> Self {
        Self {
            success_rate: success_rate.clamp(0.0, 1.0),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

#[async_trait]
impl Applier for SimulatedApplier {
    async fn attempt(
        &self,
        posting: &JobPosting,
        session: &SessionHandle,
    ) -> OrchestratorResult<ApplicationOutcome> {
        let applied = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            rng.gen_bool(self.success_rate)
        };
        session_debug!(session.profile, "Simulated attempt on {}: {}", posting.id, applied);
        Ok(if applied {
            ApplicationOutcome::Applied
        } else {
            ApplicationOutcome::Failed(FailureReason::ExtraInfoRequired)
        })
    }
}
