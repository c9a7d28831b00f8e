//! Test helpers and builder patterns for orchestrator tests
//!
//! Recording collaborators that observe what the workers did, plus a builder
//! that wires them into an `Orchestrator` with sensible defaults.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use orchestrator::traits::MockLoginPrompt;
use orchestrator::{
    Applier, DedupBackend, DedupStore, JobSource, Orchestrator, OrchestratorError,
    OrchestratorResult, RateLimitPolicy, RateLimiter, ResultRecord, ResultSink, RunSummary,
    Services, SessionHandle, SessionProvider,
};
use shared::{
    ApplicationOutcome, JobId, JobPosting, ProfileDescriptor, ProfileId, RunConfig, RunMode,
    SearchTask,
};

use super::fixtures::TestFixtures;

/// Sink that keeps every record in memory
#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<ResultRecord>>,
}

impl RecordingSink {
    pub fn records(&self) -> Vec<ResultRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn outcomes_for(&self, profile: u32) -> Vec<ApplicationOutcome> {
        self.records()
            .into_iter()
            .filter(|r| r.profile == ProfileId(profile))
            .map(|r| r.outcome)
            .collect()
    }

    pub fn count(&self, outcome: ApplicationOutcome) -> usize {
        self.records().iter().filter(|r| r.outcome == outcome).count()
    }
}

#[async_trait]
impl ResultSink for RecordingSink {
    async fn record(&self, record: &ResultRecord) -> OrchestratorResult<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Session provider tracking how many sessions are open at once
#[derive(Default)]
pub struct TrackingSessionProvider {
    failing: HashSet<ProfileId>,
    open_now: AtomicUsize,
    max_open: AtomicUsize,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl TrackingSessionProvider {
    pub fn failing(profiles: &[u32]) -> Self {
        Self {
            failing: profiles.iter().copied().map(ProfileId).collect(),
            ..Self::default()
        }
    }

    pub fn max_open(&self) -> usize {
        self.max_open.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionProvider for TrackingSessionProvider {
    async fn open(&self, profile: &ProfileDescriptor) -> OrchestratorResult<SessionHandle> {
        if self.failing.contains(&profile.id) {
            return Err(OrchestratorError::SessionOpenFailed {
                profile: profile.id,
                reason: "browser did not start".to_string(),
            });
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        let now = self.open_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_open.fetch_max(now, Ordering::SeqCst);
        Ok(SessionHandle::new(profile.id, format!("test://{}", profile.id)))
    }

    async fn close(&self, _handle: SessionHandle) -> OrchestratorResult<()> {
        self.open_now.fetch_sub(1, Ordering::SeqCst);
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn is_authenticated(&self, _handle: &SessionHandle) -> OrchestratorResult<bool> {
        Ok(true)
    }
}

/// Job source serving candidates on page 0 of every search
pub enum ScriptedJobSource {
    /// The same postings for every search
    Fixed(Vec<JobPosting>),
    /// `per_page` never-seen postings for every search
    Fresh { per_page: u64, next_id: AtomicU64 },
}

impl ScriptedJobSource {
    pub fn fixed(postings: Vec<JobPosting>) -> Self {
        ScriptedJobSource::Fixed(postings)
    }

    pub fn fresh(per_page: u64) -> Self {
        ScriptedJobSource::Fresh {
            per_page,
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl JobSource for ScriptedJobSource {
    async fn list_candidates(
        &self,
        _task: &SearchTask,
        _session: &SessionHandle,
        page: u32,
    ) -> OrchestratorResult<Vec<JobPosting>> {
        if page > 0 {
            return Ok(Vec::new());
        }
        Ok(match self {
            ScriptedJobSource::Fixed(postings) => postings.clone(),
            ScriptedJobSource::Fresh { per_page, next_id } => {
                let first = next_id.fetch_add(*per_page, Ordering::SeqCst);
                TestFixtures::postings(first..first + *per_page)
            }
        })
    }
}

/// Applier returning a fixed outcome and counting attempts per profile
pub struct CountingApplier {
    outcome: ApplicationOutcome,
    latency: Duration,
    panic_for: Option<ProfileId>,
    attempts: Mutex<HashMap<ProfileId, Vec<JobId>>>,
}

impl CountingApplier {
    pub fn new(outcome: ApplicationOutcome) -> Self {
        Self {
            outcome,
            latency: Duration::ZERO,
            panic_for: None,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(ApplicationOutcome::Applied)
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Panic on every attempt made by `profile`
    pub fn panicking_for(mut self, profile: u32) -> Self {
        self.panic_for = Some(ProfileId(profile));
        self
    }

    pub fn total_attempts(&self) -> usize {
        self.attempts.lock().unwrap().values().map(Vec::len).sum()
    }

    pub fn attempts_by(&self, profile: u32) -> Vec<JobId> {
        self.attempts
            .lock()
            .unwrap()
            .get(&ProfileId(profile))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Applier for CountingApplier {
    async fn attempt(
        &self,
        posting: &JobPosting,
        session: &SessionHandle,
    ) -> OrchestratorResult<ApplicationOutcome> {
        if self.panic_for == Some(session.profile) {
            panic!("applier blew up for {}", session.profile);
        }
        self.attempts
            .lock()
            .unwrap()
            .entry(session.profile)
            .or_default()
            .push(posting.id.clone());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(self.outcome)
    }
}

/// Dedup backend keeping the durable record in memory
#[derive(Clone, Default)]
pub struct MemoryBackend {
    record: Arc<Mutex<HashSet<JobId>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryBackend {
    pub fn with_committed(ids: impl IntoIterator<Item = u64>) -> Self {
        let backend = Self::default();
        backend
            .record
            .lock()
            .unwrap()
            .extend(ids.into_iter().map(JobId::from));
        backend
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn committed(&self) -> HashSet<JobId> {
        self.record.lock().unwrap().clone()
    }
}

#[async_trait]
impl DedupBackend for MemoryBackend {
    async fn load(&self) -> OrchestratorResult<HashSet<JobId>> {
        Ok(self.committed())
    }

    async fn persist(&self, committed: &HashSet<JobId>) -> OrchestratorResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(OrchestratorError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        *self.record.lock().unwrap() = committed.clone();
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

/// Everything a test needs to inspect after a run
pub struct TestRun {
    pub orchestrator: Orchestrator,
    pub store: Arc<DedupStore>,
    pub sink: Arc<RecordingSink>,
    pub applier: Arc<CountingApplier>,
    pub sessions: Arc<TrackingSessionProvider>,
    pub backend: MemoryBackend,
}

/// Builder pattern for creating test orchestrators with sensible defaults
pub struct OrchestratorBuilder {
    config: RunConfig,
    jobs: ScriptedJobSource,
    applier: CountingApplier,
    sessions: TrackingSessionProvider,
    backend: MemoryBackend,
    limiter: Option<RateLimiter>,
}

impl OrchestratorBuilder {
    /// Two profiles, one search, three fresh postings per search, zero delays
    pub fn new() -> Self {
        Self {
            config: TestFixtures::config(TestFixtures::profiles(2)),
            jobs: ScriptedJobSource::fresh(3),
            applier: CountingApplier::succeeding(),
            sessions: TrackingSessionProvider::default(),
            backend: MemoryBackend::default(),
            limiter: None,
        }
    }

    pub fn with_profiles(mut self, count: u32) -> Self {
        self.config.profiles = TestFixtures::profiles(count);
        self
    }

    pub fn with_searches(mut self, count: usize) -> Self {
        self.config.search.keywords = TestFixtures::keywords(count);
        self
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.config.schedule.mode = mode;
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.config.schedule.max_concurrent = max;
        self
    }

    pub fn with_profile_quota(mut self, quota: u32) -> Self {
        self.config.limits.max_applications_per_profile = quota;
        self
    }

    pub fn with_run_quota(mut self, quota: u32) -> Self {
        self.config.limits.max_applications_per_run = quota;
        self
    }

    pub fn with_searches_per_profile(mut self, searches: u32) -> Self {
        self.config.limits.max_searches_per_profile = searches;
        self
    }

    pub fn with_config(mut self, edit: impl FnOnce(&mut RunConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    pub fn with_jobs(mut self, jobs: ScriptedJobSource) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn with_postings(self, postings: Vec<JobPosting>) -> Self {
        self.with_jobs(ScriptedJobSource::fixed(postings))
    }

    pub fn with_applier(mut self, applier: CountingApplier) -> Self {
        self.applier = applier;
        self
    }

    pub fn with_sessions(mut self, sessions: TrackingSessionProvider) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn with_backend(mut self, backend: MemoryBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub async fn build(self) -> TestRun {
        let store = Arc::new(
            DedupStore::open(Arc::new(self.backend.clone()), self.config.limits.allow_retry)
                .await
                .expect("store opens"),
        );
        let sink = Arc::new(RecordingSink::default());
        let applier = Arc::new(self.applier);
        let sessions = Arc::new(self.sessions);

        let mut login = MockLoginPrompt::new();
        login.expect_wait_for_login().returning(|_| Ok(())).times(0..);

        let services = Services {
            sessions: sessions.clone(),
            login: Arc::new(login),
            jobs: Arc::new(self.jobs),
            applier: applier.clone(),
            sink: sink.clone(),
        };

        let limiter = self.limiter.unwrap_or_else(|| {
            RateLimiter::with_seed(
                RateLimitPolicy::immediate(
                    self.config.limits.max_applications_per_profile,
                    self.config.limits.max_applications_per_run,
                ),
                7,
            )
        });
        let orchestrator = Orchestrator::new(self.config, services, store.clone())
            .expect("valid test configuration")
            .with_rate_limiter(limiter);

        TestRun {
            orchestrator,
            store,
            sink,
            applier,
            sessions,
            backend: self.backend,
        }
    }
}

/// Assertions shared across suites
pub struct TestHelpers;

impl TestHelpers {
    /// The run never reports more applications than it committed
    pub fn assert_run_invariant(summary: &RunSummary) {
        assert!(
            u64::from(summary.total_applied) <= summary.committed,
            "{} applied but only {} committed",
            summary.total_applied,
            summary.committed
        );
    }

    /// No job id was recorded as applied twice
    pub fn assert_no_double_apply(sink: &RecordingSink) {
        let applied: Vec<JobId> = sink
            .records()
            .into_iter()
            .filter(|r| r.outcome.is_applied())
            .map(|r| r.job_id)
            .collect();
        let unique: HashSet<&JobId> = applied.iter().collect();
        assert_eq!(applied.len(), unique.len(), "a job was applied to twice");
    }
}
