//! Pacing and quota decisions
//!
//! Delays are drawn uniformly from configured closed ranges. The RNG can be
//! seeded so that a whole run's pacing is reproducible in tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{session_debug, DelayRange, RunConfig};
use tokio::sync::Notify;

use super::state::SessionState;

/// Delay ranges and quotas a `RateLimiter` enforces
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitPolicy {
    pub application_delay: DelayRange,
    pub session_switch_delay: DelayRange,
    pub stagger_delay: DelayRange,
    pub search_delay: DelayRange,
    pub per_session_quota: u32,
    pub global_quota: u32,
}

impl RateLimitPolicy {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            application_delay: config.schedule.application_delay,
            session_switch_delay: config.schedule.session_switch_delay,
            stagger_delay: config.schedule.stagger_delay,
            search_delay: config.schedule.search_delay,
            per_session_quota: config.limits.max_applications_per_profile,
            global_quota: config.limits.max_applications_per_run,
        }
    }

    /// Policy with every delay set to zero
    pub fn immediate(per_session_quota: u32, global_quota: u32) -> Self {
        Self {
            application_delay: DelayRange::zero(),
            session_switch_delay: DelayRange::zero(),
            stagger_delay: DelayRange::zero(),
            search_delay: DelayRange::zero(),
            per_session_quota,
            global_quota,
        }
    }
}

/// Run-wide application budget shared by every worker
///
/// A worker claims one unit before each attempt. The unit is spent when the
/// attempt ends in an application and refunded otherwise, so `claimed` never
/// exceeds the ceiling even under concurrent claims. The budget is only
/// exhausted once spent units reach the ceiling; units held by attempts still
/// in flight may come back.
#[derive(Debug)]
pub struct GlobalQuota {
    ceiling: u32,
    claimed: AtomicU32,
    spent: AtomicU32,
    settled: Notify,
}

impl GlobalQuota {
    pub fn new(ceiling: u32) -> Self {
        Self {
            ceiling,
            claimed: AtomicU32::new(0),
            spent: AtomicU32::new(0),
            settled: Notify::new(),
        }
    }

    /// Claim one unit; false while every unit is claimed
    pub fn try_claim(&self) -> bool {
        self.claimed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |claimed| {
                (claimed < self.ceiling).then_some(claimed + 1)
            })
            .is_ok()
    }

    /// Claim one unit, waiting for in-flight attempts to settle
    ///
    /// Returns false only once the budget is exhausted.
    pub async fn claim(&self) -> bool {
        loop {
            let settled = self.settled.notified();
            tokio::pin!(settled);
            settled.as_mut().enable();

            if self.try_claim() {
                return true;
            }
            if self.is_exhausted() {
                return false;
            }
            settled.await;
        }
    }

    /// Give back a unit claimed for an attempt that did not apply
    pub fn refund(&self) {
        let refunded = self
            .claimed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |claimed| {
                claimed.checked_sub(1)
            })
            .is_ok();
        if refunded {
            self.settled.notify_waiters();
        }
    }

    /// Keep a claimed unit for good
    pub fn spend(&self) {
        self.spent.fetch_add(1, Ordering::AcqRel);
        self.settled.notify_waiters();
    }

    pub fn claimed(&self) -> u32 {
        self.claimed.load(Ordering::Acquire)
    }

    pub fn spent(&self) -> u32 {
        self.spent.load(Ordering::Acquire)
    }

    pub fn is_exhausted(&self) -> bool {
        self.spent() >= self.ceiling
    }
}

/// Shared pacing and quota authority
pub struct RateLimiter {
    policy: RateLimitPolicy,
    rng: Mutex<StdRng>,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic limiter: the same seed yields the same delay sequence
    pub fn with_seed(policy: RateLimitPolicy, seed: u64) -> Self {
        Self {
            policy,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        let policy = RateLimitPolicy::from_config(config);
        match config.schedule.seed {
            Some(seed) => Self::with_seed(policy, seed),
            None => Self::new(policy),
        }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Pause before the session's next application attempt
    pub fn delay_for_next_application(&self, session: &SessionState) -> Duration {
        let delay = self.sample(&self.policy.application_delay);
        session_debug!(
            session.display_name(),
            "⏱️ Next application in {:.1}s ({} applied so far)",
            delay.as_secs_f64(),
            session.applied_count()
        );
        delay
    }

    /// Pause between consecutive sessions in sequential mode
    pub fn delay_for_session_switch(&self) -> Duration {
        self.sample(&self.policy.session_switch_delay)
    }

    /// Pause between admissions of concurrent sessions in parallel mode
    pub fn delay_for_stagger(&self) -> Duration {
        self.sample(&self.policy.stagger_delay)
    }

    /// Pause between two searches within one session
    pub fn delay_between_searches(&self) -> Duration {
        self.sample(&self.policy.search_delay)
    }

    pub fn session_quota_reached(&self, session: &SessionState) -> bool {
        session.applied_count() >= self.policy.per_session_quota
    }

    /// Whether another attempt may start
    ///
    /// A `true` answer claims one unit of `global`, waiting while sibling
    /// attempts hold the remaining units. The caller spends the unit on an
    /// application and refunds it otherwise.
    pub async fn allow_attempt(&self, session: &SessionState, global: &GlobalQuota) -> bool {
        !self.session_quota_reached(session) && global.claim().await
    }

    fn sample(&self, range: &DelayRange) -> Duration {
        let min = range.min();
        let max = range.max();
        if max <= min {
            return min;
        }

        let low = u64::try_from(min.as_millis()).unwrap_or(u64::MAX);
        let high = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
        let millis = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            rng.gen_range(low..=high)
        };
        Duration::from_millis(millis)
    }
}
