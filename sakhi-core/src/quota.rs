//! Per-tier daily quota governance for generation-service calls.
//!
//! Counters reset lazily on UTC day rollover; there is no background timer.
//! Instances are plain values meant to be shared via `Arc` and injected,
//! so tests can construct isolated governors per case.

use crate::{CompanionConfig, Tier};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Snapshot of one tier's quota state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaStatus {
    pub tier: Tier,
    pub used: u32,
    pub cap: u32,
    pub remaining: u32,
    /// Next midnight UTC, when the counter resets.
    pub resets_at: DateTime<Utc>,
}

impl QuotaStatus {
    /// Whether the tier is exhausted for the day.
    pub fn is_exhausted(&self) -> bool {
        self.used >= self.cap
    }

    /// Fraction of the cap consumed, as a percentage.
    pub fn percentage_used(&self) -> f32 {
        if self.cap == 0 {
            0.0
        } else {
            (self.used as f32 / self.cap as f32) * 100.0
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Counter {
    day_key: NaiveDate,
    count: u32,
}

/// Tracks per-tier daily call counts against fixed caps.
///
/// `try_consume` is the only mutator. The rollover check and the
/// check-and-increment happen under one mutex acquisition, so concurrent
/// callers can never jointly exceed a cap.
#[derive(Debug)]
pub struct QuotaGovernor {
    caps: HashMap<Tier, u32>,
    counters: Mutex<HashMap<Tier, Counter>>,
}

impl QuotaGovernor {
    /// Create a governor with explicit per-tier caps.
    pub fn new(heavy_cap: u32, light_cap: u32) -> Self {
        let mut caps = HashMap::new();
        caps.insert(Tier::Heavy, heavy_cap);
        caps.insert(Tier::Light, light_cap);
        Self {
            caps,
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Create a governor from configuration.
    pub fn from_config(config: &CompanionConfig) -> Self {
        Self::new(config.heavy_tier_cap, config.light_tier_cap)
    }

    /// Cap for a tier.
    pub fn cap(&self, tier: Tier) -> u32 {
        *self.caps.get(&tier).unwrap_or(&0)
    }

    /// Consume one unit from a tier if the cap allows it.
    /// Returns false without mutating state when the tier is exhausted.
    pub fn try_consume(&self, tier: Tier) -> bool {
        self.try_consume_at(tier, Utc::now())
    }

    /// Clock-injected variant of [`try_consume`](Self::try_consume).
    pub fn try_consume_at(&self, tier: Tier, now: DateTime<Utc>) -> bool {
        let cap = self.cap(tier);
        let mut counters = self.lock_counters();
        let counter = Self::rolled(&mut counters, tier, now);

        if counter.count >= cap {
            return false;
        }
        counter.count += 1;
        true
    }

    /// Units left in a tier today.
    pub fn remaining(&self, tier: Tier) -> u32 {
        self.remaining_at(tier, Utc::now())
    }

    /// Clock-injected variant of [`remaining`](Self::remaining).
    pub fn remaining_at(&self, tier: Tier, now: DateTime<Utc>) -> u32 {
        let cap = self.cap(tier);
        let mut counters = self.lock_counters();
        let counter = Self::rolled(&mut counters, tier, now);
        cap.saturating_sub(counter.count)
    }

    /// Current status snapshot for a tier.
    pub fn status(&self, tier: Tier) -> QuotaStatus {
        self.status_at(tier, Utc::now())
    }

    /// Clock-injected variant of [`status`](Self::status).
    pub fn status_at(&self, tier: Tier, now: DateTime<Utc>) -> QuotaStatus {
        let cap = self.cap(tier);
        let mut counters = self.lock_counters();
        let counter = Self::rolled(&mut counters, tier, now);
        QuotaStatus {
            tier,
            used: counter.count,
            cap,
            remaining: cap.saturating_sub(counter.count),
            resets_at: next_midnight_utc(now),
        }
    }

    /// Status for every tier, for quota-health reporting.
    pub fn status_all(&self) -> Vec<QuotaStatus> {
        Tier::all().iter().map(|t| self.status(*t)).collect()
    }

    /// Administrative reset of one tier's counter.
    pub fn reset(&self, tier: Tier) {
        self.lock_counters().remove(&tier);
    }

    /// Administrative reset of all counters.
    pub fn reset_all(&self) {
        self.lock_counters().clear();
    }

    fn lock_counters(&self) -> std::sync::MutexGuard<'_, HashMap<Tier, Counter>> {
        // A panic while holding the lock leaves only a counter value behind;
        // the state is still coherent, so recover rather than propagate.
        self.counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fetch the counter for a tier, resetting it first if the stored
    /// day key is older than `now`'s date.
    fn rolled<'a>(
        counters: &'a mut HashMap<Tier, Counter>,
        tier: Tier,
        now: DateTime<Utc>,
    ) -> &'a mut Counter {
        let today = now.date_naive();
        let counter = counters.entry(tier).or_insert(Counter {
            day_key: today,
            count: 0,
        });
        if counter.day_key != today {
            counter.day_key = today;
            counter.count = 0;
        }
        counter
    }
}

fn next_midnight_utc(now: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow = now.date_naive().succ_opt().unwrap_or(now.date_naive());
    Utc.with_ymd_and_hms(tomorrow.year(), tomorrow.month(), tomorrow.day(), 0, 0, 0)
        .single()
        .unwrap_or(now)
}

// =============================================================================
// TESTS
// =============================================================================
