//! Per-session resource quotas.
//!
//! Counters only ever grow within a session. A reservation either fits
//! under the ceiling and is recorded immediately, or is rejected without
//! touching the counter. There is no refund path: a reservation made for an
//! action that later fails (or is rejected by a reviewer) stays consumed.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::SessionConfig;
use crate::error::QuotaError;

/// A named category of rate-limited resource consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceClass {
    /// Page image retrievals from the data room.
    PageRetrieval,
    /// Full-content fetches of external web pages.
    ExternalFetch,
}

impl std::fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PageRetrieval => "page_retrieval",
            Self::ExternalFetch => "external_fetch",
        };
        write!(f, "{s}")
    }
}

/// Consumption of one resource class against its fixed ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaCounter {
    pub class: ResourceClass,
    pub count: u32,
    pub ceiling: u32,
}

impl QuotaCounter {
    pub fn new(class: ResourceClass, ceiling: u32) -> Self {
        Self {
            class,
            count: 0,
            ceiling,
        }
    }

    /// Units still available before the ceiling is reached.
    pub fn remaining(&self) -> u32 {
        self.ceiling.saturating_sub(self.count)
    }
}

/// Tracks consumption counters for every gated resource class.
///
/// Safe to share between concurrently running tasks: the check and the
/// increment happen under one lock.
#[derive(Debug)]
pub struct QuotaManager {
    counters: Mutex<BTreeMap<ResourceClass, QuotaCounter>>,
}

impl QuotaManager {
    /// Create a manager with the given ceilings, all counters at zero.
    pub fn new(ceilings: impl IntoIterator<Item = (ResourceClass, u32)>) -> Self {
        let counters = ceilings
            .into_iter()
            .map(|(class, ceiling)| (class, QuotaCounter::new(class, ceiling)))
            .collect();
        Self {
            counters: Mutex::new(counters),
        }
    }

    /// Create a manager with the ceilings of a session configuration.
    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new([
            (ResourceClass::PageRetrieval, config.page_retrieval_limit),
            (ResourceClass::ExternalFetch, config.web_fetch_limit),
        ])
    }

    /// Rebuild a manager from previously captured counters.
    pub fn from_counters(counters: impl IntoIterator<Item = QuotaCounter>) -> Self {
        Self {
            counters: Mutex::new(counters.into_iter().map(|c| (c.class, c)).collect()),
        }
    }

    /// Reserve `amount` units of `class`.
    ///
    /// On success the counter is incremented before returning. On failure the
    /// counter is left unchanged and the remaining allowance is reported.
    pub fn reserve(&self, class: ResourceClass, amount: u32) -> Result<(), QuotaError> {
        let mut counters = self.counters.lock();
        let counter = counters
            .get_mut(&class)
            .ok_or(QuotaError::UnknownClass { class })?;

        let fits = counter
            .count
            .checked_add(amount)
            .is_some_and(|total| total <= counter.ceiling);

        if !fits {
            tracing::warn!(
                class = %class,
                requested = amount,
                remaining = counter.remaining(),
                "Quota reservation rejected"
            );
            return Err(QuotaError::Exceeded {
                class,
                requested: amount,
                remaining: counter.remaining(),
            });
        }

        counter.count += amount;
        tracing::debug!(
            class = %class,
            amount,
            count = counter.count,
            ceiling = counter.ceiling,
            "Quota reserved"
        );
        Ok(())
    }

    /// Current counter for a class.
    pub fn counter(&self, class: ResourceClass) -> Option<QuotaCounter> {
        self.counters.lock().get(&class).copied()
    }

    /// Units still available for a class.
    pub fn remaining(&self, class: ResourceClass) -> Option<u32> {
        self.counter(class).map(|c| c.remaining())
    }

    /// Copy of every counter, ordered by class.
    pub fn snapshot(&self) -> Vec<QuotaCounter> {
        self.counters.lock().values().copied().collect()
    }
}

impl Default for QuotaManager {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

impl Serialize for QuotaManager {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.snapshot().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for QuotaManager {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let counters = Vec::<QuotaCounter>::deserialize(deserializer)?;
        Ok(Self::from_counters(counters))
    }
}
