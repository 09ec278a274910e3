//! Resharing-event data model and event-log loading.
//!
//! A *cascade* is the observed sequence of resharing events propagating a
//! single piece of content. Raw platform logs arrive as one CSV row per
//! post/repost; this module groups them into temporally ordered [`Cascade`]s
//! and exposes the per-cascade views the reconstruction and metrics stages
//! consume.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RecastError, Result};

/// One observed post or repost in an event log.
///
/// `parent_id` is the *observed* reshared post (what the platform reports),
/// not the inferred diffusion parent. It is `None` for cascade roots and may
/// reference an event outside the log (observed data is lossy).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResharingEvent {
    /// Identifier of the cascade this event belongs to.
    pub cascade_id: String,
    /// Unique identifier of this post.
    pub event_id: String,
    /// Account that produced the post.
    pub user_id: String,
    /// Observed reshared post, if any.
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Unix timestamp in seconds.
    pub timestamp: i64,
    /// Mean follower count of the posting account.
    pub follower_count: f64,
}

/// How inter-event time differences are measured for power-law estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeDiffMode {
    /// Difference between each reshare and the cascade root.
    Star,
    /// Difference between each reshare and the immediately preceding event.
    MostRecent,
}

/// A temporally ordered sequence of resharing events for one piece of content.
///
/// Events are sorted ascending by timestamp on construction (ties keep input
/// order); the first event is the root.
#[derive(Debug, Clone)]
pub struct Cascade {
    id: String,
    events: Vec<ResharingEvent>,
}

impl Cascade {
    /// Build a cascade from its events, sorting by timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`RecastError::InvalidCascade`] if `events` is empty or
    /// contains duplicate event ids.
    pub fn new(id: String, mut events: Vec<ResharingEvent>) -> Result<Self> {
        if events.is_empty() {
            return Err(RecastError::InvalidCascade {
                cascade_id: id,
                message: "no events".to_string(),
            });
        }

        let mut seen = HashSet::with_capacity(events.len());
        for event in &events {
            if !seen.insert(event.event_id.as_str()) {
                return Err(RecastError::InvalidCascade {
                    cascade_id: id,
                    message: format!("duplicate event id `{}`", event.event_id),
                });
            }
        }

        events.sort_by_key(|e| e.timestamp);
        Ok(Self { id, events })
    }

    /// Cascade identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of events (root included).
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the cascade has no events. Never true for a constructed cascade.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// A cascade can be reconstructed only if something was actually reshared.
    #[must_use]
    pub fn is_reconstructible(&self) -> bool {
        self.events.len() >= 2
    }

    /// The temporally ordered events.
    #[must_use]
    pub fn events(&self) -> &[ResharingEvent] {
        &self.events
    }

    /// The earliest event.
    #[must_use]
    pub fn root(&self) -> &ResharingEvent {
        &self.events[0]
    }

    /// Ordered event ids.
    #[must_use]
    pub fn event_ids(&self) -> Vec<&str> {
        self.events.iter().map(|e| e.event_id.as_str()).collect()
    }

    /// Ordered timestamps (seconds).
    #[must_use]
    pub fn timestamps(&self) -> Vec<i64> {
        self.events.iter().map(|e| e.timestamp).collect()
    }

    /// Ordered follower counts.
    #[must_use]
    pub fn follower_counts(&self) -> Vec<f64> {
        self.events.iter().map(|e| e.follower_count).collect()
    }

    /// Map each event id to its posting user id.
    #[must_use]
    pub fn user_of_event(&self) -> HashMap<&str, &str> {
        self.events
            .iter()
            .map(|e| (e.event_id.as_str(), e.user_id.as_str()))
            .collect()
    }

    /// Observed parent edges, restricted to parents present in this cascade.
    ///
    /// Roots and events whose observed parent is unknown are absent from the
    /// returned map.
    #[must_use]
    pub fn observed_parents(&self) -> HashMap<&str, &str> {
        let ids: HashSet<&str> = self.events.iter().map(|e| e.event_id.as_str()).collect();
        self.events
            .iter()
            .filter_map(|e| {
                let parent = e.parent_id.as_deref()?;
                ids.contains(parent)
                    .then_some((e.event_id.as_str(), parent))
            })
            .collect()
    }

    /// Seconds between the earliest and latest event.
    #[must_use]
    pub fn time_span_seconds(&self) -> i64 {
        let last = self.events[self.events.len() - 1].timestamp;
        last - self.events[0].timestamp
    }

    /// Number of distinct users involved.
    #[must_use]
    pub fn unique_user_count(&self) -> usize {
        self.events
            .iter()
            .map(|e| e.user_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Inter-event time differences in seconds, per [`TimeDiffMode`].
    ///
    /// One value per non-root event; differences can be zero when timestamps
    /// collide at second resolution.
    #[must_use]
    pub fn time_differences(&self, mode: TimeDiffMode) -> Vec<f64> {
        self.events
            .iter()
            .enumerate()
            .skip(1)
            .map(|(idx, e)| {
                let reference = match mode {
                    TimeDiffMode::Star => self.events[0].timestamp,
                    TimeDiffMode::MostRecent => self.events[idx - 1].timestamp,
                };
                (e.timestamp - reference) as f64
            })
            .collect()
    }
}

/// Outcome of [`CascadeTable::retain_reconstructible`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleaningReport {
    /// Cascades kept.
    pub kept: usize,
    /// Cascades dropped for having fewer than two events.
    pub dropped_short: usize,
}

/// All cascades of one dataset, keyed by cascade id.
///
/// A `BTreeMap` keeps iteration order stable across runs, which keeps
/// derived artifacts (and seeded reconstructions) reproducible.
#[derive(Debug, Clone, Default)]
pub struct CascadeTable {
    cascades: BTreeMap<String, Cascade>,
}

impl CascadeTable {
    /// Group a flat event list into cascades.
    ///
    /// # Errors
    ///
    /// Propagates [`Cascade::new`] failures (duplicate event ids).
    pub fn from_events(events: Vec<ResharingEvent>) -> Result<Self> {
        let mut grouped: BTreeMap<String, Vec<ResharingEvent>> = BTreeMap::new();
        for event in events {
            grouped.entry(event.cascade_id.clone()).or_default().push(event);
        }

        let mut cascades = BTreeMap::new();
        for (id, group) in grouped {
            let cascade = Cascade::new(id.clone(), group)?;
            cascades.insert(id, cascade);
        }
        Ok(Self { cascades })
    }

    /// Load an event-log CSV.
    ///
    /// The header must carry the [`ResharingEvent`] field names; malformed
    /// rows are errors, nothing is skipped silently.
    ///
    /// # Errors
    ///
    /// Returns [`RecastError::Csv`] for malformed input and
    /// [`RecastError::Io`] for filesystem failures.
    pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path.as_ref())?;
        let mut events = Vec::new();
        for record in reader.deserialize() {
            let event: ResharingEvent = record?;
            events.push(event);
        }
        Self::from_events(events)
    }

    /// Number of cascades.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cascades.len()
    }

    /// Whether the table holds no cascades.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cascades.is_empty()
    }

    /// Look up one cascade.
    #[must_use]
    pub fn get(&self, cascade_id: &str) -> Option<&Cascade> {
        self.cascades.get(cascade_id)
    }

    /// Iterate cascades in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Cascade> {
        self.cascades.values()
    }

    /// Cascade ids in sorted order.
    #[must_use]
    pub fn cascade_ids(&self) -> Vec<&str> {
        self.cascades.keys().map(String::as_str).collect()
    }

    /// Drop cascades with fewer than two events (nothing was reshared).
    pub fn retain_reconstructible(&mut self) -> CleaningReport {
        let before = self.cascades.len();
        self.cascades.retain(|_, c| c.is_reconstructible());
        CleaningReport {
            kept: self.cascades.len(),
            dropped_short: before - self.cascades.len(),
        }
    }
}
