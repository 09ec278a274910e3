//! Recast: cascade reconstruction and diffusion-network analysis.
//!
//! Recast reconstructs information-diffusion cascades (chains of resharing
//! events on social platforms) from raw event logs under several inference
//! assumptions, merges them into diffusion networks, and measures how much
//! those assumptions distort downstream network analyses.
//!
//! # Quick Start
//!
//! ```
//! use recast::cascade::{Cascade, ResharingEvent};
//! use recast::reconstruct::{PdiParams, PdiReconstructor};
//!
//! let events: Vec<ResharingEvent> = (0..4i64)
//!     .map(|i| ResharingEvent {
//!         cascade_id: "c1".into(),
//!         event_id: format!("e{i}"),
//!         user_id: format!("u{i}"),
//!         parent_id: if i == 0 { None } else { Some("e0".into()) },
//!         timestamp: 1_700_000_000 + i * 60,
//!         follower_count: 100.0,
//!     })
//!     .collect();
//! let cascade = Cascade::new("c1".into(), events).unwrap();
//!
//! let params = PdiParams::new(0.5, 2.0, 1.0).unwrap();
//! let variants = PdiReconstructor::new(params).variants(&cascade, 10, 42).unwrap();
//! assert_eq!(variants.len(), 10);
//! ```
//!
//! # Modules
//!
//! - [`cascade`]: resharing-event data model and event-log loading
//! - [`reconstruct`]: cascade reconstruction methods (PDI, random, TID)
//! - [`graph`]: directed weighted diffusion networks (CSR), centralities,
//!   community detection
//! - [`metrics`]: cascade structure and reconstruction-comparison metrics
//! - [`stats`]: descriptive statistics (bootstrap CIs, Spearman correlation)
//! - [`store`]: on-disk layout for pipeline artifacts
//! - [`pipeline`]: sequential, fail-fast stage runner

pub mod cascade;
pub mod error;
pub mod graph;
pub mod metrics;
pub mod pipeline;
pub mod prelude;
pub mod reconstruct;
pub mod stats;
pub mod store;

pub use error::{RecastError, Result};
