//! Convenience re-exports for common Recast usage.
//!
//! ```
//! use recast::prelude::*;
//! ```

pub use crate::cascade::{Cascade, CascadeTable, ResharingEvent};
pub use crate::error::{RecastError, Result};
pub use crate::graph::community::{partition_jaccard, CommunityDetection, Partition};
pub use crate::graph::{DiffusionNetwork, NetworkCentrality, NodeId};
pub use crate::metrics::{cascade_metrics, edge_similarity, top_k_jaccard, CascadeMetrics};
pub use crate::pipeline::{Pipeline, RunConfig, Stage};
pub use crate::reconstruct::{
    CascadeVariant, Method, PdiParams, PdiReconstructor, RandomReconstructor,
};
pub use crate::stats::{bootstrap_ci, cosine_similarity, percentile, spearman};
pub use crate::store::StoreLayout;
