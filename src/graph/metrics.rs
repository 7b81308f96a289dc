//! Derived per-node metrics annotated after assembly

use crate::hash::HashStatus;
use serde::{Deserialize, Serialize};

/// Version-control state of the file a node was parsed from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitFlags {
    pub modified: bool,
    pub untracked: bool,
    pub branch_changed: bool,
}

impl GitFlags {
    pub fn any(&self) -> bool {
        self.modified || self.untracked || self.branch_changed
    }
}

/// Metrics for one node
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeMetrics {
    /// Fraction of assertions covered, in `0.0..=1.0` (requirements only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<f64>,
    /// Stored-hash verification result (requirements only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<HashStatus>,
    #[serde(skip_serializing_if = "is_clean")]
    pub git: GitFlags,
}

fn is_clean(flags: &GitFlags) -> bool {
    !flags.any()
}
