//! Partition identifier
//!
//! A gpid names one partition of one table: `(app_id, partition_index)`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Global partition id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Gpid {
    /// Table (app) id assigned by the meta server
    pub app_id: i32,

    /// Partition index within the table
    pub partition_index: i32,
}

impl Gpid {
    pub fn new(app_id: i32, partition_index: i32) -> Self {
        Self {
            app_id,
            partition_index,
        }
    }
}

impl fmt::Display for Gpid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.app_id, self.partition_index)
    }
}
