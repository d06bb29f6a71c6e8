use serde::{Deserialize, Serialize};

use crate::time_utils::local_timezone_offset;

/// Host identity attached to every relayed message. Resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayContext {
    pub machine_name: String,
    pub region: String,
    pub timezone_offset: String,
}

impl RelayContext {
    pub fn new(machine_name: impl Into<String>, region: impl Into<String>) -> Self {
        Self::with_offset(machine_name, region, local_timezone_offset())
    }

    pub fn with_offset(
        machine_name: impl Into<String>,
        region: impl Into<String>,
        timezone_offset: impl Into<String>,
    ) -> Self {
        Self {
            machine_name: machine_name.into(),
            region: region.into(),
            timezone_offset: timezone_offset.into(),
        }
    }
}
