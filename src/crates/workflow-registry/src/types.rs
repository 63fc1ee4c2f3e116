//! Tool and integration descriptors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Policy classification carried by every tool. Mandatory tools force a step into
/// `awaiting_approval` regardless of what the planner suggested; silent tools never
/// do; advisory tools run but attach a note for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalClass {
    Silent,
    Advisory,
    Mandatory,
}

impl ApprovalClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalClass::Silent => "silent",
            ApprovalClass::Advisory => "advisory",
            ApprovalClass::Mandatory => "mandatory",
        }
    }

    pub fn is_mandatory(&self) -> bool {
        matches!(self, ApprovalClass::Mandatory)
    }
}

impl fmt::Display for ApprovalClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unknown or malformed approval-class strings default to `Mandatory`: an
/// unrecognized tool is treated as the one that needs a human in the loop, never
/// the one that runs silently.
impl From<&str> for ApprovalClass {
    fn from(value: &str) -> Self {
        match value {
            "silent" => ApprovalClass::Silent,
            "advisory" => ApprovalClass::Advisory,
            _ => ApprovalClass::Mandatory,
        }
    }
}

/// One callable capability, scoped to a single integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub id: String,
    pub display_name: String,
    pub integration_id: String,
    pub approval_class: ApprovalClass,
}

/// One external integration the caller has authorized for this request (e.g. mail,
/// search, docs), identified by the bearer token bag passed into `build`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Integration {
    pub id: String,
    pub display_name: String,
    pub icon_id: String,
    pub tool_count: usize,
    pub approval_class: ApprovalClass,
}
