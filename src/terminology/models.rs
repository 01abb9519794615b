// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A concept as returned by the remote terminology server. Enrichment
/// calls fill in the optional fields after the fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Concept {
    pub concept_id: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_term: Option<String>,
    /// True when the concept has no inferred children.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaf: Option<bool>,
    /// True when the concept is an active member of the reference set
    /// the enrichment call was scoped to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_of_target: Option<bool>,
}

impl Concept {
    pub fn new(concept_id: impl Into<String>) -> Self {
        Self {
            concept_id: concept_id.into(),
            active: true,
            preferred_term: None,
            leaf: None,
            member_of_target: None,
        }
    }
}

/// A reference-set membership record on the remote server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefsetMember {
    pub member_id: String,
    pub refset_id: String,
    pub referenced_component_id: String,
    pub active: bool,
    /// Set by the server once the member has been part of an official
    /// publication. Released members are never hard-deleted.
    #[serde(default)]
    pub released: bool,
}

impl RefsetMember {
    pub fn new(refset_id: impl Into<String>, referenced_component_id: impl Into<String>) -> Self {
        Self {
            member_id: Uuid::new_v4().to_string(),
            refset_id: refset_id.into(),
            referenced_component_id: referenced_component_id.into(),
            active: true,
            released: false,
        }
    }
}

/// Page envelope used by every paged endpoint of the remote server.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default)]
    pub total: u64,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub search_after: Option<String>,
}

/// Pointer to an asynchronous remote job, taken from the Location
/// header of the submission response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub status_url: String,
}

/// Status body returned when polling a bulk job, merge or merge review.
#[derive(Debug, Clone, Deserialize)]
pub struct JobStatus {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Coarse view of a job status used by the poller. Anything the server
/// reports that is not terminal (pending, in progress, scheduled, ...)
/// maps to `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Completed,
    Failed,
    Stale,
}

impl JobStatus {
    pub fn state(&self) -> JobState {
        match self.status.to_ascii_uppercase().as_str() {
            "COMPLETED" => JobState::Completed,
            "FAILED" => JobState::Failed,
            "STALE" => JobState::Stale,
            _ => JobState::Running,
        }
    }

    pub fn completed() -> Self {
        Self {
            status: "COMPLETED".to_string(),
            message: None,
        }
    }

    pub fn pending() -> Self {
        Self {
            status: "PENDING".to_string(),
            message: None,
        }
    }

    pub fn in_progress() -> Self {
        Self {
            status: "IN_PROGRESS".to_string(),
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: "FAILED".to_string(),
            message: Some(message.into()),
        }
    }

    pub fn stale() -> Self {
        Self {
            status: "STALE".to_string(),
            message: None,
        }
    }
}
