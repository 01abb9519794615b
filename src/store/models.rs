// SPDX-License-Identifier: GPL-3.0-only
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    InDevelopment,
    Published,
}

impl VersionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionStatus::InDevelopment => "in_development",
            VersionStatus::Published => "published",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "published" => VersionStatus::Published,
            _ => VersionStatus::InDevelopment,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Editing,
    InReview,
    ReadyToPublish,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Editing => "editing",
            WorkflowStatus::InReview => "in_review",
            WorkflowStatus::ReadyToPublish => "ready_to_publish",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "in_review" => WorkflowStatus::InReview,
            "ready_to_publish" => WorkflowStatus::ReadyToPublish,
            _ => WorkflowStatus::Editing,
        }
    }
}

/// Local record of a reference set. Authoritative membership lives on
/// the remote server; this entity tracks workflow state and the last
/// known member count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refset {
    pub refset_id: String,
    pub name: String,
    /// Branch the reference set is edited on, descended from an edition
    /// branch.
    pub branch_path: String,
    pub member_count: i64,
    pub version_status: VersionStatus,
    pub workflow_status: WorkflowStatus,
    pub modified_at: DateTime<Utc>,
}

impl Refset {
    pub fn new(
        refset_id: impl Into<String>,
        name: impl Into<String>,
        parent_branch: &str,
    ) -> Self {
        let refset_id = refset_id.into();
        let branch_path = format!("{}/{}", parent_branch, refset_id);
        Self {
            refset_id,
            name: name.into(),
            branch_path,
            member_count: 0,
            version_status: VersionStatus::InDevelopment,
            workflow_status: WorkflowStatus::Editing,
            modified_at: Utc::now(),
        }
    }

    /// Membership edits are only permitted while the reference set is in
    /// development and in the editing workflow state.
    pub fn can_edit_members(&self) -> bool {
        self.version_status == VersionStatus::InDevelopment
            && self.workflow_status == WorkflowStatus::Editing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_path_is_derived_from_parent_and_id() {
        let refset = Refset::new("900001", "Allergy list", "MAIN/PROJECTS/ALLERGY");
        assert_eq!(refset.branch_path, "MAIN/PROJECTS/ALLERGY/900001");
    }

    #[test]
    fn test_editability_follows_workflow_state() {
        let mut refset = Refset::new("900001", "Allergy list", "MAIN");
        assert!(refset.can_edit_members());

        refset.workflow_status = WorkflowStatus::InReview;
        assert!(!refset.can_edit_members());

        refset.workflow_status = WorkflowStatus::Editing;
        refset.version_status = VersionStatus::Published;
        assert!(!refset.can_edit_members());
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [VersionStatus::InDevelopment, VersionStatus::Published] {
            assert_eq!(VersionStatus::parse(status.as_str()), status);
        }
        for status in [
            WorkflowStatus::Editing,
            WorkflowStatus::InReview,
            WorkflowStatus::ReadyToPublish,
        ] {
            assert_eq!(WorkflowStatus::parse(status.as_str()), status);
        }
    }
}
