// SPDX-License-Identifier: GPL-3.0-only
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberOperation {
    Added,
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    Success,
    Failed,
    /// Addition requested for an id that is already an active member.
    AlreadyMember,
    /// Removal requested for an id that is not an active member.
    AlreadyAbsent,
}

/// Terminal outcome for one submitted concept identifier.
#[derive(Debug, Clone, Serialize)]
pub struct MemberOutcome {
    pub operation: MemberOperation,
    pub status: ChangeStatus,
    pub name: Option<String>,
    pub active: Option<bool>,
}

/// Per-call outcome map for a membership synchronization. Seeded with a
/// tentative Failed entry per submitted identifier, then upgraded as the
/// synchronizer progresses; one terminal entry per identifier at the
/// end of the call.
#[derive(Debug, Clone, Default)]
pub struct ChangeReport {
    entries: HashMap<String, MemberOutcome>,
}

impl ChangeReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&mut self, concept_id: &str, operation: MemberOperation) {
        self.entries.insert(
            concept_id.to_string(),
            MemberOutcome {
                operation,
                status: ChangeStatus::Failed,
                name: None,
                active: None,
            },
        );
    }

    pub fn mark(&mut self, concept_id: &str, status: ChangeStatus) {
        if let Some(entry) = self.entries.get_mut(concept_id) {
            entry.status = status;
        }
    }

    pub fn set_name(&mut self, concept_id: &str, name: Option<String>) {
        if let Some(entry) = self.entries.get_mut(concept_id) {
            entry.name = name;
        }
    }

    pub fn set_active(&mut self, concept_id: &str, active: bool) {
        if let Some(entry) = self.entries.get_mut(concept_id) {
            entry.active = Some(active);
        }
    }

    pub fn get(&self, concept_id: &str) -> Option<&MemberOutcome> {
        self.entries.get(concept_id)
    }

    pub fn status_of(&self, concept_id: &str) -> Option<ChangeStatus> {
        self.entries.get(concept_id).map(|e| e.status)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count_with(&self, status: ChangeStatus) -> usize {
        self.entries.values().filter(|e| e.status == status).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MemberOutcome)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_starts_tentatively_failed() {
        let mut report = ChangeReport::new();
        report.seed("100", MemberOperation::Added);

        assert_eq!(report.status_of("100"), Some(ChangeStatus::Failed));
        assert_eq!(report.len(), 1);
    }

    #[test]
    fn test_mark_upgrades_status() {
        let mut report = ChangeReport::new();
        report.seed("100", MemberOperation::Added);
        report.mark("100", ChangeStatus::Success);
        report.set_active("100", true);

        let outcome = report.get("100").unwrap();
        assert_eq!(outcome.status, ChangeStatus::Success);
        assert_eq!(outcome.active, Some(true));
        assert_eq!(outcome.operation, MemberOperation::Added);
    }

    #[test]
    fn test_marking_unknown_identifier_is_a_no_op() {
        let mut report = ChangeReport::new();
        report.mark("100", ChangeStatus::Success);
        assert!(report.get("100").is_none());
    }

    #[test]
    fn test_count_with_status() {
        let mut report = ChangeReport::new();
        for id in ["1", "2", "3"] {
            report.seed(id, MemberOperation::Added);
        }
        report.seed("4", MemberOperation::Removed);
        report.mark("1", ChangeStatus::Success);
        report.mark("2", ChangeStatus::AlreadyMember);
        report.mark("4", ChangeStatus::AlreadyAbsent);

        assert_eq!(report.count_with(ChangeStatus::Success), 1);
        assert_eq!(report.count_with(ChangeStatus::AlreadyMember), 1);
        assert_eq!(report.count_with(ChangeStatus::AlreadyAbsent), 1);
        assert_eq!(report.count_with(ChangeStatus::Failed), 1);
    }
}
