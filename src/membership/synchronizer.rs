// SPDX-License-Identifier: GPL-3.0-only
use anyhow::Context;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::cache::Cache;
use crate::jobs::{JobOutcome, PollSettings, wait_for_job};
use crate::membership::report::{ChangeReport, ChangeStatus, MemberOperation};
use crate::paging::{BatchCap, collect_all, dedup_preserving_order, split};
use crate::store::{Refset, RefsetStore};
use crate::terminology::{RefsetMember, Terminology};

/// Fixed serialized size of a concept search request around the id
/// array, plus per-id JSON framing.
const SEARCH_REQUEST_OVERHEAD: usize = 96;
const SEARCH_ID_OVERHEAD: usize = 2;
const SEARCH_SEPARATOR: usize = 1;
/// A comma in a query string is url-encoded to three characters.
const MEMBER_URL_SEPARATOR: usize = 3;

fn member_query_overhead(branch: &str, refset_id: &str) -> usize {
    // path, fixed query parameters and their names
    64 + branch.len() + refset_id.len()
}

#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Ceiling on the serialized size of one concept verification request.
    pub search_request_max_chars: usize,
    /// Ceiling on the URL length of one member lookup request.
    pub member_url_max_chars: usize,
    pub page_limit: usize,
    pub page_budget: Duration,
    pub bulk_job: PollSettings,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            search_request_max_chars: 7000,
            member_url_max_chars: 6000,
            page_limit: 1000,
            page_budget: Duration::from_secs(120),
            bulk_job: PollSettings::new(Duration::from_millis(300), Duration::from_secs(120)),
        }
    }
}

/// Synchronizes reference-set membership against the remote server:
/// computes the add/remove delta, reactivates previously-released
/// members instead of re-creating them, runs bulk mutations through the
/// job poller, and keeps cache and persisted member count coherent.
pub struct MembershipSynchronizer {
    terminology: Arc<dyn Terminology>,
    store: Arc<dyn RefsetStore>,
    cache: Arc<dyn Cache>,
    settings: SyncSettings,
}

impl MembershipSynchronizer {
    pub fn new(
        terminology: Arc<dyn Terminology>,
        store: Arc<dyn RefsetStore>,
        cache: Arc<dyn Cache>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            terminology,
            store,
            cache,
            settings,
        }
    }

    /// Add candidate concepts to the reference set. Returns one terminal
    /// outcome per submitted identifier. Only a connectivity-level
    /// failure during verification aborts the whole call; everything
    /// else is recorded per identifier.
    pub async fn add_members(
        &self,
        refset: &Refset,
        candidates: &[String],
    ) -> anyhow::Result<ChangeReport> {
        if !refset.can_edit_members() {
            anyhow::bail!(
                "reference set {} is not editable in workflow state {}",
                refset.refset_id,
                refset.workflow_status.as_str()
            );
        }

        let branch = refset.branch_path.as_str();
        let mut report = ChangeReport::new();
        for id in candidates {
            report.seed(id, MemberOperation::Added);
        }
        let ids = dedup_preserving_order(candidates);
        info!(
            refset_id = %refset.refset_id,
            submitted = candidates.len(),
            unique = ids.len(),
            "Adding members to reference set"
        );

        // 1. verify the candidates exist as concepts on the branch
        let verified = self
            .verify_concepts(branch, &ids)
            .await
            .context("concept verification against the terminology server failed")?;
        let mut pending: Vec<String> = Vec::new();
        for id in &ids {
            match verified.get(id) {
                Some(name) => {
                    report.set_name(id, name.clone());
                    pending.push(id.clone());
                }
                None => {
                    warn!(concept = %id, "Concept not found during verification, skipping");
                }
            }
        }

        // 2. split the survivors by current membership state
        let existing = self
            .lookup_members(branch, &refset.refset_id, &pending, None)
            .await
            .context("membership lookup against the terminology server failed")?;
        let mut active_ids: HashSet<String> = HashSet::new();
        let mut inactive: HashMap<String, RefsetMember> = HashMap::new();
        for member in existing {
            if member.active {
                active_ids.insert(member.referenced_component_id.clone());
            } else {
                inactive.insert(member.referenced_component_id.clone(), member);
            }
        }

        let mut reactivations: Vec<RefsetMember> = Vec::new();
        let mut to_insert: Vec<String> = Vec::new();
        for id in pending {
            if active_ids.contains(&id) {
                report.mark(&id, ChangeStatus::AlreadyMember);
                report.set_active(&id, true);
            } else if let Some(mut member) = inactive.remove(&id) {
                // reactivate the existing record to preserve its release
                // history instead of inserting a duplicate
                member.active = true;
                reactivations.push(member);
            } else {
                to_insert.push(id);
            }
        }

        // 3. insert new members, single call or bulk job
        if to_insert.len() == 1 {
            let member = RefsetMember::new(&refset.refset_id, &to_insert[0]);
            match self.terminology.create_member(branch, &member).await {
                Ok(()) => {
                    report.mark(&to_insert[0], ChangeStatus::Success);
                    report.set_active(&to_insert[0], true);
                }
                Err(e) => {
                    warn!(concept = %to_insert[0], error = %e, "Single member insert failed");
                }
            }
        } else if to_insert.len() > 1 {
            let members: Vec<RefsetMember> = to_insert
                .iter()
                .map(|id| RefsetMember::new(&refset.refset_id, id))
                .collect();
            match self.run_bulk(branch, &members, BulkMode::Create).await {
                Ok(()) => {
                    for id in &to_insert {
                        report.mark(id, ChangeStatus::Success);
                        report.set_active(id, true);
                    }
                }
                Err(e) => {
                    warn!(count = to_insert.len(), error = %e, "Bulk member insert failed");
                }
            }
        }

        // 4. reactivations go through one bulk update
        if !reactivations.is_empty() {
            let reactivated_ids: Vec<String> = reactivations
                .iter()
                .map(|m| m.referenced_component_id.clone())
                .collect();
            match self.run_bulk(branch, &reactivations, BulkMode::Update).await {
                Ok(()) => {
                    for id in &reactivated_ids {
                        report.mark(id, ChangeStatus::Success);
                        report.set_active(id, true);
                    }
                }
                Err(e) => {
                    warn!(count = reactivations.len(), error = %e, "Bulk member reactivation failed");
                }
            }
        }

        self.finalize(refset).await;
        info!(
            refset_id = %refset.refset_id,
            success = report.count_with(ChangeStatus::Success),
            already_member = report.count_with(ChangeStatus::AlreadyMember),
            failed = report.count_with(ChangeStatus::Failed),
            "Member addition finished"
        );
        Ok(report)
    }

    /// Remove concepts from the reference set. Members never released
    /// are hard-deleted; released members are soft-inactivated so their
    /// publication history survives.
    pub async fn remove_members(
        &self,
        refset: &Refset,
        requested: &[String],
    ) -> anyhow::Result<ChangeReport> {
        if !refset.can_edit_members() {
            anyhow::bail!(
                "reference set {} is not editable in workflow state {}",
                refset.refset_id,
                refset.workflow_status.as_str()
            );
        }

        let branch = refset.branch_path.as_str();
        let mut report = ChangeReport::new();
        for id in requested {
            report.seed(id, MemberOperation::Removed);
        }
        let ids = dedup_preserving_order(requested);
        info!(
            refset_id = %refset.refset_id,
            submitted = requested.len(),
            unique = ids.len(),
            "Removing members from reference set"
        );

        let current = self
            .lookup_members(branch, &refset.refset_id, &ids, Some(true))
            .await
            .context("membership lookup against the terminology server failed")?;
        let found: HashSet<&str> = current
            .iter()
            .map(|m| m.referenced_component_id.as_str())
            .collect();
        for id in &ids {
            if !found.contains(id.as_str()) {
                report.mark(id, ChangeStatus::AlreadyAbsent);
                report.set_active(id, false);
                info!(concept = %id, "Concept is not an active member, already in the requested state");
            }
        }

        let mut inactivations: Vec<RefsetMember> = Vec::new();
        let mut deletions: Vec<RefsetMember> = Vec::new();
        for member in current {
            if member.released {
                let mut inactivated = member;
                inactivated.active = false;
                inactivations.push(inactivated);
            } else {
                deletions.push(member);
            }
        }

        // hard deletes and inactivation updates are independent calls
        for member in &deletions {
            match self
                .terminology
                .delete_member(branch, &member.member_id)
                .await
            {
                Ok(()) => {
                    report.mark(&member.referenced_component_id, ChangeStatus::Success);
                }
                Err(e) => {
                    warn!(
                        concept = %member.referenced_component_id,
                        error = %e,
                        "Member deletion failed"
                    );
                }
            }
        }
        if inactivations.len() == 1 {
            let member = &inactivations[0];
            match self.terminology.update_member(branch, member).await {
                Ok(()) => {
                    report.mark(&member.referenced_component_id, ChangeStatus::Success);
                    report.set_active(&member.referenced_component_id, false);
                }
                Err(e) => {
                    warn!(
                        concept = %member.referenced_component_id,
                        error = %e,
                        "Single member inactivation failed"
                    );
                }
            }
        } else if inactivations.len() > 1 {
            let inactivated_ids: Vec<String> = inactivations
                .iter()
                .map(|m| m.referenced_component_id.clone())
                .collect();
            match self.run_bulk(branch, &inactivations, BulkMode::Update).await {
                Ok(()) => {
                    for id in &inactivated_ids {
                        report.mark(id, ChangeStatus::Success);
                        report.set_active(id, false);
                    }
                }
                Err(e) => {
                    warn!(count = inactivations.len(), error = %e, "Bulk member inactivation failed");
                }
            }
        }

        self.finalize(refset).await;
        info!(
            refset_id = %refset.refset_id,
            success = report.count_with(ChangeStatus::Success),
            already_absent = report.count_with(ChangeStatus::AlreadyAbsent),
            failed = report.count_with(ChangeStatus::Failed),
            "Member removal finished"
        );
        Ok(report)
    }

    /// Recompute the member count from the remote server and persist it
    /// when it drifted. Local bookkeeping is never trusted over the
    /// server's own dedup and validation.
    pub async fn reconcile_member_count(&self, refset: &Refset) -> anyhow::Result<i64> {
        let count = self
            .remote_member_count(&refset.branch_path, &refset.refset_id)
            .await?;
        if count != refset.member_count {
            info!(
                refset_id = %refset.refset_id,
                local = refset.member_count,
                remote = count,
                "Member count drifted, updating from server"
            );
            let mut updated = refset.clone();
            updated.member_count = count;
            updated.modified_at = chrono::Utc::now();
            self.store.update(updated).await?;
            self.cache.invalidate_all(&refset.branch_path).await;
        }
        Ok(count)
    }

    /// Batch-verify candidate concepts exist; returns id -> preferred term.
    async fn verify_concepts(
        &self,
        branch: &str,
        ids: &[String],
    ) -> anyhow::Result<HashMap<String, Option<String>>> {
        let cap = BatchCap::Chars {
            budget: self.settings.search_request_max_chars,
            request_overhead: SEARCH_REQUEST_OVERHEAD,
            item_overhead: SEARCH_ID_OVERHEAD,
            separator: SEARCH_SEPARATOR,
        };
        let mut verified = HashMap::new();
        for batch in split(ids, &cap) {
            let paged = collect_all(
                |cursor, limit| {
                    let terminology = Arc::clone(&self.terminology);
                    let batch = batch.clone();
                    let branch = branch.to_string();
                    async move {
                        terminology
                            .search_concepts(&branch, &batch, cursor, limit)
                            .await
                    }
                },
                None,
                self.settings.page_limit,
                self.settings.page_budget,
            )
            .await?;
            if !paged.complete {
                warn!(batch = batch.len(), "Concept verification page budget hit, results may be partial");
            }
            for concept in paged.items {
                verified.insert(concept.concept_id, concept.preferred_term);
            }
        }
        Ok(verified)
    }

    /// Batch-fetch current members for the given referenced ids, bounded
    /// by request URL length since this is a GET with a comma-delimited
    /// id list.
    async fn lookup_members(
        &self,
        branch: &str,
        refset_id: &str,
        ids: &[String],
        active: Option<bool>,
    ) -> anyhow::Result<Vec<RefsetMember>> {
        let cap = BatchCap::Chars {
            budget: self.settings.member_url_max_chars,
            request_overhead: member_query_overhead(branch, refset_id),
            item_overhead: 0,
            separator: MEMBER_URL_SEPARATOR,
        };
        let mut members = Vec::new();
        for batch in split(ids, &cap) {
            let paged = collect_all(
                |cursor, limit| {
                    let terminology = Arc::clone(&self.terminology);
                    let batch = batch.clone();
                    let branch = branch.to_string();
                    let refset_id = refset_id.to_string();
                    async move {
                        terminology
                            .fetch_members(&branch, &refset_id, Some(&batch), active, cursor, limit)
                            .await
                    }
                },
                None,
                self.settings.page_limit,
                self.settings.page_budget,
            )
            .await?;
            if !paged.complete {
                warn!(batch = batch.len(), "Member lookup page budget hit, results may be partial");
            }
            members.extend(paged.items);
        }
        Ok(members)
    }

    async fn run_bulk(
        &self,
        branch: &str,
        members: &[RefsetMember],
        mode: BulkMode,
    ) -> anyhow::Result<()> {
        let handle = match mode {
            BulkMode::Create => self.terminology.bulk_create_members(branch, members).await?,
            BulkMode::Update => self.terminology.bulk_update_members(branch, members).await?,
        };
        match wait_for_job(self.terminology.as_ref(), &handle, &self.settings.bulk_job).await? {
            JobOutcome::Completed => Ok(()),
            JobOutcome::Stale => anyhow::bail!("bulk member job unexpectedly reported stale"),
        }
    }

    /// After any mutation: drop every cache partition for the branch and
    /// re-read the authoritative member count from the server. Failures
    /// here are logged, never propagated: the mutations already happened
    /// and the caller's per-identifier report must survive them.
    async fn finalize(&self, refset: &Refset) {
        self.cache.invalidate_all(&refset.branch_path).await;

        let count = match self
            .remote_member_count(&refset.branch_path, &refset.refset_id)
            .await
        {
            Ok(count) => count,
            Err(e) => {
                warn!(
                    refset_id = %refset.refset_id,
                    error = %e,
                    "Member count recompute failed after mutation, keeping the stale count"
                );
                return;
            }
        };
        let mut updated = refset.clone();
        updated.member_count = count;
        updated.modified_at = chrono::Utc::now();
        if let Err(e) = self.store.update(updated).await {
            warn!(
                refset_id = %refset.refset_id,
                error = %e,
                "Member count persist failed after mutation, keeping the stale count"
            );
        }
    }

    async fn remote_member_count(&self, branch: &str, refset_id: &str) -> anyhow::Result<i64> {
        // one item is enough, the envelope reports the total
        let page = self
            .terminology
            .fetch_members(branch, refset_id, None, Some(true), None, 1)
            .await?;
        Ok(page.total as i64)
    }
}

#[derive(Debug, Clone, Copy)]
enum BulkMode {
    Create,
    Update,
}
