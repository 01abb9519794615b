// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

use crate::terminology::error::RemoteError;
use crate::terminology::models::{Concept, JobHandle, JobStatus, Page, RefsetMember};

/// Gateway to the remote terminology server. Everything above the
/// transport layer depends on this seam, so tests can script it.
#[async_trait]
pub trait Terminology: Send + Sync {
    /// Look up concepts by identifier on a branch. Paged; unknown
    /// identifiers are simply absent from the result.
    async fn search_concepts(
        &self,
        branch: &str,
        concept_ids: &[String],
        cursor: Option<String>,
        limit: usize,
    ) -> Result<Page<Concept>, RemoteError>;

    /// Fetch reference-set members on a branch, optionally restricted to
    /// a set of referenced component identifiers and/or an active flag.
    async fn fetch_members(
        &self,
        branch: &str,
        refset_id: &str,
        referenced_ids: Option<&[String]>,
        active: Option<bool>,
        cursor: Option<String>,
        limit: usize,
    ) -> Result<Page<RefsetMember>, RemoteError>;

    /// Create a single member synchronously.
    async fn create_member(&self, branch: &str, member: &RefsetMember) -> Result<(), RemoteError>;

    /// Submit a bulk member creation; returns the job status pointer.
    async fn bulk_create_members(
        &self,
        branch: &str,
        members: &[RefsetMember],
    ) -> Result<JobHandle, RemoteError>;

    /// Submit a bulk member update (members carry their member_id);
    /// returns the job status pointer.
    async fn bulk_update_members(
        &self,
        branch: &str,
        members: &[RefsetMember],
    ) -> Result<JobHandle, RemoteError>;

    /// Update a single member synchronously.
    async fn update_member(&self, branch: &str, member: &RefsetMember) -> Result<(), RemoteError>;

    /// Hard-delete a member. Only valid for members never released.
    async fn delete_member(&self, branch: &str, member_id: &str) -> Result<(), RemoteError>;

    /// Poll an asynchronous job by its status URL.
    async fn poll_job(&self, status_url: &str) -> Result<JobStatus, RemoteError>;

    /// Create a child branch under `parent`.
    async fn create_branch(&self, parent: &str, name: &str) -> Result<(), RemoteError>;

    /// Current state of a branch relative to its parent
    /// (e.g. UP_TO_DATE, FORWARD, BEHIND, DIVERGED).
    async fn branch_state(&self, branch: &str) -> Result<String, RemoteError>;

    /// Create a merge review for rebasing `target` onto `source`.
    async fn create_merge_review(
        &self,
        source: &str,
        target: &str,
    ) -> Result<JobHandle, RemoteError>;

    /// Submit a branch merge from `source` into `target`.
    async fn merge_branches(&self, source: &str, target: &str) -> Result<JobHandle, RemoteError>;

    /// Preferred terms for the given concepts, keyed by concept id.
    async fn fetch_descriptions(
        &self,
        branch: &str,
        concept_ids: &[String],
    ) -> Result<HashMap<String, String>, RemoteError>;

    /// Leaf flags for the given concepts, keyed by concept id.
    async fn fetch_leaf_flags(
        &self,
        branch: &str,
        concept_ids: &[String],
    ) -> Result<HashMap<String, bool>, RemoteError>;

    /// Which of the given concepts are active members of the reference set.
    async fn fetch_membership_flags(
        &self,
        branch: &str,
        refset_id: &str,
        concept_ids: &[String],
    ) -> Result<HashSet<String>, RemoteError>;
}
