// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::cache::{BranchCache, Cache, Partition};
use crate::store::{Refset, RefsetStore};
use crate::terminology::error::RemoteError;
use crate::terminology::models::{Concept, JobHandle, JobStatus, Page, RefsetMember};
use crate::terminology::traits::Terminology;

/// Create a reference set fixture rooted under MAIN.
pub fn test_refset(refset_id: &str) -> Refset {
    Refset::new(refset_id, format!("Test refset {}", refset_id), "MAIN")
}

/// Scripted terminology gateway for engine tests. Concepts and members
/// live in plain maps; job polls and branch states are played back from
/// queues; every call is recorded for assertions.
pub struct ScriptedTerminology {
    pub concepts: Mutex<HashMap<String, Concept>>,
    pub members: Mutex<Vec<RefsetMember>>,
    pub job_script: Mutex<VecDeque<JobStatus>>,
    pub branch_states: Mutex<VecDeque<String>>,
    pub calls: Mutex<Vec<String>>,
    pub poll_count: AtomicUsize,
    pub fail_concept_search: AtomicBool,
    pub fail_descriptions: AtomicBool,
    /// Fail only the unfiltered member fetch used for count recomputation.
    pub fail_member_count: AtomicBool,
}

impl ScriptedTerminology {
    pub fn new() -> Self {
        Self {
            concepts: Mutex::new(HashMap::new()),
            members: Mutex::new(Vec::new()),
            job_script: Mutex::new(VecDeque::new()),
            branch_states: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            poll_count: AtomicUsize::new(0),
            fail_concept_search: AtomicBool::new(false),
            fail_descriptions: AtomicBool::new(false),
            fail_member_count: AtomicBool::new(false),
        }
    }

    pub fn with_concept(self, concept_id: &str, preferred_term: Option<&str>) -> Self {
        let mut concept = Concept::new(concept_id);
        concept.preferred_term = preferred_term.map(str::to_string);
        self.concepts
            .lock()
            .unwrap()
            .insert(concept_id.to_string(), concept);
        self
    }

    pub fn with_leaf_concept(self, concept_id: &str, leaf: bool) -> Self {
        let mut concept = Concept::new(concept_id);
        concept.leaf = Some(leaf);
        self.concepts
            .lock()
            .unwrap()
            .insert(concept_id.to_string(), concept);
        self
    }

    pub fn add_member(&self, refset_id: &str, referenced_id: &str, active: bool, released: bool) {
        let mut member = RefsetMember::new(refset_id, referenced_id);
        member.active = active;
        member.released = released;
        self.members.lock().unwrap().push(member);
    }

    pub fn script_job(&self, statuses: Vec<JobStatus>) {
        self.job_script.lock().unwrap().extend(statuses);
    }

    pub fn script_branch_states(&self, states: Vec<String>) {
        self.branch_states.lock().unwrap().extend(states);
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

impl Default for ScriptedTerminology {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Terminology for ScriptedTerminology {
    async fn search_concepts(
        &self,
        _branch: &str,
        concept_ids: &[String],
        _cursor: Option<String>,
        _limit: usize,
    ) -> Result<Page<Concept>, RemoteError> {
        self.record("search_concepts");
        if self.fail_concept_search.load(Ordering::SeqCst) {
            return Err(RemoteError::CallFailed {
                status: 503,
                reason: "scripted outage".to_string(),
            });
        }
        let concepts = self.concepts.lock().unwrap();
        let items: Vec<Concept> = concept_ids
            .iter()
            .filter_map(|id| concepts.get(id).cloned())
            .collect();
        Ok(Page {
            total: items.len() as u64,
            items,
            search_after: None,
        })
    }

    async fn fetch_members(
        &self,
        _branch: &str,
        refset_id: &str,
        referenced_ids: Option<&[String]>,
        active: Option<bool>,
        _cursor: Option<String>,
        limit: usize,
    ) -> Result<Page<RefsetMember>, RemoteError> {
        self.record("fetch_members");
        if referenced_ids.is_none() && self.fail_member_count.load(Ordering::SeqCst) {
            return Err(RemoteError::CallFailed {
                status: 503,
                reason: "scripted outage".to_string(),
            });
        }
        let members = self.members.lock().unwrap();
        let matching: Vec<RefsetMember> = members
            .iter()
            .filter(|m| m.refset_id == refset_id)
            .filter(|m| {
                referenced_ids
                    .map(|ids| ids.contains(&m.referenced_component_id))
                    .unwrap_or(true)
            })
            .filter(|m| active.map(|a| m.active == a).unwrap_or(true))
            .cloned()
            .collect();
        let total = matching.len() as u64;
        let items: Vec<RefsetMember> = matching.into_iter().take(limit).collect();
        Ok(Page {
            total,
            items,
            search_after: None,
        })
    }

    async fn create_member(&self, _branch: &str, member: &RefsetMember) -> Result<(), RemoteError> {
        self.record(format!("create_member:{}", member.referenced_component_id));
        self.members.lock().unwrap().push(member.clone());
        Ok(())
    }

    async fn bulk_create_members(
        &self,
        _branch: &str,
        members: &[RefsetMember],
    ) -> Result<JobHandle, RemoteError> {
        self.record(format!("bulk_create:{}", members.len()));
        self.members.lock().unwrap().extend(members.iter().cloned());
        Ok(JobHandle {
            status_url: "http://scripted/jobs/bulk".to_string(),
        })
    }

    async fn bulk_update_members(
        &self,
        _branch: &str,
        members: &[RefsetMember],
    ) -> Result<JobHandle, RemoteError> {
        self.record(format!("bulk_update:{}", members.len()));
        let mut stored = self.members.lock().unwrap();
        for updated in members {
            if let Some(existing) = stored.iter_mut().find(|m| m.member_id == updated.member_id) {
                *existing = updated.clone();
            }
        }
        Ok(JobHandle {
            status_url: "http://scripted/jobs/bulk".to_string(),
        })
    }

    async fn update_member(&self, _branch: &str, member: &RefsetMember) -> Result<(), RemoteError> {
        self.record(format!("update_member:{}", member.member_id));
        let mut stored = self.members.lock().unwrap();
        if let Some(existing) = stored.iter_mut().find(|m| m.member_id == member.member_id) {
            *existing = member.clone();
        }
        Ok(())
    }

    async fn delete_member(&self, _branch: &str, member_id: &str) -> Result<(), RemoteError> {
        self.record(format!("delete_member:{}", member_id));
        self.members
            .lock()
            .unwrap()
            .retain(|m| m.member_id != member_id);
        Ok(())
    }

    async fn poll_job(&self, _status_url: &str) -> Result<JobStatus, RemoteError> {
        self.record("poll_job");
        self.poll_count.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .job_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(JobStatus::completed))
    }

    async fn create_branch(&self, parent: &str, name: &str) -> Result<(), RemoteError> {
        self.record(format!("create_branch:{}/{}", parent, name));
        Ok(())
    }

    async fn branch_state(&self, _branch: &str) -> Result<String, RemoteError> {
        self.record("branch_state");
        Ok(self
            .branch_states
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "UP_TO_DATE".to_string()))
    }

    async fn create_merge_review(
        &self,
        _source: &str,
        _target: &str,
    ) -> Result<JobHandle, RemoteError> {
        self.record("create_merge_review");
        Ok(JobHandle {
            status_url: "http://scripted/merge-reviews/1".to_string(),
        })
    }

    async fn merge_branches(&self, source: &str, target: &str) -> Result<JobHandle, RemoteError> {
        self.record(format!("merge:{}->{}", source, target));
        Ok(JobHandle {
            status_url: "http://scripted/merges/1".to_string(),
        })
    }

    async fn fetch_descriptions(
        &self,
        _branch: &str,
        concept_ids: &[String],
    ) -> Result<HashMap<String, String>, RemoteError> {
        self.record("fetch_descriptions");
        if self.fail_descriptions.load(Ordering::SeqCst) {
            return Err(RemoteError::CallFailed {
                status: 500,
                reason: "scripted outage".to_string(),
            });
        }
        let concepts = self.concepts.lock().unwrap();
        Ok(concept_ids
            .iter()
            .filter_map(|id| {
                concepts
                    .get(id)
                    .and_then(|c| c.preferred_term.clone())
                    .map(|term| (id.clone(), term))
            })
            .collect())
    }

    async fn fetch_leaf_flags(
        &self,
        _branch: &str,
        concept_ids: &[String],
    ) -> Result<HashMap<String, bool>, RemoteError> {
        self.record("fetch_leaf_flags");
        let concepts = self.concepts.lock().unwrap();
        Ok(concept_ids
            .iter()
            .filter_map(|id| {
                concepts
                    .get(id)
                    .map(|c| (id.clone(), c.leaf.unwrap_or(false)))
            })
            .collect())
    }

    async fn fetch_membership_flags(
        &self,
        _branch: &str,
        refset_id: &str,
        concept_ids: &[String],
    ) -> Result<HashSet<String>, RemoteError> {
        self.record("fetch_membership_flags");
        let members = self.members.lock().unwrap();
        Ok(members
            .iter()
            .filter(|m| m.refset_id == refset_id && m.active)
            .filter(|m| concept_ids.contains(&m.referenced_component_id))
            .map(|m| m.referenced_component_id.clone())
            .collect())
    }
}

/// Cache double that records invalidations while behaving like the real
/// branch cache.
pub struct SpyCache {
    inner: BranchCache,
    pub invalidated: Mutex<Vec<String>>,
}

impl SpyCache {
    pub fn new() -> Self {
        Self {
            inner: BranchCache::new(),
            invalidated: Mutex::new(Vec::new()),
        }
    }
}

impl Default for SpyCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for SpyCache {
    async fn get(&self, partition: Partition, branch: &str, key: &str) -> Option<Value> {
        self.inner.get(partition, branch, key).await
    }

    async fn put(&self, partition: Partition, branch: &str, key: &str, value: Value) {
        self.inner.put(partition, branch, key, value).await;
    }

    async fn invalidate_all(&self, branch: &str) {
        self.invalidated.lock().unwrap().push(branch.to_string());
        self.inner.invalidate_all(branch).await;
    }
}

/// In-memory refset store for synchronizer tests.
pub struct MemoryRefsetStore {
    refsets: Mutex<HashMap<String, Refset>>,
}

impl MemoryRefsetStore {
    pub fn new() -> Self {
        Self {
            refsets: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryRefsetStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RefsetStore for MemoryRefsetStore {
    async fn add(&self, refset: Refset) -> anyhow::Result<()> {
        self.refsets
            .lock()
            .unwrap()
            .insert(refset.refset_id.clone(), refset);
        Ok(())
    }

    async fn get(&self, refset_id: &str) -> anyhow::Result<Option<Refset>> {
        Ok(self.refsets.lock().unwrap().get(refset_id).cloned())
    }

    async fn list(&self) -> anyhow::Result<Vec<Refset>> {
        let mut refsets: Vec<Refset> = self.refsets.lock().unwrap().values().cloned().collect();
        refsets.sort_by(|a, b| a.refset_id.cmp(&b.refset_id));
        Ok(refsets)
    }

    async fn update(&self, refset: Refset) -> anyhow::Result<()> {
        self.refsets
            .lock()
            .unwrap()
            .insert(refset.refset_id.clone(), refset);
        Ok(())
    }

    async fn remove(&self, refset_id: &str) -> anyhow::Result<()> {
        self.refsets.lock().unwrap().remove(refset_id);
        Ok(())
    }
}
