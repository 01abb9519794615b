// SPDX-License-Identifier: GPL-3.0-only
use anyhow::Context;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::cache::Cache;
use crate::jobs::{JobOutcome, PollSettings, wait_for_job};
use crate::terminology::Terminology;

/// Branch states that prove a promotion became visible.
const PROMOTED_STATES: [&str; 3] = ["FORWARD", "CURRENT", "UP_TO_DATE"];

#[derive(Debug, Clone)]
pub struct BranchSettings {
    pub review: PollSettings,
    /// How often a stale review is resubmitted before giving up.
    pub review_max_attempts: u32,
    pub merge: PollSettings,
    /// Cadence of the post-promotion branch-state confirmation loop.
    pub confirm: PollSettings,
}

impl Default for BranchSettings {
    fn default() -> Self {
        Self {
            review: PollSettings::new(Duration::from_millis(500), Duration::from_secs(60)),
            review_max_attempts: 3,
            merge: PollSettings::new(Duration::from_millis(1000), Duration::from_secs(300)),
            confirm: PollSettings::new(Duration::from_millis(1000), Duration::from_secs(60)),
        }
    }
}

/// Branch operations against the remote server: create, rebase onto the
/// parent, promote into the parent. Asynchronous server jobs go through
/// the job poller; every completed mutation invalidates the branch
/// caches.
pub struct BranchService {
    terminology: Arc<dyn Terminology>,
    cache: Arc<dyn Cache>,
    settings: BranchSettings,
}

impl BranchService {
    pub fn new(
        terminology: Arc<dyn Terminology>,
        cache: Arc<dyn Cache>,
        settings: BranchSettings,
    ) -> Self {
        Self {
            terminology,
            cache,
            settings,
        }
    }

    /// Create the editing branch for a reference set under its edition
    /// branch. Returns the new branch path.
    pub async fn create_refset_branch(
        &self,
        parent: &str,
        refset_id: &str,
    ) -> anyhow::Result<String> {
        self.terminology
            .create_branch(parent, refset_id)
            .await
            .context("branch creation failed")?;
        let branch = format!("{}/{}", parent, refset_id);
        info!(branch = %branch, "Created reference set branch");
        Ok(branch)
    }

    /// Rebase `branch` onto `parent`: run a merge review, resubmitting
    /// from scratch when the server reports it stale, then apply the
    /// merge. A merge with nothing to apply completes benignly.
    pub async fn rebase(&self, parent: &str, branch: &str) -> anyhow::Result<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let review = self
                .terminology
                .create_merge_review(parent, branch)
                .await
                .context("merge review submission failed")?;
            match wait_for_job(self.terminology.as_ref(), &review, &self.settings.review).await? {
                JobOutcome::Completed => break,
                JobOutcome::Stale => {
                    if attempt >= self.settings.review_max_attempts {
                        anyhow::bail!(
                            "merge review for {} kept going stale after {} attempts",
                            branch,
                            attempt
                        );
                    }
                    warn!(branch = %branch, attempt, "Merge review went stale, submitting a fresh one");
                }
            }
        }

        let merge = self
            .terminology
            .merge_branches(parent, branch)
            .await
            .context("rebase merge submission failed")?;
        match wait_for_job(self.terminology.as_ref(), &merge, &self.settings.merge).await? {
            JobOutcome::Completed => {}
            JobOutcome::Stale => anyhow::bail!("rebase merge unexpectedly reported stale"),
        }

        self.cache.invalidate_all(branch).await;
        info!(branch = %branch, "Rebase completed");
        Ok(())
    }

    /// Promote `branch` into `parent`. The server's job-complete signal
    /// and the branch-state-visible signal are not synchronized, so a
    /// second confirmation loop polls branch state until the promotion
    /// is actually observable.
    pub async fn promote(&self, branch: &str, parent: &str) -> anyhow::Result<()> {
        let merge = self
            .terminology
            .merge_branches(branch, parent)
            .await
            .context("promotion submission failed")?;
        match wait_for_job(self.terminology.as_ref(), &merge, &self.settings.merge).await? {
            JobOutcome::Completed => {}
            JobOutcome::Stale => anyhow::bail!("promotion merge unexpectedly reported stale"),
        }

        self.confirm_promotion(branch).await?;

        self.cache.invalidate_all(branch).await;
        self.cache.invalidate_all(parent).await;
        info!(branch = %branch, parent = %parent, "Promotion completed");
        Ok(())
    }

    async fn confirm_promotion(&self, branch: &str) -> anyhow::Result<()> {
        let started = Instant::now();
        loop {
            let state = self.terminology.branch_state(branch).await?;
            if PROMOTED_STATES.contains(&state.as_str()) {
                debug!(branch = %branch, state = %state, "Promotion visible in branch state");
                return Ok(());
            }
            if started.elapsed() >= self.settings.confirm.max_wait {
                anyhow::bail!(
                    "branch {} did not confirm promotion within {:?}, last state {}",
                    branch,
                    self.settings.confirm.max_wait,
                    state
                );
            }
            debug!(branch = %branch, state = %state, "Waiting for promotion to become visible");
            sleep(self.settings.confirm.interval).await;
        }
    }
}
