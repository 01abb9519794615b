// SPDX-License-Identifier: GPL-3.0-only
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info};

use crate::terminology::error::RemoteError;
use crate::terminology::models::{JobHandle, JobState};
use crate::terminology::traits::Terminology;

/// Polling cadence for one operation type. Intervals are constant per
/// operation (no exponential backoff), the overall wait is bounded.
#[derive(Debug, Clone)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl PollSettings {
    pub fn new(interval: Duration, max_wait: Duration) -> Self {
        Self { interval, max_wait }
    }
}

/// Terminal outcomes the caller has to act on. `Stale` means the
/// submission (a rebase review) must be retried from scratch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Stale,
}

/// A rebase-merge of a branch with no incoming changes comes back as a
/// FAILED job carrying this phrase. That is a benign no-op, not a
/// failure, and is mapped to completion on purpose.
const NOTHING_TO_MERGE: &str = "nothing to merge";

/// Poll a submitted job to a terminal state with a fixed interval and a
/// bounded overall wait. Exceeding the wait budget is a hard failure,
/// never a silent abandonment.
pub async fn wait_for_job(
    terminology: &dyn Terminology,
    handle: &JobHandle,
    settings: &PollSettings,
) -> Result<JobOutcome, RemoteError> {
    let started = Instant::now();
    loop {
        let status = terminology.poll_job(&handle.status_url).await?;
        match status.state() {
            JobState::Completed => {
                debug!(status_url = %handle.status_url, "Remote job completed");
                return Ok(JobOutcome::Completed);
            }
            JobState::Failed => {
                let message = status
                    .message
                    .unwrap_or_else(|| "remote job failed without a message".to_string());
                if message.to_ascii_lowercase().contains(NOTHING_TO_MERGE) {
                    info!(status_url = %handle.status_url, "Merge had nothing to apply, treating as complete");
                    return Ok(JobOutcome::Completed);
                }
                return Err(RemoteError::JobFailed { message });
            }
            JobState::Stale => {
                debug!(status_url = %handle.status_url, "Remote job went stale");
                return Ok(JobOutcome::Stale);
            }
            JobState::Running => {
                let waited = started.elapsed();
                if waited >= settings.max_wait {
                    return Err(RemoteError::JobTimeout { waited });
                }
                sleep(settings.interval).await;
            }
        }
    }
}
