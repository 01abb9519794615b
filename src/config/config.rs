// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::branching::BranchSettings;
use crate::enrich::EnrichSettings;
use crate::jobs::PollSettings;
use crate::membership::SyncSettings;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Terminology server base URL
    pub terminology_url: String,

    /// Optional bearer token for the terminology server
    #[serde(default)]
    pub terminology_api_key: Option<String>,

    /// SQLite database path for the refset store
    pub store_db_path: PathBuf,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Member count reconciliation interval in seconds
    pub reconcile_interval_secs: u64,

    /// Page size for paginated server calls
    pub page_limit: usize,

    /// Wall-clock budget for draining one paginated listing, in seconds
    pub page_budget_secs: u64,

    /// Serialized-size cap for concept search request bodies
    pub search_request_max_chars: usize,

    /// URL-length cap for member lookups with id filters
    pub member_url_max_chars: usize,

    /// Concepts per enrichment fetch
    pub enrich_batch_size: usize,

    /// Concurrent enrichment fetches
    pub enrich_pool_size: usize,

    /// Seconds to wait for in-flight enrichment fetches
    pub enrich_join_timeout_secs: u64,

    /// Bulk member job poll interval in milliseconds
    pub bulk_job_poll_ms: u64,

    /// Bulk member job deadline in seconds
    pub bulk_job_max_wait_secs: u64,

    /// Merge review poll interval in milliseconds
    pub review_poll_ms: u64,

    /// Merge review deadline in seconds
    pub review_max_wait_secs: u64,

    /// Resubmissions allowed when a merge review keeps going stale
    pub review_max_attempts: u32,

    /// Branch merge poll interval in milliseconds
    pub merge_poll_ms: u64,

    /// Branch merge deadline in seconds
    pub merge_max_wait_secs: u64,

    /// Promotion confirmation poll interval in milliseconds
    pub promote_confirm_poll_ms: u64,

    /// Promotion confirmation deadline in seconds
    pub promote_confirm_max_wait_secs: u64,
}

impl Config {
    /// Load configuration from TOML file with environment variable overrides
    pub fn load() -> anyhow::Result<Self> {
        let config_path =
            std::env::var("REFSETD_CONFIG").unwrap_or_else(|_| "config.toml".to_string());

        let mut config: Config = if std::path::Path::new(&config_path).exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            toml::from_str(&contents)?
        } else {
            Config::default()
        };

        if let Ok(val) = std::env::var("REFSETD_TERMINOLOGY_URL") {
            config.terminology_url = val;
        }
        if let Ok(val) = std::env::var("REFSETD_TERMINOLOGY_API_KEY") {
            config.terminology_api_key = Some(val);
        }
        if let Ok(val) = std::env::var("REFSETD_STORE_DB_PATH") {
            config.store_db_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("REFSETD_LOG_LEVEL") {
            config.log_level = val;
        }
        if let Ok(val) = std::env::var("REFSETD_RECONCILE_INTERVAL_SECS") {
            config.reconcile_interval_secs = val.parse()?;
        }
        if let Ok(val) = std::env::var("REFSETD_PAGE_LIMIT") {
            config.page_limit = val.parse()?;
        }
        if let Ok(val) = std::env::var("REFSETD_PAGE_BUDGET_SECS") {
            config.page_budget_secs = val.parse()?;
        }
        if let Ok(val) = std::env::var("REFSETD_SEARCH_REQUEST_MAX_CHARS") {
            config.search_request_max_chars = val.parse()?;
        }
        if let Ok(val) = std::env::var("REFSETD_MEMBER_URL_MAX_CHARS") {
            config.member_url_max_chars = val.parse()?;
        }
        if let Ok(val) = std::env::var("REFSETD_ENRICH_BATCH_SIZE") {
            config.enrich_batch_size = val.parse()?;
        }
        if let Ok(val) = std::env::var("REFSETD_ENRICH_POOL_SIZE") {
            config.enrich_pool_size = val.parse()?;
        }
        if let Ok(val) = std::env::var("REFSETD_ENRICH_JOIN_TIMEOUT_SECS") {
            config.enrich_join_timeout_secs = val.parse()?;
        }
        if let Ok(val) = std::env::var("REFSETD_BULK_JOB_POLL_MS") {
            config.bulk_job_poll_ms = val.parse()?;
        }
        if let Ok(val) = std::env::var("REFSETD_BULK_JOB_MAX_WAIT_SECS") {
            config.bulk_job_max_wait_secs = val.parse()?;
        }
        if let Ok(val) = std::env::var("REFSETD_REVIEW_POLL_MS") {
            config.review_poll_ms = val.parse()?;
        }
        if let Ok(val) = std::env::var("REFSETD_REVIEW_MAX_WAIT_SECS") {
            config.review_max_wait_secs = val.parse()?;
        }
        if let Ok(val) = std::env::var("REFSETD_REVIEW_MAX_ATTEMPTS") {
            config.review_max_attempts = val.parse()?;
        }
        if let Ok(val) = std::env::var("REFSETD_MERGE_POLL_MS") {
            config.merge_poll_ms = val.parse()?;
        }
        if let Ok(val) = std::env::var("REFSETD_MERGE_MAX_WAIT_SECS") {
            config.merge_max_wait_secs = val.parse()?;
        }
        if let Ok(val) = std::env::var("REFSETD_PROMOTE_CONFIRM_POLL_MS") {
            config.promote_confirm_poll_ms = val.parse()?;
        }
        if let Ok(val) = std::env::var("REFSETD_PROMOTE_CONFIRM_MAX_WAIT_SECS") {
            config.promote_confirm_max_wait_secs = val.parse()?;
        }

        Ok(config)
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            search_request_max_chars: self.search_request_max_chars,
            member_url_max_chars: self.member_url_max_chars,
            page_limit: self.page_limit,
            page_budget: Duration::from_secs(self.page_budget_secs),
            bulk_job: PollSettings::new(
                Duration::from_millis(self.bulk_job_poll_ms),
                Duration::from_secs(self.bulk_job_max_wait_secs),
            ),
        }
    }

    pub fn branch_settings(&self) -> BranchSettings {
        BranchSettings {
            review: PollSettings::new(
                Duration::from_millis(self.review_poll_ms),
                Duration::from_secs(self.review_max_wait_secs),
            ),
            review_max_attempts: self.review_max_attempts,
            merge: PollSettings::new(
                Duration::from_millis(self.merge_poll_ms),
                Duration::from_secs(self.merge_max_wait_secs),
            ),
            confirm: PollSettings::new(
                Duration::from_millis(self.promote_confirm_poll_ms),
                Duration::from_secs(self.promote_confirm_max_wait_secs),
            ),
        }
    }

    pub fn enrich_settings(&self) -> EnrichSettings {
        EnrichSettings {
            batch_size: self.enrich_batch_size,
            pool_size: self.enrich_pool_size,
            join_timeout: Duration::from_secs(self.enrich_join_timeout_secs),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            terminology_url: String::from("http://localhost:8080/"),
            terminology_api_key: None,
            store_db_path: PathBuf::from("refsets.db"),
            log_level: String::from("info"),
            reconcile_interval_secs: 300, // 5 minutes
            page_limit: 1000,
            page_budget_secs: 120,
            search_request_max_chars: 7000,
            member_url_max_chars: 6000,
            enrich_batch_size: 100,
            enrich_pool_size: 16,
            enrich_join_timeout_secs: 300,
            bulk_job_poll_ms: 300,
            bulk_job_max_wait_secs: 120,
            review_poll_ms: 500,
            review_max_wait_secs: 60,
            review_max_attempts: 3,
            merge_poll_ms: 1000,
            merge_max_wait_secs: 300,
            promote_confirm_poll_ms: 1000,
            promote_confirm_max_wait_secs: 60,
        }
    }
}
