// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::terminology::error::RemoteError;
use crate::terminology::models::{Concept, JobHandle, JobStatus, Page, RefsetMember};
use crate::terminology::traits::Terminology;

/// Thin reqwest wrapper for the remote terminology server: base-URL
/// joining, bearer auth, and structured responses. No logic beyond
/// transport lives here.
#[derive(Debug, Clone)]
pub struct RestClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

/// Structured response: status code, follow-up Location (for
/// asynchronous submissions) and the parsed JSON body.
#[derive(Debug, Clone)]
pub struct RemoteResponse {
    pub status: u16,
    pub location: Option<String>,
    pub body: Value,
}

impl RemoteResponse {
    /// The remote API mixes 200/201/204 across endpoints, so call sites
    /// check the one code they expect rather than the success family.
    pub fn expect_status(self, expected: u16) -> Result<Self, RemoteError> {
        if self.status == expected {
            Ok(self)
        } else {
            Err(RemoteError::CallFailed {
                status: self.status,
                reason: body_reason(&self.body),
            })
        }
    }

    pub fn parse<T: serde::de::DeserializeOwned>(&self) -> Result<T, RemoteError> {
        Ok(serde_json::from_value(self.body.clone())?)
    }

    /// Extract the job handle from an asynchronous submission; a missing
    /// Location pointer is a hard failure.
    pub fn job_handle(&self) -> Result<JobHandle, RemoteError> {
        self.location
            .clone()
            .map(|status_url| JobHandle { status_url })
            .ok_or(RemoteError::MissingStatusLocation)
    }
}

fn body_reason(body: &Value) -> String {
    match body {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| other.to_string()),
    }
}

impl RestClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> anyhow::Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("refsetd/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
        Ok(self.base_url.join(path)?)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }

    pub async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<RemoteResponse, RemoteError> {
        let url = self.endpoint(path)?;
        let request = self.authorize(self.client.get(url).query(query));
        self.execute(request).await
    }

    /// GET an absolute URL, used for job status pointers which the
    /// server hands back as full Location headers.
    pub async fn get_url(&self, url: &str) -> Result<RemoteResponse, RemoteError> {
        let url = if url.starts_with("http://") || url.starts_with("https://") {
            Url::parse(url)?
        } else {
            self.endpoint(url.trim_start_matches('/'))?
        };
        let request = self.authorize(self.client.get(url));
        self.execute(request).await
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> Result<RemoteResponse, RemoteError> {
        let url = self.endpoint(path)?;
        let request = self.authorize(self.client.post(url).json(body));
        self.execute(request).await
    }

    pub async fn put_json(&self, path: &str, body: &Value) -> Result<RemoteResponse, RemoteError> {
        let url = self.endpoint(path)?;
        let request = self.authorize(self.client.put(url).json(body));
        self.execute(request).await
    }

    pub async fn delete(&self, path: &str) -> Result<RemoteResponse, RemoteError> {
        let url = self.endpoint(path)?;
        let request = self.authorize(self.client.delete(url));
        self.execute(request).await
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<RemoteResponse, RemoteError> {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let location = response
            .headers()
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = response.text().await.unwrap_or_default();
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        debug!(status, "Remote call returned");
        Ok(RemoteResponse {
            status,
            location,
            body,
        })
    }
}

#[derive(Debug, Deserialize)]
struct BranchInfo {
    state: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescriptionItem {
    concept_id: String,
    term: String,
}

/// Production implementation of the terminology gateway over REST.
#[derive(Debug, Clone)]
pub struct RestTerminology {
    rest: RestClient,
}

impl RestTerminology {
    pub fn new(base_url: &str, api_key: Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            rest: RestClient::new(base_url, api_key)?,
        })
    }
}

#[async_trait]
impl Terminology for RestTerminology {
    async fn search_concepts(
        &self,
        branch: &str,
        concept_ids: &[String],
        cursor: Option<String>,
        limit: usize,
    ) -> Result<Page<Concept>, RemoteError> {
        let mut body = serde_json::json!({
            "conceptIds": concept_ids,
            "limit": limit,
        });
        if let Some(cursor) = cursor {
            body["searchAfter"] = Value::String(cursor);
        }
        let response = self
            .rest
            .post_json(&format!("{}/concepts/search", branch), &body)
            .await?
            .expect_status(200)?;
        response.parse()
    }

    async fn fetch_members(
        &self,
        branch: &str,
        refset_id: &str,
        referenced_ids: Option<&[String]>,
        active: Option<bool>,
        cursor: Option<String>,
        limit: usize,
    ) -> Result<Page<RefsetMember>, RemoteError> {
        let mut query: Vec<(&str, String)> = vec![
            ("referenceSet", refset_id.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(ids) = referenced_ids {
            query.push(("referencedComponentId", ids.join(",")));
        }
        if let Some(active) = active {
            query.push(("active", active.to_string()));
        }
        if let Some(cursor) = cursor {
            query.push(("searchAfter", cursor));
        }
        let response = self
            .rest
            .get(&format!("{}/members", branch), &query)
            .await?
            .expect_status(200)?;
        response.parse()
    }

    async fn create_member(&self, branch: &str, member: &RefsetMember) -> Result<(), RemoteError> {
        let body = serde_json::to_value(member)?;
        self.rest
            .post_json(&format!("{}/members", branch), &body)
            .await?
            .expect_status(201)?;
        Ok(())
    }

    async fn bulk_create_members(
        &self,
        branch: &str,
        members: &[RefsetMember],
    ) -> Result<JobHandle, RemoteError> {
        let body = serde_json::to_value(members)?;
        let response = self
            .rest
            .post_json(&format!("{}/members/bulk", branch), &body)
            .await?
            .expect_status(201)?;
        response.job_handle()
    }

    async fn bulk_update_members(
        &self,
        branch: &str,
        members: &[RefsetMember],
    ) -> Result<JobHandle, RemoteError> {
        // The bulk endpoint updates members that carry a member_id and
        // creates the rest, so updates go through the same route.
        self.bulk_create_members(branch, members).await
    }

    async fn update_member(&self, branch: &str, member: &RefsetMember) -> Result<(), RemoteError> {
        let body = serde_json::to_value(member)?;
        self.rest
            .put_json(&format!("{}/members/{}", branch, member.member_id), &body)
            .await?
            .expect_status(200)?;
        Ok(())
    }

    async fn delete_member(&self, branch: &str, member_id: &str) -> Result<(), RemoteError> {
        self.rest
            .delete(&format!("{}/members/{}", branch, member_id))
            .await?
            .expect_status(204)?;
        Ok(())
    }

    async fn poll_job(&self, status_url: &str) -> Result<JobStatus, RemoteError> {
        let response = self.rest.get_url(status_url).await?.expect_status(200)?;
        response.parse()
    }

    async fn create_branch(&self, parent: &str, name: &str) -> Result<(), RemoteError> {
        let body = serde_json::json!({ "parent": parent, "name": name });
        self.rest
            .post_json("branches", &body)
            .await?
            .expect_status(201)?;
        Ok(())
    }

    async fn branch_state(&self, branch: &str) -> Result<String, RemoteError> {
        let response = self
            .rest
            .get(&format!("branches/{}", branch), &[])
            .await?
            .expect_status(200)?;
        let info: BranchInfo = response.parse()?;
        Ok(info.state)
    }

    async fn create_merge_review(
        &self,
        source: &str,
        target: &str,
    ) -> Result<JobHandle, RemoteError> {
        let body = serde_json::json!({ "source": source, "target": target });
        let response = self
            .rest
            .post_json("merge-reviews", &body)
            .await?
            .expect_status(201)?;
        response.job_handle()
    }

    async fn merge_branches(&self, source: &str, target: &str) -> Result<JobHandle, RemoteError> {
        let body = serde_json::json!({ "source": source, "target": target });
        let response = self
            .rest
            .post_json("merges", &body)
            .await?
            .expect_status(201)?;
        response.job_handle()
    }

    async fn fetch_descriptions(
        &self,
        branch: &str,
        concept_ids: &[String],
    ) -> Result<HashMap<String, String>, RemoteError> {
        let query = vec![
            ("conceptIds", concept_ids.join(",")),
            ("active", "true".to_string()),
            ("type", "preferred".to_string()),
            ("limit", concept_ids.len().to_string()),
        ];
        let response = self
            .rest
            .get(&format!("{}/descriptions", branch), &query)
            .await?
            .expect_status(200)?;
        let page: Page<DescriptionItem> = response.parse()?;
        Ok(page
            .items
            .into_iter()
            .map(|d| (d.concept_id, d.term))
            .collect())
    }

    async fn fetch_leaf_flags(
        &self,
        branch: &str,
        concept_ids: &[String],
    ) -> Result<HashMap<String, bool>, RemoteError> {
        let query = vec![
            ("conceptIds", concept_ids.join(",")),
            ("includeLeafFlag", "true".to_string()),
            ("limit", concept_ids.len().to_string()),
        ];
        let response = self
            .rest
            .get(&format!("{}/concepts", branch), &query)
            .await?
            .expect_status(200)?;
        let page: Page<Concept> = response.parse()?;
        Ok(page
            .items
            .into_iter()
            .map(|c| (c.concept_id, c.leaf.unwrap_or(false)))
            .collect())
    }

    async fn fetch_membership_flags(
        &self,
        branch: &str,
        refset_id: &str,
        concept_ids: &[String],
    ) -> Result<HashSet<String>, RemoteError> {
        let page = self
            .fetch_members(
                branch,
                refset_id,
                Some(concept_ids),
                Some(true),
                None,
                concept_ids.len().max(1),
            )
            .await?;
        Ok(page
            .items
            .into_iter()
            .map(|m| m.referenced_component_id)
            .collect())
    }
}
