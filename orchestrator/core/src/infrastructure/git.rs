// Copyright (c) 2026 Northlake Labs
// SPDX-License-Identifier: Apache-2.0

//! Git Collaborator
//!
//! Source-control operations needed by stage provisioning: create a
//! repository, cut a stage branch, set the default branch, push template
//! files. Consulted by the Environment Registry when a stage binding
//! declares git integration; the Promotion Engine never touches it.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::EngineError;
use crate::infrastructure::auth::TokenProvider;
use crate::infrastructure::retry::{retry_with_backoff, Fault, RetryPolicy};

/// A file to be pushed to a repository branch.
#[derive(Debug, Clone, Serialize)]
pub struct RepoFile {
    pub path: String,
    pub content: String,
}

#[async_trait]
pub trait GitCollaborator: Send + Sync {
    async fn create_repo(&self, name: &str) -> Result<(), EngineError>;
    async fn create_branch(&self, repo: &str, branch: &str) -> Result<(), EngineError>;
    async fn set_default_branch(&self, repo: &str, branch: &str) -> Result<(), EngineError>;
    async fn push_files(
        &self,
        repo: &str,
        branch: &str,
        files: &[RepoFile],
    ) -> Result<(), EngineError>;
}

/// REST implementation against the git provider API, sharing the gateway's
/// retry discipline.
pub struct HttpGitCollaborator {
    http: reqwest::Client,
    base_url: String,
    organization: String,
    tokens: Arc<dyn TokenProvider>,
    scope: String,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl HttpGitCollaborator {
    pub fn new(
        base_url: impl Into<String>,
        organization: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            organization: organization.into(),
            tokens,
            scope: scope.into(),
            retry: RetryPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<(), EngineError> {
        let url = format!(
            "{}/orgs/{}{}",
            self.base_url.trim_end_matches('/'),
            self.organization,
            path
        );
        let label = format!("{method} {path}");
        retry_with_backoff(&self.retry, &self.cancel, &label, || {
            let url = url.clone();
            let method = method.clone();
            let body = body.clone();
            async move {
                let token = self
                    .tokens
                    .acquire_token(&self.scope)
                    .await
                    .map_err(Fault::Fatal)?;
                let mut req = self.http.request(method, &url).bearer_auth(token.secret);
                if let Some(json) = &body {
                    req = req.json(json);
                }
                let response = req
                    .send()
                    .await
                    .map_err(|e| Fault::transient(e.to_string()))?;
                let status = response.status();
                if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    return Err(Fault::transient(format!("HTTP {status}")));
                }
                if status.is_client_error() {
                    let message = response.text().await.unwrap_or_default();
                    return Err(Fault::Fatal(EngineError::RemoteRejected {
                        status: status.as_u16(),
                        message,
                    }));
                }
                Ok(())
            }
        })
        .await
    }
}

#[async_trait]
impl GitCollaborator for HttpGitCollaborator {
    async fn create_repo(&self, name: &str) -> Result<(), EngineError> {
        info!(repo = name, "creating repository");
        self.request(
            Method::POST,
            "/repos",
            Some(serde_json::json!({ "name": name })),
        )
        .await
    }

    async fn create_branch(&self, repo: &str, branch: &str) -> Result<(), EngineError> {
        self.request(
            Method::POST,
            &format!("/repos/{repo}/branches"),
            Some(serde_json::json!({ "name": branch })),
        )
        .await
    }

    async fn set_default_branch(&self, repo: &str, branch: &str) -> Result<(), EngineError> {
        self.request(
            Method::PATCH,
            &format!("/repos/{repo}"),
            Some(serde_json::json!({ "defaultBranch": branch })),
        )
        .await
    }

    async fn push_files(
        &self,
        repo: &str,
        branch: &str,
        files: &[RepoFile],
    ) -> Result<(), EngineError> {
        self.request(
            Method::POST,
            &format!("/repos/{repo}/branches/{branch}/files"),
            Some(serde_json::json!({ "files": files })),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::auth::StaticTokenProvider;
    use std::time::Duration;

    fn collaborator(server: &mockito::Server) -> HttpGitCollaborator {
        HttpGitCollaborator::new(
            server.url(),
            "northlake",
            Arc::new(StaticTokenProvider::new("tkn")),
            "git://default",
        )
        .with_retry(RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        })
    }

    #[tokio::test]
    async fn branch_creation_targets_the_repo() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/orgs/northlake/repos/analytics/branches")
            .with_status(201)
            .expect(1)
            .create_async()
            .await;

        collaborator(&server)
            .create_branch("analytics", "test")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn conflict_is_fatal() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/orgs/northlake/repos")
            .with_status(409)
            .with_body("repository exists")
            .expect(1)
            .create_async()
            .await;

        let err = collaborator(&server).create_repo("analytics").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::RemoteRejected { status: 409, .. }
        ));
    }
}
