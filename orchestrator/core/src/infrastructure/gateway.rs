// Copyright (c) 2026 Northlake Labs
// SPDX-License-Identifier: Apache-2.0

//! HTTP Remote Gateway
//!
//! reqwest implementation of [`RemoteGateway`] against the workspace REST
//! surface. This is the only component that issues calls to the remote
//! service.
//!
//! Every request runs through the shared retry primitive: 429 (honoring
//! `Retry-After`), 5xx and transport errors are retried with jittered
//! exponential backoff; other 4xx are fatal. A 202 response carries an
//! operation id in the `x-operation-id` header and becomes an
//! [`OperationHandle`] for the caller to poll.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::item::{ItemDefinition, ItemKey, ItemType, ParameterBinding};
use crate::domain::remote::{OperationHandle, OperationStatus, RemoteGateway};
use crate::domain::workspace::{
    Capacity, CapacityId, Connection, ConnectionId, IdentityId, ManagedIdentity, Stage, Workspace,
    WorkspaceId,
};
use crate::error::EngineError;
use crate::infrastructure::auth::TokenProvider;
use crate::infrastructure::retry::{retry_with_backoff, Fault, PollBudget, RetryPolicy};

// ============================================================================
// Wire types
// ============================================================================

#[derive(Deserialize)]
struct ListEnvelope<T> {
    value: Vec<T>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkspaceDto {
    id: Uuid,
    display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    environment_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    capacity_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    managed_identity: Option<IdentityDto>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityDto {
    id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    application_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionDto {
    id: Uuid,
    display_name: String,
    #[serde(default)]
    environment_tag: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CapacityDto {
    id: Uuid,
    display_name: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemSummaryDto {
    display_name: String,
    #[serde(rename = "type")]
    item_type: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemDto {
    display_name: String,
    #[serde(rename = "type")]
    item_type: String,
    payload: serde_json::Value,
    #[serde(default)]
    parameters: Vec<ParameterDto>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParameterDto {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_value: Option<String>,
    #[serde(default)]
    required: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationDto {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

fn workspace_from_dto(dto: WorkspaceDto) -> Workspace {
    let stage = dto
        .environment_tag
        .as_deref()
        .and_then(|tag| Stage::parse(tag).ok())
        .unwrap_or(Stage::Unmanaged);
    Workspace {
        id: WorkspaceId::from_uuid(dto.id),
        name: dto.display_name,
        stage,
        environment_tag: dto.environment_tag,
        capacity: dto.capacity_id.map(CapacityId::from_uuid),
        identity: dto.managed_identity.map(|i| ManagedIdentity {
            id: IdentityId::from_uuid(i.id),
            application_id: i.application_id,
        }),
    }
}

fn item_from_dto(dto: ItemDto) -> ItemDefinition {
    ItemDefinition {
        key: ItemKey::new(dto.display_name, ItemType::from(dto.item_type.as_str())),
        payload: dto.payload,
        parameters: dto
            .parameters
            .into_iter()
            .map(|p| ParameterBinding {
                name: p.name,
                default: p.default_value,
                required: p.required,
            })
            .collect(),
    }
}

fn item_to_dto(item: &ItemDefinition) -> ItemDto {
    ItemDto {
        display_name: item.key.name.clone(),
        item_type: item.key.item_type.as_str().to_string(),
        payload: item.payload.clone(),
        parameters: item
            .parameters
            .iter()
            .map(|p| ParameterDto {
                name: p.name.clone(),
                default_value: p.default.clone(),
                required: p.required,
            })
            .collect(),
    }
}

// ============================================================================
// Gateway
// ============================================================================

pub struct HttpRemoteGateway {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
    scope: String,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl HttpRemoteGateway {
    pub fn new(
        base_url: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
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

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token observed by in-flight retries and backoff sleeps; cancelling it
    /// aborts the gateway's outstanding work.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1{}", self.base_url.trim_end_matches('/'), path)
    }

    fn item_path(workspace: WorkspaceId, key: &ItemKey) -> String {
        format!(
            "/workspaces/{}/items/{}/{}",
            workspace, key.item_type, key.name
        )
    }

    /// Issue one request with bounded retries. Fatal 4xx statuses map to
    /// [`EngineError::RemoteRejected`].
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Response, EngineError> {
        let url = self.url(path);
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
                    let retry_after = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .map(Duration::from_secs);
                    return Err(Fault::Transient {
                        reason: format!("HTTP {status}"),
                        retry_after,
                    });
                }
                if status.is_client_error() {
                    let message = response.text().await.unwrap_or_default();
                    return Err(Fault::Fatal(EngineError::RemoteRejected {
                        status: status.as_u16(),
                        message,
                    }));
                }
                Ok(response)
            }
        })
        .await
    }

    async fn request_json<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, EngineError> {
        let response = self.request(method, path, body).await?;
        response.json::<T>().await.map_err(|e| {
            EngineError::RemoteRejected {
                status: 0,
                message: format!("malformed response body: {e}"),
            }
        })
    }

    /// Read the LRO handle out of a 202 response.
    fn operation_handle(response: &Response) -> Result<OperationHandle, EngineError> {
        let id = response
            .headers()
            .get("x-operation-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or_else(|| EngineError::RemoteRejected {
                status: response.status().as_u16(),
                message: "202 response without x-operation-id header".to_string(),
            })?;
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);
        Ok(OperationHandle { id, retry_after })
    }
}

#[async_trait]
impl RemoteGateway for HttpRemoteGateway {
    #[instrument(skip(self))]
    async fn create_workspace(
        &self,
        name: &str,
        capacity: Option<CapacityId>,
    ) -> Result<Workspace, EngineError> {
        let body = serde_json::json!({
            "displayName": name,
            "capacityId": capacity.map(|c| c.as_uuid()),
        });
        let dto: WorkspaceDto = self
            .request_json(Method::POST, "/workspaces", Some(body))
            .await?;
        Ok(workspace_from_dto(dto))
    }

    async fn get_workspace(&self, id: WorkspaceId) -> Result<Workspace, EngineError> {
        let dto: WorkspaceDto = self
            .request_json(Method::GET, &format!("/workspaces/{id}"), None)
            .await?;
        Ok(workspace_from_dto(dto))
    }

    async fn find_workspace_by_name(&self, name: &str) -> Result<Option<Workspace>, EngineError> {
        let envelope: ListEnvelope<WorkspaceDto> = self
            .request_json(Method::GET, "/workspaces", None)
            .await?;
        Ok(envelope
            .value
            .into_iter()
            .find(|dto| dto.display_name == name)
            .map(workspace_from_dto))
    }

    async fn list_workspaces(&self) -> Result<Vec<Workspace>, EngineError> {
        let envelope: ListEnvelope<WorkspaceDto> = self
            .request_json(Method::GET, "/workspaces", None)
            .await?;
        Ok(envelope.value.into_iter().map(workspace_from_dto).collect())
    }

    async fn update_workspace(&self, workspace: &Workspace) -> Result<(), EngineError> {
        let body = serde_json::json!({
            "displayName": workspace.name,
            "environmentTag": workspace.environment_tag,
            "capacityId": workspace.capacity.map(|c| c.as_uuid()),
        });
        self.request(
            Method::PATCH,
            &format!("/workspaces/{}", workspace.id),
            Some(body),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_workspace(&self, id: WorkspaceId) -> Result<(), EngineError> {
        self.request(Method::DELETE, &format!("/workspaces/{id}"), None)
            .await?;
        Ok(())
    }

    async fn list_items(&self, workspace: WorkspaceId) -> Result<Vec<ItemKey>, EngineError> {
        let envelope: ListEnvelope<ItemSummaryDto> = self
            .request_json(Method::GET, &format!("/workspaces/{workspace}/items"), None)
            .await?;
        Ok(envelope
            .value
            .into_iter()
            .map(|s| ItemKey::new(s.display_name, ItemType::from(s.item_type.as_str())))
            .collect())
    }

    async fn get_item(
        &self,
        workspace: WorkspaceId,
        key: &ItemKey,
    ) -> Result<ItemDefinition, EngineError> {
        let dto: ItemDto = self
            .request_json(Method::GET, &Self::item_path(workspace, key), None)
            .await?;
        Ok(item_from_dto(dto))
    }

    async fn create_item(
        &self,
        workspace: WorkspaceId,
        item: &ItemDefinition,
    ) -> Result<(), EngineError> {
        let body = serde_json::to_value(item_to_dto(item))?;
        self.request(
            Method::POST,
            &format!("/workspaces/{workspace}/items"),
            Some(body),
        )
        .await?;
        Ok(())
    }

    async fn update_item(
        &self,
        workspace: WorkspaceId,
        item: &ItemDefinition,
    ) -> Result<(), EngineError> {
        let body = serde_json::to_value(item_to_dto(item))?;
        self.request(Method::PUT, &Self::item_path(workspace, &item.key), Some(body))
            .await?;
        Ok(())
    }

    async fn delete_item(
        &self,
        workspace: WorkspaceId,
        key: &ItemKey,
    ) -> Result<(), EngineError> {
        self.request(Method::DELETE, &Self::item_path(workspace, key), None)
            .await?;
        Ok(())
    }

    async fn invoke_item(
        &self,
        workspace: WorkspaceId,
        key: &ItemKey,
    ) -> Result<OperationHandle, EngineError> {
        let path = format!("{}/invoke", Self::item_path(workspace, key));
        let response = self.request(Method::POST, &path, None).await?;
        Self::operation_handle(&response)
    }

    async fn list_connections(&self) -> Result<Vec<Connection>, EngineError> {
        let envelope: ListEnvelope<ConnectionDto> = self
            .request_json(Method::GET, "/connections", None)
            .await?;
        Ok(envelope
            .value
            .into_iter()
            .map(|dto| Connection {
                id: ConnectionId::from_uuid(dto.id),
                name: dto.display_name,
                environment_tag: dto.environment_tag,
            })
            .collect())
    }

    async fn delete_connection(&self, id: ConnectionId) -> Result<(), EngineError> {
        self.request(Method::DELETE, &format!("/connections/{id}"), None)
            .await?;
        Ok(())
    }

    async fn list_capacities(&self) -> Result<Vec<Capacity>, EngineError> {
        let envelope: ListEnvelope<CapacityDto> = self
            .request_json(Method::GET, "/capacities", None)
            .await?;
        Ok(envelope
            .value
            .into_iter()
            .map(|dto| Capacity {
                id: CapacityId::from_uuid(dto.id),
                name: dto.display_name,
            })
            .collect())
    }

    async fn get_identity(
        &self,
        workspace: WorkspaceId,
    ) -> Result<Option<ManagedIdentity>, EngineError> {
        let path = format!("/workspaces/{workspace}/managedIdentity");
        match self.request_json::<IdentityDto>(Method::GET, &path, None).await {
            Ok(dto) => Ok(Some(ManagedIdentity {
                id: IdentityId::from_uuid(dto.id),
                application_id: dto.application_id,
            })),
            Err(EngineError::RemoteRejected { status: 404, .. }) => Ok(None),
            Err(other) => Err(other),
        }
    }

    #[instrument(skip(self))]
    async fn provision_identity(
        &self,
        workspace: WorkspaceId,
    ) -> Result<OperationHandle, EngineError> {
        let path = format!("/workspaces/{workspace}/managedIdentity");
        let response = self.request(Method::POST, &path, None).await?;
        Self::operation_handle(&response)
    }

    async fn poll_operation(
        &self,
        handle: &OperationHandle,
    ) -> Result<OperationStatus, EngineError> {
        let dto: OperationDto = self
            .request_json(Method::GET, &format!("/operations/{}", handle.id), None)
            .await?;
        Ok(match dto.status.as_str() {
            "Succeeded" => OperationStatus::Succeeded,
            "Failed" => OperationStatus::Failed(dto.error.unwrap_or_default()),
            _ => OperationStatus::Running,
        })
    }
}

/// Drive a long-running operation to its terminal state through the shared
/// polling primitive. `OperationStatus::Failed` becomes a fatal error for the
/// named operation.
pub async fn wait_operation(
    gateway: &dyn RemoteGateway,
    handle: &OperationHandle,
    budget: &PollBudget,
    cancel: &CancellationToken,
    label: &str,
) -> Result<(), EngineError> {
    let budget = PollBudget {
        timeout: budget.timeout,
        interval: handle.retry_after.unwrap_or(budget.interval),
    };
    crate::infrastructure::retry::poll_until(&budget, cancel, label, || async {
        match gateway.poll_operation(handle).await? {
            OperationStatus::Running => Ok(None),
            OperationStatus::Succeeded => Ok(Some(Ok(()))),
            OperationStatus::Failed(reason) => Ok(Some(Err(reason)))
        }
    })
    .await?
    .map_err(|reason| EngineError::RemoteRejected {
        status: 0,
        message: format!("{label} failed: {reason}"),
    })
}
