//! Remote provisioning target: the compute image catalog and the
//! orchestration stack listing, reached with per-task credentials.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::error::ProvisionerError;

/// Credentials and scope for one remote session
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionParams {
    pub endpoint: String,
    pub user: String,
    pub password: String,
    pub os_domain: String,
}

// Keeps the password out of logs
impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("endpoint", &self.endpoint)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("os_domain", &self.os_domain)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    pub name: String,
    pub status: String,
}

impl Image {
    pub fn new(id: impl Into<String>, name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: status.into(),
        }
    }
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Image{{id={}, name={}, status={}}}", self.id, self.name, self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    pub id: String,
    pub name: String,
    pub status: String,
}

impl Stack {
    pub fn new(id: impl Into<String>, name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: status.into(),
        }
    }
}

impl fmt::Display for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stack{{id={}, name={}, status={}}}", self.id, self.name, self.status)
    }
}

/// Render a listing the way it is recorded in a task's status
pub fn render_listing<T: fmt::Display>(items: &[T]) -> String {
    let rendered: Vec<String> = items.iter().map(ToString::to_string).collect();
    format!("[{}]", rendered.join(", "))
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("target unreachable: {0}")]
    Connectivity(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Other(String),
}

impl From<RemoteError> for ProvisionerError {
    fn from(error: RemoteError) -> Self {
        ProvisionerError::RemoteOperationFailure(error.to_string())
    }
}

#[async_trait]
pub trait ProvisioningClient: Send + Sync {
    fn name(&self) -> &'static str;

    async fn list_images(&self, connection: &ConnectionParams) -> Result<Vec<Image>, RemoteError>;

    async fn list_stacks(&self, connection: &ConnectionParams) -> Result<Vec<Stack>, RemoteError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOperation {
    ListImages,
    ListStacks,
}

/// A call a [`StaticProvisioningClient`] has served
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    pub operation: RemoteOperation,
    pub endpoint: String,
}

/// Client answering from fixed listings, for tests and dry runs
#[derive(Debug, Default)]
pub struct StaticProvisioningClient {
    images: Vec<Image>,
    stacks: Vec<Stack>,
    image_failure: Option<RemoteError>,
    stack_failure: Option<RemoteError>,
    latency: Option<Duration>,
    calls: Mutex<Vec<RemoteCall>>,
}

impl StaticProvisioningClient {
    pub fn new(images: Vec<Image>, stacks: Vec<Stack>) -> Self {
        Self {
            images,
            stacks,
            ..Self::default()
        }
    }

    pub fn failing_images(mut self, error: RemoteError) -> Self {
        self.image_failure = Some(error);
        self
    }

    pub fn failing_stacks(mut self, error: RemoteError) -> Self {
        self.stack_failure = Some(error);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, operation: RemoteOperation) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    async fn serve(&self, operation: RemoteOperation, connection: &ConnectionParams) {
        self.calls.lock().push(RemoteCall {
            operation,
            endpoint: connection.endpoint.clone(),
        });
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl ProvisioningClient for StaticProvisioningClient {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn list_images(&self, connection: &ConnectionParams) -> Result<Vec<Image>, RemoteError> {
        self.serve(RemoteOperation::ListImages, connection).await;
        match &self.image_failure {
            Some(error) => Err(error.clone()),
            None => Ok(self.images.clone()),
        }
    }

    async fn list_stacks(&self, connection: &ConnectionParams) -> Result<Vec<Stack>, RemoteError> {
        self.serve(RemoteOperation::ListStacks, connection).await;
        match &self.stack_failure {
            Some(error) => Err(error.clone()),
            None => Ok(self.stacks.clone()),
        }
    }
}
