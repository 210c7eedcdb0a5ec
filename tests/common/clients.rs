//! Provisioning clients with controllable timing

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use provisioner_core::provisioning::{ConnectionParams, Image, ProvisioningClient, RemoteError, Stack};

/// Lists images immediately but holds every stack listing until released,
/// parking tasks in HEAT_CREATE
pub struct GatedStacksClient {
    images: Vec<Image>,
    stacks: Vec<Stack>,
    gate: Semaphore,
    stack_calls: AtomicUsize,
}

impl GatedStacksClient {
    pub fn new(images: Vec<Image>, stacks: Vec<Stack>) -> Self {
        Self {
            images,
            stacks,
            gate: Semaphore::new(0),
            stack_calls: AtomicUsize::new(0),
        }
    }

    /// Let current and future stack listings through
    pub fn release(&self) {
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }

    /// Stack listings started so far, gated or not
    pub fn stack_calls(&self) -> usize {
        self.stack_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProvisioningClient for GatedStacksClient {
    fn name(&self) -> &'static str {
        "gated"
    }

    async fn list_images(&self, _connection: &ConnectionParams) -> Result<Vec<Image>, RemoteError> {
        Ok(self.images.clone())
    }

    async fn list_stacks(&self, _connection: &ConnectionParams) -> Result<Vec<Stack>, RemoteError> {
        self.stack_calls.fetch_add(1, Ordering::SeqCst);
        match self.gate.acquire().await {
            Ok(_permit) => Ok(self.stacks.clone()),
            Err(_) => Err(RemoteError::Connectivity("gate closed".to_string())),
        }
    }
}
