//! # Provisioner Host
//!
//! Wires the document stores, the provisioning task engine and the resource
//! service into one running unit.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use crate::config::{ConfigManager, ProvisionerConfig, ProvisioningDefaults};
use crate::document::InMemoryDocumentStore;
use crate::error::Result;
use crate::events::{EventPublisher, TaskLifecycleEvent};
use crate::logging::init_structured_logging;
use crate::provisioning::{
    ProvisioningClient, ProvisioningTask, ProvisioningTaskHandler, ProvisioningTaskState,
    ProvisioningTaskUpdate,
};
use crate::resource::{ProvisioningLauncher, ResourceService, ResourceState};
use crate::state_machine::{TaskHandler, TaskStateMachine};
use crate::utils::{build_link, id_from_endpoint};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

pub type ProvisioningEngine = TaskStateMachine<ProvisioningTaskHandler>;

/// Launches provisioning tasks for new resources through the task engine
pub struct EngineLauncher {
    engine: Arc<ProvisioningEngine>,
    defaults: ProvisioningDefaults,
}

impl EngineLauncher {
    pub fn new(engine: Arc<ProvisioningEngine>, defaults: ProvisioningDefaults) -> Self {
        Self { engine, defaults }
    }
}

#[async_trait]
impl ProvisioningLauncher for EngineLauncher {
    fn task_link_for(&self, endpoint: Option<&str>) -> String {
        build_link(self.engine.factory_link(), &id_from_endpoint(endpoint))
    }

    async fn launch(&self, task_link: &str, endpoint: Option<String>) -> Result<()> {
        let mut body = ProvisioningTaskUpdate::new(ProvisioningTaskState {
            endpoint,
            user: self.defaults.user.clone(),
            password: self.defaults.password.clone(),
            os_domain: self.defaults.os_domain.clone(),
            ..Default::default()
        });
        body.self_link = Some(task_link.to_string());

        let task = self.engine.create(body).await?;
        info!(task_link = %task.document.self_link, "Provisioning task launched");
        Ok(())
    }
}

pub struct ProvisionerHost {
    config: ProvisionerConfig,
    tasks: Arc<ProvisioningEngine>,
    resources: ResourceService,
}

impl ProvisionerHost {
    /// Load configuration for the detected environment, install logging and
    /// start the host
    pub fn bootstrap(client: Arc<dyn ProvisioningClient>) -> Result<Self> {
        let manager = ConfigManager::load()?;
        init_structured_logging(&manager.config().logging);
        info!(environment = manager.environment(), "Configuration loaded");
        Self::start(manager.config().clone(), client)
    }

    /// Must be called from within a Tokio runtime
    pub fn start(config: ProvisionerConfig, client: Arc<dyn ProvisioningClient>) -> Result<Self> {
        config.validate()?;

        let handler = ProvisioningTaskHandler::new(client);
        let task_store = Arc::new(InMemoryDocumentStore::<ProvisioningTask>::with_retention_limit(
            handler.document_description().version_retention_limit,
        ));
        let tasks = TaskStateMachine::start(
            handler,
            task_store,
            EventPublisher::new(EVENT_CHANNEL_CAPACITY),
            &config.task,
        );

        let resource_store = Arc::new(InMemoryDocumentStore::<ResourceState>::with_retention_limit(
            Some(config.resource.version_retention_limit),
        ));
        let launcher = Arc::new(EngineLauncher::new(
            Arc::clone(&tasks),
            config.provisioning.clone(),
        ));
        let resources = ResourceService::new(resource_store, launcher);

        info!(
            task_factory = tasks.factory_link(),
            client = tasks.handler().client().name(),
            "Provisioner host started"
        );

        Ok(Self {
            config,
            tasks,
            resources,
        })
    }

    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    pub fn tasks(&self) -> &Arc<ProvisioningEngine> {
        &self.tasks
    }

    pub fn resources(&self) -> &ResourceService {
        &self.resources
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskLifecycleEvent> {
        self.tasks.subscribe()
    }
}
