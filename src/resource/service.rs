use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::merge::{merge_counter, merge_resource};
use super::state::ResourceState;
use crate::constants::{fields, RESOURCE_FACTORY_LINK, RESOURCE_INITIAL_STATUS};
use crate::document::{DocumentStore, ServiceDocument};
use crate::error::{ProvisionerError, Result};
use crate::logging::log_resource_operation;
use crate::utils::build_link;
use crate::validation::{validate_fields, FieldConstraint, FieldRule, FieldValue};

/// Starts the provisioning task that accompanies a new resource
#[async_trait]
pub trait ProvisioningLauncher: Send + Sync {
    /// Link the task for `endpoint` will live at
    fn task_link_for(&self, endpoint: Option<&str>) -> String;

    async fn launch(&self, task_link: &str, endpoint: Option<String>) -> Result<()>;
}

/// Result of a resource creation
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    /// Stored, with provisioning under way at `location`
    Accepted {
        state: ResourceState,
        location: String,
    },
    /// Stored without provisioning, or an existing record was replaced
    Stored(ResourceState),
}

impl CreateOutcome {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Accepted { .. } => 202,
            Self::Stored(_) => 200,
        }
    }

    pub fn state(&self) -> &ResourceState {
        match self {
            Self::Accepted { state, .. } | Self::Stored(state) => state,
        }
    }

    pub fn location(&self) -> Option<&str> {
        match self {
            Self::Accepted { location, .. } => Some(location),
            Self::Stored(_) => None,
        }
    }
}

static CREATE_RULES: &[FieldRule<ResourceState>] = &[FieldRule::new(
    fields::NAME,
    FieldConstraint::Required,
    |r| FieldValue::text(&r.name),
)];

/// Deployment records: creation with companion provisioning, full
/// replacement and merge patches
pub struct ResourceService {
    store: Arc<dyn DocumentStore<ResourceState>>,
    launcher: Arc<dyn ProvisioningLauncher>,
}

impl ResourceService {
    pub fn new(
        store: Arc<dyn DocumentStore<ResourceState>>,
        launcher: Arc<dyn ProvisioningLauncher>,
    ) -> Self {
        Self { store, launcher }
    }

    pub async fn get(&self, link: &str) -> Result<Option<ResourceState>> {
        self.store.get(link).await
    }

    pub async fn history(&self, link: &str) -> Result<Vec<ResourceState>> {
        self.store.history(link).await
    }

    /// Store a new record.
    ///
    /// A record created without a status is marked `init` and a provisioning
    /// task is requested for its endpoint; the caller gets the task's link
    /// back without waiting for it. Creating at an occupied link replaces the
    /// record there instead.
    pub async fn create(&self, mut body: ResourceState) -> Result<CreateOutcome> {
        validate_fields(&body, CREATE_RULES)?;

        let link = Self::resolve_link(&body.document.self_link);
        body.document.self_link = link.clone();

        let provision = body.status.is_none();
        let mut initial = body.clone();
        if provision {
            initial.status = Some(RESOURCE_INITIAL_STATUS.to_string());
        }

        let created = match self.store.create(initial).await {
            Ok(created) => created,
            Err(ProvisionerError::AlreadyExists(_)) => {
                debug!(link = %link, "Resource exists, converting create to replace");
                return self.replace(&link, body).await.map(CreateOutcome::Stored);
            }
            Err(error) => return Err(error),
        };

        log_resource_operation(
            "create",
            &link,
            created.status.as_deref().unwrap_or_default(),
            None,
        );

        if !provision {
            return Ok(CreateOutcome::Stored(created));
        }

        let location = self.launcher.task_link_for(created.endpoint.as_deref());
        let launcher = Arc::clone(&self.launcher);
        let endpoint = created.endpoint.clone();
        let task_link = location.clone();
        tokio::spawn(async move {
            if let Err(error) = launcher.launch(&task_link, endpoint).await {
                warn!(
                    task_link = %task_link,
                    error = %error,
                    "Deployment failed, task will not finish"
                );
            }
        });

        Ok(CreateOutcome::Accepted {
            state: created,
            location,
        })
    }

    /// Replace the record wholesale, keeping the counter monotonic
    #[instrument(skip(self, body))]
    pub async fn replace(&self, link: &str, body: ResourceState) -> Result<ResourceState> {
        let replaced = self
            .store
            .update(
                link,
                Box::new(move |current: &mut ResourceState| {
                    if current.name.is_some() && body.name.is_none() {
                        return Err(ProvisionerError::InvalidArgument(format!(
                            "{} must be set",
                            fields::NAME
                        )));
                    }

                    let mut next = body;
                    next.counter = merge_counter(current.counter, next.counter);
                    let expiration = next.document.expiration_time_micros;
                    next.document = current.document.clone();
                    next.document.expiration_time_micros = expiration;
                    *current = next;
                    Ok(())
                }),
            )
            .await?;

        log_resource_operation(
            "replace",
            link,
            replaced.status.as_deref().unwrap_or_default(),
            Some(&format!("version {}", replaced.version())),
        );
        Ok(replaced)
    }

    /// Apply a merge patch; the response carries the reconciled record
    #[instrument(skip(self, patch))]
    pub async fn merge(&self, link: &str, patch: ResourceState) -> Result<ResourceState> {
        let merged = self
            .store
            .update(
                link,
                Box::new(move |current: &mut ResourceState| {
                    if !merge_resource(current, &patch) {
                        debug!("Merge patch changed nothing");
                    }
                    Ok(())
                }),
            )
            .await?;

        log_resource_operation(
            "merge",
            link,
            merged.status.as_deref().unwrap_or_default(),
            Some(&format!("version {}", merged.version())),
        );
        Ok(merged)
    }

    fn resolve_link(requested: &str) -> String {
        let requested = requested.trim();
        if requested.is_empty() {
            build_link(RESOURCE_FACTORY_LINK, &Uuid::new_v4().to_string())
        } else if requested.starts_with(RESOURCE_FACTORY_LINK) {
            requested.to_string()
        } else {
            build_link(RESOURCE_FACTORY_LINK, requested)
        }
    }
}
