//! Provisioning task: lists the target's images, then its orchestration
//! stacks, recording both in the task status before finishing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::client::{render_listing, ConnectionParams, ProvisioningClient};
use crate::constants::{fields, TASK_FACTORY_LINK, VERSION_RETENTION_LIMIT};
use crate::document::{DocumentDescription, PropertyIndexingOption, PropertyUsageOption};
use crate::error::{ProvisionerError, Result};
use crate::state_machine::{
    SubStage, TaskContext, TaskHandler, TaskRecordOf, TaskStageKind, TaskUpdateOf,
};
use crate::utils::{id_from_endpoint, now_micros};
use crate::validation::{FieldConstraint, FieldRule, FieldValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvisioningSubStage {
    ImageList,
    HeatCreate,
}

impl fmt::Display for ProvisioningSubStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImageList => write!(f, "IMAGE_LIST"),
            Self::HeatCreate => write!(f, "HEAT_CREATE"),
        }
    }
}

impl SubStage for ProvisioningSubStage {}

/// Record of the image query a task issued
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentQuery {
    pub images_found: usize,
    pub issued_at_micros: i64,
}

/// Specialization fields of a provisioning task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningTaskState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_domain: Option<String>,
    /// Requested lifetime in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_lifetime: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_query_task: Option<DeploymentQuery>,
}

impl ProvisioningTaskState {
    pub fn connection(&self) -> Result<ConnectionParams> {
        fn required(value: &Option<String>, field: &str) -> Result<String> {
            value
                .as_ref()
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .ok_or_else(|| {
                    ProvisionerError::InvalidArgument(format!("{field} is required"))
                })
        }

        Ok(ConnectionParams {
            endpoint: required(&self.endpoint, fields::ENDPOINT)?,
            user: required(&self.user, fields::USER)?,
            password: required(&self.password, fields::PASSWORD)?,
            os_domain: required(&self.os_domain, fields::OS_DOMAIN)?,
        })
    }

    /// Results are appended to the status, never replacing earlier ones
    pub fn append_status(&mut self, text: &str) {
        self.status.get_or_insert_with(String::new).push_str(text);
    }
}

pub type ProvisioningTask = TaskRecordOf<ProvisioningTaskHandler>;
pub type ProvisioningTaskUpdate = TaskUpdateOf<ProvisioningTaskHandler>;

static CREATE_RULES: &[FieldRule<ProvisioningTaskUpdate>] = &[
    FieldRule::new(fields::SUB_STAGE, FieldConstraint::ServiceOwned, |u| {
        FieldValue::of(&u.sub_stage)
    }),
    FieldRule::new(
        fields::DEPLOYMENT_QUERY_TASK,
        FieldConstraint::ServiceOwned,
        |u| FieldValue::of(&u.payload.deployment_query_task),
    ),
    FieldRule::new(fields::TASK_LIFETIME, FieldConstraint::Positive, |u| {
        FieldValue::number(u.payload.task_lifetime)
    }),
    FieldRule::new(fields::ENDPOINT, FieldConstraint::Required, |u| {
        FieldValue::text(&u.payload.endpoint)
    }),
    FieldRule::new(fields::USER, FieldConstraint::Required, |u| {
        FieldValue::text(&u.payload.user)
    }),
    FieldRule::new(fields::PASSWORD, FieldConstraint::Required, |u| {
        FieldValue::text(&u.payload.password)
    }),
    FieldRule::new(fields::OS_DOMAIN, FieldConstraint::Required, |u| {
        FieldValue::text(&u.payload.os_domain)
    }),
];

pub struct ProvisioningTaskHandler {
    client: Arc<dyn ProvisioningClient>,
}

impl ProvisioningTaskHandler {
    pub fn new(client: Arc<dyn ProvisioningClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<dyn ProvisioningClient> {
        &self.client
    }

    async fn handle_image_list(
        &self,
        task: ProvisioningTask,
        ctx: TaskContext<Self>,
    ) -> Result<()> {
        let connection = match task.payload.connection() {
            Ok(connection) => connection,
            Err(error) => return ctx.fail(&task, error.to_string()).await,
        };

        let images = match self.client.list_images(&connection).await {
            Ok(images) => images,
            Err(error) => {
                warn!(task_link = %ctx.link(), error = %error, "Image listing failed");
                return ctx
                    .fail(&task, ProvisionerError::from(error).to_string())
                    .await;
            }
        };
        info!(task_link = %ctx.link(), images = images.len(), "Listed images");

        ctx.advance_with(&task, TaskStageKind::Started, |update| {
            update.sub_stage = Some(ProvisioningSubStage::HeatCreate);
            update.payload.status = Some(render_listing(&images));
            update.payload.deployment_query_task = Some(DeploymentQuery {
                images_found: images.len(),
                issued_at_micros: now_micros(),
            });
        })
        .await
    }

    async fn handle_heat_create(
        &self,
        task: ProvisioningTask,
        ctx: TaskContext<Self>,
    ) -> Result<()> {
        let connection = match task.payload.connection() {
            Ok(connection) => connection,
            Err(error) => return ctx.fail(&task, error.to_string()).await,
        };

        let stacks = match self.client.list_stacks(&connection).await {
            Ok(stacks) => stacks,
            Err(error) => {
                warn!(task_link = %ctx.link(), error = %error, "Stack listing failed");
                return ctx
                    .fail(&task, ProvisionerError::from(error).to_string())
                    .await;
            }
        };
        info!(task_link = %ctx.link(), stacks = stacks.len(), "Listed stacks");

        ctx.advance_with(&task, TaskStageKind::Finished, |update| {
            update.payload.status = Some(render_listing(&stacks))
        })
        .await
    }
}

#[async_trait]
impl TaskHandler for ProvisioningTaskHandler {
    type SubStage = ProvisioningSubStage;
    type Payload = ProvisioningTaskState;

    fn factory_link(&self) -> &'static str {
        TASK_FACTORY_LINK
    }

    fn initial_sub_stage(&self) -> ProvisioningSubStage {
        ProvisioningSubStage::ImageList
    }

    fn create_rules(&self) -> &'static [FieldRule<ProvisioningTaskUpdate>] {
        CREATE_RULES
    }

    fn document_id(&self, payload: &ProvisioningTaskState) -> String {
        id_from_endpoint(payload.endpoint.as_deref())
    }

    fn requested_lifetime(&self, payload: &ProvisioningTaskState) -> Option<Duration> {
        payload
            .task_lifetime
            .and_then(|secs| u64::try_from(secs).ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    fn merge_payload(&self, current: &mut ProvisioningTaskState, update: &ProvisioningTaskState) {
        fn overwrite<T: Clone>(current: &mut Option<T>, update: &Option<T>) {
            if update.is_some() {
                current.clone_from(update);
            }
        }

        overwrite(&mut current.endpoint, &update.endpoint);
        overwrite(&mut current.user, &update.user);
        overwrite(&mut current.password, &update.password);
        overwrite(&mut current.os_domain, &update.os_domain);
        overwrite(&mut current.task_lifetime, &update.task_lifetime);
        if let Some(text) = &update.status {
            current.append_status(text);
        }
        // written once, by the first image listing
        if current.deployment_query_task.is_none() {
            current
                .deployment_query_task
                .clone_from(&update.deployment_query_task);
        }
    }

    fn document_description(&self) -> DocumentDescription {
        use PropertyUsageOption::{AutoMergeIfNotNull, Optional, ServiceUse};

        DocumentDescription::new()
            .with_property(fields::ENDPOINT, &[AutoMergeIfNotNull], &[])
            .with_property(fields::USER, &[AutoMergeIfNotNull], &[])
            .with_property(fields::PASSWORD, &[AutoMergeIfNotNull], &[])
            .with_property(fields::OS_DOMAIN, &[AutoMergeIfNotNull], &[])
            .with_property(fields::TASK_LIFETIME, &[Optional], &[])
            .with_property(fields::STATUS, &[AutoMergeIfNotNull, Optional], &[])
            .with_property(
                fields::SUB_STAGE,
                &[AutoMergeIfNotNull, ServiceUse],
                &[PropertyIndexingOption::Sort],
            )
            .with_property(fields::DEPLOYMENT_QUERY_TASK, &[ServiceUse, Optional], &[])
            .with_version_retention_limit(VERSION_RETENTION_LIMIT)
    }

    async fn handle_sub_stage(
        &self,
        task: ProvisioningTask,
        sub_stage: ProvisioningSubStage,
        ctx: TaskContext<Self>,
    ) -> Result<()> {
        match sub_stage {
            ProvisioningSubStage::ImageList => self.handle_image_list(task, ctx).await,
            ProvisioningSubStage::HeatCreate => self.handle_heat_create(task, ctx).await,
        }
    }
}
