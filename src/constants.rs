//! # System Constants
//!
//! Factory links, lifecycle defaults and document field names shared by the
//! provisioning task and the deployment resource.

/// Factory under which deployment resources are created
pub const RESOURCE_FACTORY_LINK: &str = "/oms/deployments";

/// Factory under which provisioning tasks are created
pub const TASK_FACTORY_LINK: &str = "/vio/deployment-tasks";

/// Time in seconds for a provisioning task to live when no lifetime is given
pub const DEFAULT_TASK_LIFETIME_SECS: u64 = 60;

/// Number of resource versions the document index keeps
pub const VERSION_RETENTION_LIMIT: usize = 100;

/// Capacity of the self-update queue feeding the task pipeline
pub const DEFAULT_UPDATE_QUEUE_CAPACITY: usize = 256;

/// Status assigned to a resource whose provisioning has just been requested
pub const RESOURCE_INITIAL_STATUS: &str = "init";

/// Lifecycle event names published on task transitions
pub mod events {
    pub const TASK_STARTED: &str = "task.started";
    pub const TASK_SUB_STAGE_ADVANCED: &str = "task.sub_stage_advanced";
    pub const TASK_FINISHED: &str = "task.finished";
    pub const TASK_FAILED: &str = "task.failed";
    pub const TASK_CANCELLED: &str = "task.cancelled";
}

/// Wire names of document fields, as used in validation messages and
/// document descriptions
pub mod fields {
    pub const NAME: &str = "name";
    pub const ENDPOINT: &str = "endpoint";
    pub const STATUS: &str = "status";
    pub const COUNTER: &str = "counter";
    pub const KEY_VALUES: &str = "keyValues";
    pub const USER: &str = "user";
    pub const PASSWORD: &str = "password";
    pub const OS_DOMAIN: &str = "osDomain";
    pub const TASK_LIFETIME: &str = "taskLifetime";
    pub const SUB_STAGE: &str = "subStage";
    pub const STAGE: &str = "stage";
    pub const FAILURE_MESSAGE: &str = "failureMessage";
    pub const DEPLOYMENT_QUERY_TASK: &str = "deploymentQueryTask";
    pub const DOCUMENT_EXPIRATION_TIME_MICROS: &str = "documentExpirationTimeMicros";
}
