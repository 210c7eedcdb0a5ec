//! # Provisioning
//!
//! The provisioning task specialization and the remote client it drives.

pub mod client;
pub mod task;

pub use client::{
    render_listing, ConnectionParams, Image, ProvisioningClient, RemoteCall, RemoteError,
    RemoteOperation, Stack, StaticProvisioningClient,
};
pub use task::{
    DeploymentQuery, ProvisioningSubStage, ProvisioningTask, ProvisioningTaskHandler,
    ProvisioningTaskState, ProvisioningTaskUpdate,
};
