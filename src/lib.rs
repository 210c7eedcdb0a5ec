#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Provisioner Core
//!
//! Self-driving provisioning tasks and mergeable deployment records.
//!
//! ## Overview
//!
//! A provisioning task is a document that advances itself: each substage
//! handler does its remote work, then proposes the next stage as an update
//! to its own document. That update travels the same validated pipeline as
//! an external one, so a task can never skip its own transition checks.
//!
//! Deployment records sit next to the tasks. They merge concurrent partial
//! updates without losing information: counters only move up, key-value
//! maps only grow, and creating a record without a status launches a
//! provisioning task for it.
//!
//! ## Module Organization
//!
//! - [`state_machine`] - Generic self-driving task engine, guards and actions
//! - [`provisioning`] - The provisioning task and its remote client
//! - [`resource`] - Deployment records and their merge reducers
//! - [`document`] - Versioned document store and document templates
//! - [`host`] - Wiring of stores, engine and services
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//! - [`events`] - Task lifecycle event broadcast
//!
//! ## Quick Start
//!
//! New deployment records launch their task with the credentials under
//! `provisioning`. Without them the task is rejected and the record stays at
//! `init`.
//!
//! ```rust,no_run
//! use provisioner_core::config::{ProvisionerConfig, ProvisioningDefaults};
//! use provisioner_core::host::ProvisionerHost;
//! use provisioner_core::provisioning::StaticProvisioningClient;
//! use provisioner_core::resource::ResourceState;
//! use std::sync::Arc;
//!
//! # async fn example() -> provisioner_core::Result<()> {
//! let config = ProvisionerConfig {
//!     provisioning: ProvisioningDefaults {
//!         user: Some("admin".to_string()),
//!         password: Some("s3cret".to_string()),
//!         os_domain: Some("default".to_string()),
//!     },
//!     ..ProvisionerConfig::default()
//! };
//! let host = ProvisionerHost::start(config, Arc::new(StaticProvisioningClient::default()))?;
//!
//! let outcome = host
//!     .resources()
//!     .create(ResourceState::named("db1").with_endpoint("https://cloud.example:5000/v3"))
//!     .await?;
//! println!("provisioning at {:?}", outcome.location());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod document;
pub mod error;
pub mod events;
pub mod host;
pub mod logging;
pub mod provisioning;
pub mod resource;
pub mod state_machine;
pub mod utils;
pub mod validation;

pub use config::{ConfigManager, ProvisionerConfig};
pub use error::{ProvisionerError, Result};
pub use host::ProvisionerHost;
pub use provisioning::{ProvisioningSubStage, ProvisioningTask, ProvisioningTaskHandler};
pub use resource::{CreateOutcome, ResourceService, ResourceState};
pub use state_machine::{TaskStage, TaskStageKind, TaskStateMachine};
