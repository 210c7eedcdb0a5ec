//! # Deployment Resources
//!
//! Durable deployment records that merge concurrent partial updates
//! without losing information.
//!
//! ## Usage
//!
//! ```rust
//! use provisioner_core::config::ProvisionerConfig;
//! use provisioner_core::host::ProvisionerHost;
//! use provisioner_core::provisioning::StaticProvisioningClient;
//! use provisioner_core::resource::ResourceState;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let host = ProvisionerHost::start(
//!     ProvisionerConfig::default(),
//!     Arc::new(StaticProvisioningClient::default()),
//! )
//! .unwrap();
//!
//! let mut record = ResourceState::named("db1").with_counter(5);
//! record.status = Some("ready".to_string());
//! let link = host.resources().create(record).await.unwrap().state().document.self_link.clone();
//!
//! let lower = ResourceState { counter: Some(3), ..Default::default() };
//! let merged = host.resources().merge(&link, lower).await.unwrap();
//! assert_eq!(merged.counter, Some(5));
//! # });
//! ```

pub mod merge;
pub mod service;
pub mod state;

pub use merge::{merge_counter, merge_key_values, merge_resource};
pub use service::{CreateOutcome, ProvisioningLauncher, ResourceService};
pub use state::ResourceState;
