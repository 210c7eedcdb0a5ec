use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::constants::{fields, VERSION_RETENTION_LIMIT};
use crate::document::{
    DocumentDescription, DocumentMeta, PropertyIndexingOption, PropertyUsageOption,
    ServiceDocument,
};

/// A deployment record. The same shape serves as stored state, creation
/// body, replacement body and merge patch; absent fields are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Only ever moves up
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter: Option<i64>,
    #[serde(default)]
    pub key_values: HashMap<String, String>,
    #[serde(flatten)]
    pub document: DocumentMeta,
}

impl ResourceState {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_counter(mut self, counter: i64) -> Self {
        self.counter = Some(counter);
        self
    }

    pub fn with_key_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.key_values.insert(key.into(), value.into());
        self
    }

    /// Template published to the document index
    pub fn document_description() -> DocumentDescription {
        use PropertyIndexingOption::{Expand, Sort};
        use PropertyUsageOption::{AutoMergeIfNotNull, Optional};

        DocumentDescription::new()
            .with_property(fields::KEY_VALUES, &[Optional], &[Expand])
            .with_property(fields::NAME, &[AutoMergeIfNotNull], &[Sort])
            .with_property(fields::ENDPOINT, &[AutoMergeIfNotNull, Optional], &[])
            .with_property(fields::STATUS, &[AutoMergeIfNotNull, Optional], &[])
            .with_property(fields::COUNTER, &[Optional], &[])
            .with_version_retention_limit(VERSION_RETENTION_LIMIT)
    }
}

impl ServiceDocument for ResourceState {
    fn meta(&self) -> &DocumentMeta {
        &self.document
    }

    fn meta_mut(&mut self) -> &mut DocumentMeta {
        &mut self.document
    }
}
