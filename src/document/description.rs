//! Document descriptions: the indexing and usage hints a document template
//! declares for the substrate to enforce.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a property participates in updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyUsageOption {
    /// Merged from an update only when the update carries a value
    AutoMergeIfNotNull,
    /// May be absent from a valid document
    Optional,
    /// Owned by the service itself; callers may not supply it
    ServiceUse,
}

/// How the index treats a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyIndexingOption {
    /// Index every entry of a map independently
    Expand,
    /// Keep the property sortable
    Sort,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDescription {
    pub usage_options: Vec<PropertyUsageOption>,
    pub indexing_options: Vec<PropertyIndexingOption>,
}

/// Template-level description of a document kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDescription {
    pub property_descriptions: BTreeMap<String, PropertyDescription>,
    /// Only the most recent N versions are retained when set
    pub version_retention_limit: Option<usize>,
}

impl DocumentDescription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_property(
        mut self,
        name: &str,
        usage: &[PropertyUsageOption],
        indexing: &[PropertyIndexingOption],
    ) -> Self {
        self.property_descriptions.insert(
            name.to_string(),
            PropertyDescription {
                usage_options: usage.to_vec(),
                indexing_options: indexing.to_vec(),
            },
        );
        self
    }

    pub fn with_version_retention_limit(mut self, limit: usize) -> Self {
        self.version_retention_limit = Some(limit);
        self
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescription> {
        self.property_descriptions.get(name)
    }

    pub fn has_indexing(&self, name: &str, option: PropertyIndexingOption) -> bool {
        self.property(name)
            .is_some_and(|p| p.indexing_options.contains(&option))
    }

    pub fn has_usage(&self, name: &str, option: PropertyUsageOption) -> bool {
        self.property(name)
            .is_some_and(|p| p.usage_options.contains(&option))
    }

    /// Properties callers are not allowed to supply
    pub fn service_owned_properties(&self) -> impl Iterator<Item = &str> {
        self.property_descriptions
            .iter()
            .filter(|(_, p)| p.usage_options.contains(&PropertyUsageOption::ServiceUse))
            .map(|(name, _)| name.as_str())
    }
}
