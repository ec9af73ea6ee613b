//! Wire format of servarr "provider" resources (indexers, download clients,
//! import lists, applications, indexer proxies) and conversion to and from
//! the service-agnostic model.

use crate::adapter::{ConfigItem, ObservedItem};
use crate::constants::MASKED_FIELD_VALUE;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProviderResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub implementation: String,
    #[serde(default)]
    pub config_contract: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(default)]
    pub fields: Vec<ProviderField>,
    #[serde(default)]
    pub tags: Vec<i64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ProviderField {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

impl ProviderResource {
    /// Observed view; masked and empty fields are dropped so they are never compared
    pub(crate) fn into_observed(self) -> Option<ObservedItem> {
        let id = self.id?;
        let fields = self
            .fields
            .into_iter()
            .filter_map(|field| match field.value {
                Some(serde_json::Value::String(ref s)) if s == MASKED_FIELD_VALUE => None,
                Some(value) => Some((field.name, value)),
                None => None,
            })
            .collect();

        Some(ObservedItem {
            id,
            item: ConfigItem {
                name: self.name,
                implementation: self.implementation,
                enabled: self.enable.unwrap_or(true),
                priority: self.priority,
                fields,
                properties: self.extra,
            },
        })
    }

    /// Request body for create (no id) or update (with id)
    pub(crate) fn from_item(item: &ConfigItem, id: Option<i64>) -> Self {
        Self {
            id,
            name: item.name.clone(),
            implementation: item.implementation.clone(),
            config_contract: format!("{}Settings", item.implementation),
            enable: Some(item.enabled),
            priority: item.priority,
            fields: item
                .fields
                .iter()
                .map(|(name, value)| ProviderField {
                    name: name.clone(),
                    value: Some(value.clone()),
                })
                .collect(),
            tags: Vec::new(),
            extra: item.properties.clone(),
        }
    }
}
