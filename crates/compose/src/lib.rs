//! Typed model of a docker compose document.
//!
//! Only the keys the generator reads or writes are typed. Unknown keys are
//! preserved through flattened mappings so templates can carry arbitrary
//! compose settings through generation untouched.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

mod environment;
mod port;
mod service;

pub use environment::{EnvVar, Environment};
pub use port::Port;
pub use service::{
    Command, DependsOn, DependsOnCondition, Dependency, Service, ServiceNetworks, VolumeMount,
};

/// String-keyed map written back in insertion order.
pub type OrderedMap<V> = IndexMap<String, V>;

pub type Volumes = OrderedMap<Option<Mapping>>;
pub type Networks = OrderedMap<Option<Network>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposeFile {
    // top-level keys such as `name` or `x-*` extensions stay in front
    #[serde(flatten)]
    pub extra: Mapping,

    pub services: OrderedMap<Service>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<Volumes>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub networks: Option<Networks>,
}

impl ComposeFile {
    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }

    pub fn service_mut(&mut self, name: &str) -> Option<&mut Service> {
        self.services.get_mut(name)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        to_yaml(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,

    #[serde(flatten)]
    pub extra: Mapping,
}

impl Network {
    pub fn bridge() -> Self {
        Network {
            driver: Some("bridge".to_string()),
            ..Default::default()
        }
    }
}

/// Decodes a document after resolving `<<` merge keys.
pub fn from_yaml<T: DeserializeOwned>(contents: &str) -> Result<T, serde_yaml::Error> {
    let mut value: Value = serde_yaml::from_str(contents)?;
    value.apply_merge()?;
    serde_yaml::from_value(value)
}

/// Block-style YAML in field order.
pub fn to_yaml<T: Serialize>(value: &T) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(value)
}
