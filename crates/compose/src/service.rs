use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::{Mapping, Value};

use crate::{Environment, OrderedMap, Port};

/// One entry under `services`.
///
/// The keys the generator touches are typed; everything else the template
/// carries (healthcheck, build, labels, ...) rides along in `extra`. Keys are
/// written back where the template had them. Keys the template lacked follow
/// in field order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Service {
    pub image: Option<String>,
    pub depends_on: Option<DependsOn>,
    pub container_name: Option<String>,
    pub restart: Option<String>,
    pub volumes: Vec<VolumeMount>,
    pub command: Option<Command>,
    pub ports: Vec<Port>,
    pub environment: Option<Environment>,
    pub networks: Option<ServiceNetworks>,
    pub extra: Mapping,

    // document order of the decoded keys
    key_order: Vec<String>,
}

impl Service {
    /// Environment list, created empty when the template has none.
    pub fn environment_mut(&mut self) -> &mut Environment {
        self.environment.get_or_insert_with(Environment::new)
    }

    fn from_mapping(mut mapping: Mapping) -> Result<Self, serde_yaml::Error> {
        let key_order = mapping
            .keys()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();

        let image = take(&mut mapping, "image")?;
        let depends_on = take(&mut mapping, "depends_on")?;
        let container_name = take(&mut mapping, "container_name")?;
        let restart = take(&mut mapping, "restart")?;
        let volumes = take(&mut mapping, "volumes")?.unwrap_or_default();
        let command = take(&mut mapping, "command")?;
        let ports = take(&mut mapping, "ports")?.unwrap_or_default();
        let environment = take(&mut mapping, "environment")?;
        let networks = take(&mut mapping, "networks")?;

        Ok(Service {
            image,
            depends_on,
            container_name,
            restart,
            volumes,
            command,
            ports,
            environment,
            networks,
            extra: mapping,
            key_order,
        })
    }

    fn typed_entries(&self) -> Result<Vec<(&'static str, Value)>, serde_yaml::Error> {
        [
            self.image.as_ref().map(|image| entry("image", image)),
            self.depends_on.as_ref().map(|deps| entry("depends_on", deps)),
            self.container_name
                .as_ref()
                .map(|name| entry("container_name", name)),
            self.restart.as_ref().map(|restart| entry("restart", restart)),
            (!self.volumes.is_empty()).then(|| entry("volumes", &self.volumes)),
            self.command.as_ref().map(|command| entry("command", command)),
            (!self.ports.is_empty()).then(|| entry("ports", &self.ports)),
            self.environment.as_ref().map(|env| entry("environment", env)),
            self.networks.as_ref().map(|networks| entry("networks", networks)),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    fn to_mapping(&self) -> Result<Mapping, serde_yaml::Error> {
        let mut typed = self.typed_entries()?;
        let mut mapping = Mapping::new();

        for key in &self.key_order {
            if let Some(index) = typed.iter().position(|(name, _)| *name == key.as_str()) {
                let (name, value) = typed.remove(index);
                mapping.insert(name.into(), value);
            } else if let Some(value) = self.extra.get(key.as_str()) {
                mapping.insert(key.as_str().into(), value.clone());
            }
        }
        for (name, value) in typed {
            mapping.insert(name.into(), value);
        }
        for (key, value) in &self.extra {
            if !mapping.contains_key(key) {
                mapping.insert(key.clone(), value.clone());
            }
        }
        Ok(mapping)
    }
}

fn take<T: DeserializeOwned>(
    mapping: &mut Mapping,
    key: &str,
) -> Result<Option<T>, serde_yaml::Error> {
    match mapping.shift_remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_yaml::from_value(value).map(Some),
    }
}

fn entry<T: Serialize>(
    key: &'static str,
    value: &T,
) -> Result<(&'static str, Value), serde_yaml::Error> {
    Ok((key, serde_yaml::to_value(value)?))
}

impl Serialize for Service {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_mapping()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Service {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mapping = Option::<Mapping>::deserialize(deserializer)?.unwrap_or_default();
        Service::from_mapping(mapping).map_err(D::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Command {
    Exec(Vec<String>),
    Shell(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VolumeMount {
    /// `source:target[:mode]`
    Short(String),
    Long(Mapping),
}

impl VolumeMount {
    pub fn named(volume: &str, target: &str) -> Self {
        VolumeMount::Short(format!("{}:{}", volume, target))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServiceNetworks {
    List(Vec<String>),
    Map(OrderedMap<Option<Mapping>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependsOnCondition {
    ServiceStarted,
    ServiceHealthy,
    ServiceCompletedSuccessfully,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<DependsOnCondition>,

    #[serde(flatten)]
    pub extra: Mapping,
}

/// `depends_on`, always written in the long mapping form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependsOn(OrderedMap<Dependency>);

impl DependsOn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, service: &str, condition: DependsOnCondition) -> Self {
        self.0.insert(
            service.to_string(),
            Dependency {
                condition: Some(condition),
                ..Default::default()
            },
        );
        self
    }

    pub fn condition(&self, service: &str) -> Option<DependsOnCondition> {
        self.0.get(service).and_then(|dep| dep.condition)
    }

    pub fn contains(&self, service: &str) -> bool {
        self.0.contains_key(service)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl Serialize for DependsOn {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DependsOn {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Form {
            List(Vec<String>),
            Map(OrderedMap<Option<Dependency>>),
        }

        let deps = match Form::deserialize(deserializer)? {
            Form::List(services) => services
                .into_iter()
                .map(|service| (service, Dependency::default()))
                .collect(),
            Form::Map(services) => services
                .into_iter()
                .map(|(service, dep)| (service, dep.unwrap_or_default()))
                .collect(),
        };
        Ok(Self(deps))
    }
}
