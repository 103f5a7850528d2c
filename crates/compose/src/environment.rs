use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::Value;
use std::fmt;

/// A single `NAME=value` entry. A bare `NAME` passes the variable through
/// from the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvVar {
    pub name: String,
    pub value: Option<String>,
}

impl EnvVar {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    pub fn parse(entry: &str) -> Self {
        match entry.split_once('=') {
            Some((name, value)) => EnvVar::new(name, value),
            None => Self {
                name: entry.to_string(),
                value: None,
            },
        }
    }
}

impl fmt::Display for EnvVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.name, value),
            None => f.write_str(&self.name),
        }
    }
}

/// Environment of a service, always written in list form.
///
/// Templates may use either the list form or the mapping form; the mapping
/// form is normalized on load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment(Vec<EnvVar>);

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push(EnvVar::new(name, value));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value of the last entry named `name`, matching how compose resolves
    /// duplicates.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|var| var.name == name)
            .and_then(|var| var.value.as_deref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|var| var.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EnvVar> {
        self.0.iter()
    }
}

impl From<Vec<EnvVar>> for Environment {
    fn from(vars: Vec<EnvVar>) -> Self {
        Self(vars)
    }
}

impl FromIterator<EnvVar> for Environment {
    fn from_iter<I: IntoIterator<Item = EnvVar>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Serialize for Environment {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(self.0.iter().map(ToString::to_string))
    }
}

fn scalar_to_string(value: Value) -> Result<Option<String>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(format!("unsupported environment value: {:?}", other)),
    }
}

impl<'de> Deserialize<'de> for Environment {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let vars = match Value::deserialize(deserializer)? {
            Value::Null => Vec::new(),
            Value::Sequence(entries) => entries
                .into_iter()
                .map(|entry| match scalar_to_string(entry).map_err(D::Error::custom)? {
                    Some(entry) => Ok(EnvVar::parse(&entry)),
                    None => Err(D::Error::custom("empty environment entry")),
                })
                .collect::<Result<_, _>>()?,
            Value::Mapping(entries) => entries
                .into_iter()
                .map(|(name, value)| {
                    let name = scalar_to_string(name)
                        .map_err(D::Error::custom)?
                        .ok_or_else(|| D::Error::custom("empty environment variable name"))?;
                    let value = scalar_to_string(value).map_err(D::Error::custom)?;
                    Ok(EnvVar { name, value })
                })
                .collect::<Result<_, _>>()?,
            other => {
                return Err(D::Error::custom(format!(
                    "environment must be a list or a mapping, got {:?}",
                    other
                )));
            }
        };
        Ok(Self(vars))
    }
}
