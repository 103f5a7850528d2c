use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::Value;
use std::fmt;

/// Entry of a service's `ports` list.
#[derive(Debug, Clone, PartialEq)]
pub enum Port {
    /// Short `"host:container"` syntax.
    Published { host: u16, container: u16 },
    /// Anything else (ranges, bound addresses, long syntax) kept as written.
    Other(Value),
}

impl Port {
    /// Publishes `port` on the host under the same number.
    pub fn same(port: u16) -> Self {
        Port::Published {
            host: port,
            container: port,
        }
    }

    fn from_value(value: Value) -> Self {
        if let Value::String(mapping) = &value {
            if let Some((host, container)) = mapping.split_once(':') {
                if let (Ok(host), Ok(container)) = (host.parse(), container.parse()) {
                    return Port::Published { host, container };
                }
            }
        }
        Port::Other(value)
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Port::Published { host, container } => write!(f, "{}:{}", host, container),
            Port::Other(Value::String(raw)) => f.write_str(raw),
            Port::Other(other) => write!(f, "{:?}", other),
        }
    }
}

impl Serialize for Port {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Port::Published { host, container } => {
                format!("{}:{}", host, container).serialize(serializer)
            }
            Port::Other(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Port {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(Port::from_value)
    }
}
