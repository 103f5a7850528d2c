use compose::ComposeFile;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::config::Config;
use crate::error::{GenerateError, Result};

pub const OUTPUT_FILE: &str = "docker-compose.yml";

/// Destination of the generated manifest.
pub trait ManifestSink {
    fn write(&self, compose: &ComposeFile) -> Result<()>;

    /// Human-readable destination, used in the run report.
    fn describe(&self) -> String;
}

fn encode(compose: &ComposeFile) -> Result<String> {
    compose.to_yaml().map_err(GenerateError::Serialize)
}

/// Writes the manifest to a file, replacing any previous content.
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    // sibling of the target so the final rename stays on one filesystem
    fn staging_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| OUTPUT_FILE.to_string());
        self.path.with_file_name(format!(".{}.tmp", name))
    }
}

impl ManifestSink for FileSink {
    fn write(&self, compose: &ComposeFile) -> Result<()> {
        let yaml = encode(compose)?;
        let output_error = |error: io::Error| GenerateError::Output {
            path: self.path.clone(),
            error,
        };

        let staging = self.staging_path();
        fs::write(&staging, yaml).map_err(output_error)?;
        if let Err(error) = fs::rename(&staging, &self.path) {
            let _ = fs::remove_file(&staging);
            return Err(output_error(error));
        }

        tracing::info!(path = %self.path.display(), "wrote manifest");
        Ok(())
    }

    // bare file name, as in the run report
    fn describe(&self) -> String {
        match self.path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => self.path.display().to_string(),
        }
    }
}

pub struct StdoutSink;

impl ManifestSink for StdoutSink {
    fn write(&self, compose: &ComposeFile) -> Result<()> {
        let yaml = encode(compose)?;
        io::stdout()
            .lock()
            .write_all(yaml.as_bytes())
            .map_err(|error| GenerateError::Output {
                path: PathBuf::from("<stdout>"),
                error,
            })
    }

    fn describe(&self) -> String {
        "<stdout>".to_string()
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub destination: String,
    pub instances: u32,
    pub forward_proxy: bool,
    pub monitoring: bool,
}

impl Summary {
    pub fn new(config: &Config, destination: String) -> Self {
        Self {
            destination,
            instances: config.instances,
            forward_proxy: config.forward_proxy,
            monitoring: config.monitoring,
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Successfully generated '{}' with {} firefox instance(s).",
            self.destination, self.instances
        )?;
        if self.forward_proxy {
            writeln!(f, "Upstream proxy via tinyproxy is ENABLED.")?;
        } else {
            writeln!(f, "Upstream proxy is DISABLED.")?;
        }
        if self.monitoring {
            write!(f, "Monitoring stack (Prometheus only) is ENABLED.")
        } else {
            write!(f, "Monitoring stack is DISABLED.")
        }
    }
}
