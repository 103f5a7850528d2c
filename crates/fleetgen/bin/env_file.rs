use eyre::WrapErr;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

pub const ENV_FILE: &str = ".env";

pub fn default_path(dir: &Path) -> PathBuf {
    dir.join(ENV_FILE)
}

/// Variables read from a `.env` file.
///
/// The process environment is never modified; lookups consult the process
/// first and fall back to the file.
#[derive(Debug, Default)]
pub struct EnvFile {
    vars: HashMap<String, String>,
}

impl EnvFile {
    /// A missing file yields an empty set. Unreadable or malformed files are errors.
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let iter = match dotenvy::from_path_iter(path) {
            Ok(iter) => iter,
            Err(dotenvy::Error::Io(err)) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no env file");
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).wrap_err_with(|| format!("failed to load {}", path.display()));
            }
        };

        let vars = iter
            .collect::<Result<HashMap<_, _>, _>>()
            .wrap_err_with(|| format!("failed to parse {}", path.display()))?;

        tracing::info!(path = %path.display(), count = vars.len(), "loaded env file");
        Ok(Self { vars })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    pub fn lookup_with<F>(&self, process: F, key: &str) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        process(key).or_else(|| self.get(key))
    }
}
