use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Store location and scan tuning.
///
/// Passed explicitly to [`crate::store::RecordStore::new`]: two stores built
/// from two configs never share state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_root")]
    pub root: String,
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_root() -> String {
    Config::config_dir().to_string_lossy().to_string()
}
fn default_extension() -> String {
    "rec".to_string()
}
fn default_workers() -> usize {
    32
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: default_root(),
            workspace: None,
            extension: default_extension(),
            workers: default_workers(),
        }
    }
}

impl Config {
    /// Config rooted at `root`, everything else at its default.
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_string_lossy().to_string(),
            ..Self::default()
        }
    }

    /// Return the standard data directory (`~/.rtimetrace`)
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".rtimetrace")
    }

    pub fn from_yaml_str(content: &str) -> AppResult<Self> {
        let cfg: Config =
            serde_yaml::from_str(content).map_err(|e| AppError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn to_yaml_string(&self) -> AppResult<String> {
        serde_yaml::to_string(self).map_err(|e| AppError::Config(e.to_string()))
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.workers == 0 {
            return Err(AppError::Config("workers must be at least 1".into()));
        }
        let ext = self.extension.trim_start_matches('.');
        if ext.is_empty() || ext.contains(['/', '\\']) {
            return Err(AppError::Config(format!(
                "invalid record extension '{}'",
                self.extension
            )));
        }
        if let Some(ws) = &self.workspace
            && (ws.is_empty() || ws.contains(['/', '\\']) || ws == "..")
        {
            return Err(AppError::Config(format!("invalid workspace name '{}'", ws)));
        }
        Ok(())
    }

    /// Root with a leading `~/` expanded.
    pub fn root_dir(&self) -> PathBuf {
        expand_tilde(&self.root)
    }

    /// `<root>[/<workspace>]/records`
    pub fn records_dir(&self) -> PathBuf {
        let mut dir = self.root_dir();
        if let Some(ws) = &self.workspace {
            dir.push(ws);
        }
        dir.join("records")
    }

    /// Extension without the leading dot.
    pub fn record_extension(&self) -> &str {
        self.extension.trim_start_matches('.')
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}
