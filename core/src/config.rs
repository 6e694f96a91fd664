use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CoreError, Result};

/// Which backend the driver layer talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterMode {
    Container,
    Cluster,
}

impl Default for ClusterMode {
    fn default() -> Self {
        ClusterMode::Container
    }
}

/// Top-level configuration, loadable from a YAML file and overridable by
/// environment variables (env wins).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub container: ContainerConfig,
    #[serde(default)]
    pub file: FileConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub labels: LabelsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default)]
    pub mode: ClusterMode,
    /// Idle duration before a running box is stopped.
    #[serde(default = "ClusterConfig::default_stop_threshold_secs")]
    pub reclaim_stop_threshold_secs: u64,
    /// Idle duration before a box is deleted outright.
    #[serde(default = "ClusterConfig::default_delete_threshold_secs")]
    pub reclaim_delete_threshold_secs: u64,
    /// Reclamation sweep interval.
    #[serde(default = "ClusterConfig::default_interval_secs")]
    pub reclaim_interval_secs: u64,
    /// Kubernetes namespace, used only when `mode = cluster`.
    #[serde(default = "ClusterConfig::default_namespace")]
    pub namespace: String,
    /// Path to a kubeconfig file, used only when `mode = cluster`.
    #[serde(default)]
    pub cfg: Option<String>,
}

impl ClusterConfig {
    fn default_stop_threshold_secs() -> u64 {
        30 * 60
    }
    fn default_delete_threshold_secs() -> u64 {
        24 * 60 * 60
    }
    fn default_interval_secs() -> u64 {
        10 * 60
    }
    fn default_namespace() -> String {
        "default".to_string()
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            mode: ClusterMode::default(),
            reclaim_stop_threshold_secs: Self::default_stop_threshold_secs(),
            reclaim_delete_threshold_secs: Self::default_delete_threshold_secs(),
            reclaim_interval_secs: Self::default_interval_secs(),
            namespace: Self::default_namespace(),
            cfg: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Docker engine endpoint, e.g. `unix:///var/run/docker.sock`.
    #[serde(default)]
    pub host: Option<String>,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self { host: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default = "FileConfig::default_home")]
    pub home: String,
    #[serde(default = "FileConfig::default_share")]
    pub share: String,
    #[serde(default = "FileConfig::default_share")]
    pub host_share: String,
}

impl FileConfig {
    fn default_home() -> String {
        "/home/gbox".to_string()
    }
    fn default_share() -> String {
        "/var/lib/gbox/share".to_string()
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            home: Self::default_home(),
            share: Self::default_share(),
            host_share: Self::default_share(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "BrowserConfig::default_host")]
    pub host: String,
    #[serde(default = "BrowserConfig::default_internal_port")]
    pub internal_port: u16,
}

impl BrowserConfig {
    fn default_host() -> String {
        "127.0.0.1".to_string()
    }
    fn default_internal_port() -> u16 {
        9222
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            internal_port: Self::default_internal_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
}

impl ServerConfig {
    fn default_port() -> u16 {
        28080
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: Self::default_port() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelsConfig {
    #[serde(default = "LabelsConfig::default_prefix")]
    pub prefix: String,
}

impl LabelsConfig {
    fn default_prefix() -> String {
        "dev.gbox".to_string()
    }
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self { prefix: Self::default_prefix() }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cluster: ClusterConfig::default(),
            container: ContainerConfig::default(),
            file: FileConfig::default(),
            browser: BrowserConfig::default(),
            server: ServerConfig::default(),
            labels: LabelsConfig::default(),
        }
    }
}

impl Config {
    /// Load a base configuration from a YAML file, falling back to
    /// defaults for any field the file omits.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&contents)?;
        Ok(cfg)
    }

    /// Apply `GBOX_*` environment variable overrides on top of a base
    /// configuration. Unset variables leave the existing value untouched.
    pub fn apply_env_overrides(mut self) -> Result<Self> {
        if let Ok(v) = std::env::var("GBOX_CLUSTER_MODE") {
            self.cluster.mode = match v.as_str() {
                "container" => ClusterMode::Container,
                "cluster" => ClusterMode::Cluster,
                other => {
                    return Err(CoreError::Config(format!(
                        "invalid GBOX_CLUSTER_MODE: {other}"
                    )))
                }
            };
        }
        if let Ok(v) = std::env::var("GBOX_CONTAINER_HOST") {
            self.container.host = Some(v);
        }
        if let Ok(v) = std::env::var("GBOX_SERVER_PORT") {
            self.server.port = v
                .parse()
                .map_err(|_| CoreError::Config(format!("invalid GBOX_SERVER_PORT: {v}")))?;
        }
        if let Ok(v) = std::env::var("GBOX_LABELS_PREFIX") {
            self.labels.prefix = v;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::default();
        assert_eq!(cfg.cluster.mode, ClusterMode::Container);
        assert_eq!(cfg.server.port, 28080);
        assert_eq!(cfg.cluster.reclaim_stop_threshold_secs, 1800);
        assert_eq!(cfg.cluster.reclaim_delete_threshold_secs, 86400);
    }

    #[test]
    fn env_override_changes_port() {
        std::env::set_var("GBOX_SERVER_PORT", "9000");
        let cfg = Config::default().apply_env_overrides().unwrap();
        assert_eq!(cfg.server.port, 9000);
        std::env::remove_var("GBOX_SERVER_PORT");
    }

    #[test]
    fn invalid_cluster_mode_env_errors() {
        std::env::set_var("GBOX_CLUSTER_MODE", "bogus");
        let err = Config::default().apply_env_overrides().unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
        std::env::remove_var("GBOX_CLUSTER_MODE");
    }

    #[test]
    fn from_file_parses_fully_specified_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gbox.yaml");
        std::fs::write(
            &path,
            "cluster:\n  mode: cluster\n  reclaim_stop_threshold_secs: 60\n  reclaim_delete_threshold_secs: 120\n  reclaim_interval_secs: 30\n  namespace: gbox\n  cfg: null\ncontainer:\n  host: null\nfile:\n  home: /home/gbox\n  share: /share\n  host_share: /share\nbrowser:\n  host: 127.0.0.1\n  internal_port: 9222\nserver:\n  port: 8080\nlabels:\n  prefix: dev.gbox\n",
        )
        .unwrap();

        let cfg = Config::from_file(&path).unwrap();
        assert_eq!(cfg.cluster.mode, ClusterMode::Cluster);
        assert_eq!(cfg.server.port, 8080);
    }

    #[test]
    fn from_file_fills_in_omitted_sections_and_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gbox.yaml");
        // Omits `container`, `file`, `browser`, `labels` entirely, and
        // omits most fields of `cluster`/`server`.
        std::fs::write(&path, "cluster:\n  mode: cluster\nserver:\n  port: 9001\n").unwrap();

        let cfg = Config::from_file(&path).unwrap();
        assert_eq!(cfg.cluster.mode, ClusterMode::Cluster);
        assert_eq!(cfg.cluster.reclaim_stop_threshold_secs, 1800);
        assert_eq!(cfg.cluster.namespace, "default");
        assert_eq!(cfg.server.port, 9001);
        assert_eq!(cfg.container.host, None);
        assert_eq!(cfg.browser.internal_port, 9222);
        assert_eq!(cfg.labels.prefix, "dev.gbox");
    }

    #[test]
    fn from_file_parses_empty_yaml_as_all_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gbox.yaml");
        std::fs::write(&path, "{}\n").unwrap();

        let cfg = Config::from_file(&path).unwrap();
        let default = Config::default();
        assert_eq!(cfg.cluster.mode, default.cluster.mode);
        assert_eq!(cfg.server.port, default.server.port);
        assert_eq!(cfg.labels.prefix, default.labels.prefix);
    }
}
