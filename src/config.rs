use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_cluster_name")]
    pub cluster_name: String,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,
    #[serde(default = "default_pending_threshold_minutes")]
    pub pending_threshold_minutes: i64,
    #[serde(default = "default_api_timeout_secs")]
    pub api_timeout_secs: u64,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub diff_strategy: DiffStrategyKind,
    #[serde(default)]
    pub clusters: Vec<ClusterDef>,
}

/// One statically configured cluster. When the list is empty the service
/// falls back to a single synthetic in-cluster target.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterDef {
    pub name: String,
    #[serde(default)]
    pub context: Option<String>,
    pub server: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub token_path: Option<String>,
    #[serde(default)]
    pub ca_cert_path: Option<String>,
    #[serde(default)]
    pub ca_cert_data: Option<String>,
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,
}

/// Which key-partition strategy the diff engine is constructed with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffStrategyKind {
    #[default]
    Hash,
    Sorted,
}

fn default_cluster_name() -> String {
    "in-cluster".to_string()
}

fn default_listen_port() -> u16 {
    5000
}

fn default_scan_interval_secs() -> u64 {
    600
}

fn default_pending_threshold_minutes() -> i64 {
    10
}

fn default_api_timeout_secs() -> u64 {
    60
}

fn default_data_dir() -> String {
    "data".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| format!("reading config {}: {}", path.display(), e))?;
        let cfg: Config =
            serde_yaml::from_str(&data).map_err(|e| format!("parsing config: {}", e))?;
        Ok(cfg)
    }

    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.listen_port)
    }

    pub fn scan_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.scan_interval_secs)
    }

    pub fn api_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.api_timeout_secs)
    }

    pub fn pending_threshold(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.pending_threshold_minutes)
    }
}
