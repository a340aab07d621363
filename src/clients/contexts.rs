use std::env;

use crate::config::Config;

const IN_CLUSTER_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
const IN_CLUSTER_CA_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

/// A named cluster-connection configuration resolved into one scan target.
#[derive(Debug, Clone)]
pub struct ClusterTarget {
    pub cluster: String,
    pub context: String,
    pub server: String,
    pub token: Option<String>,
    pub token_path: Option<String>,
    pub ca_cert_path: Option<String>,
    pub ca_cert_data: Option<String>,
    pub insecure_skip_tls_verify: bool,
}

/// Enumerate scan targets: the configured clusters, or a single synthetic
/// in-cluster entry when none are configured.
pub fn resolve_targets(cfg: &Config) -> Vec<ClusterTarget> {
    if !cfg.clusters.is_empty() {
        return cfg
            .clusters
            .iter()
            .map(|c| ClusterTarget {
                cluster: c.name.clone(),
                context: c.context.clone().unwrap_or_else(|| c.name.clone()),
                server: c.server.clone(),
                token: c.token.clone(),
                token_path: c.token_path.clone(),
                ca_cert_path: c.ca_cert_path.clone(),
                ca_cert_data: c.ca_cert_data.clone(),
                insecure_skip_tls_verify: c.insecure_skip_tls_verify,
            })
            .collect();
    }
    vec![in_cluster_target(&cfg.cluster_name)]
}

/// The target a pod uses to reach its own API server: service environment
/// variables plus the mounted service-account credentials.
fn in_cluster_target(default_cluster_name: &str) -> ClusterTarget {
    let host = env::var("KUBERNETES_SERVICE_HOST")
        .unwrap_or_else(|_| "kubernetes.default.svc".to_string());
    let port = env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());
    let cluster =
        env::var("K8S_CLUSTER_NAME").unwrap_or_else(|_| default_cluster_name.to_string());

    ClusterTarget {
        cluster,
        context: "in-cluster".to_string(),
        server: format!("https://{host}:{port}"),
        token: None,
        token_path: Some(IN_CLUSTER_TOKEN_PATH.to_string()),
        ca_cert_path: Some(IN_CLUSTER_CA_PATH.to_string()),
        ca_cert_data: None,
        insecure_skip_tls_verify: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClusterDef;

    fn base_config() -> Config {
        serde_yaml::from_str("{}").expect("empty config parses")
    }

    #[test]
    fn configured_clusters_become_targets() {
        let mut cfg = base_config();
        cfg.clusters = vec![ClusterDef {
            name: "prod-east".to_string(),
            context: Some("prod-east-admin".to_string()),
            server: "https://10.0.0.1:6443".to_string(),
            token: Some("secret".to_string()),
            token_path: None,
            ca_cert_path: None,
            ca_cert_data: None,
            insecure_skip_tls_verify: false,
        }];

        let targets = resolve_targets(&cfg);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].cluster, "prod-east");
        assert_eq!(targets[0].context, "prod-east-admin");
    }

    #[test]
    fn context_defaults_to_cluster_name() {
        let mut cfg = base_config();
        cfg.clusters = vec![ClusterDef {
            name: "staging".to_string(),
            context: None,
            server: "https://10.0.0.2:6443".to_string(),
            token: None,
            token_path: None,
            ca_cert_path: None,
            ca_cert_data: None,
            insecure_skip_tls_verify: true,
        }];

        let targets = resolve_targets(&cfg);
        assert_eq!(targets[0].context, "staging");
    }

    #[test]
    fn empty_cluster_list_falls_back_to_in_cluster() {
        let cfg = base_config();
        let targets = resolve_targets(&cfg);

        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].context, "in-cluster");
        assert!(targets[0].server.starts_with("https://"));
        assert_eq!(
            targets[0].token_path.as_deref(),
            Some(IN_CLUSTER_TOKEN_PATH)
        );
    }
}
