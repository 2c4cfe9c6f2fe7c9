//! Core `v1` kinds: ConfigMap, Secret and Service.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::meta::{ByteString, IntOrString};

// ============================================================================
// ConfigMap
// ============================================================================

/// ConfigMap payload: string and binary data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapBody {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub binary_data: BTreeMap<String, ByteString>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub immutable: Option<bool>,
}

impl ConfigMapBody {
    /// Adds a string entry.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// Secret
// ============================================================================

/// Secret payload. `stringData` is write-only: the store folds it into `data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretBody {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub secret_type: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, ByteString>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub string_data: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub immutable: Option<bool>,
}

impl SecretBody {
    /// Returns a copy with `stringData` folded into `data`, as the store persists it.
    /// `stringData` wins over `data` for the same key.
    pub fn with_string_data_merged(&self) -> Self {
        let mut merged = self.clone();
        for (key, value) in std::mem::take(&mut merged.string_data) {
            merged.data.insert(key, ByteString(value.into_bytes()));
        }
        merged
    }
}

// ============================================================================
// Service
// ============================================================================

/// Service payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceBody {
    #[serde(default)]
    pub spec: ServiceSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub selector: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ServicePort>,

    #[serde(default, rename = "clusterIP", skip_serializing_if = "Option::is_none")]
    pub cluster_ip: Option<String>,

    #[serde(default, rename = "clusterIPs", skip_serializing_if = "Vec::is_empty")]
    pub cluster_ips: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_affinity: Option<String>,

    /// Fields not modelled above, kept verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePort {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    pub port: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_port: Option<IntOrString>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_port: Option<i32>,

    /// `appProtocol` and anything newer.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ServiceBody {
    /// Drops cluster IPs the store allocated when the descriptor did not pin one.
    pub fn without_allocated_ips(&self, desired: &Self) -> Self {
        let mut body = self.clone();
        if desired.spec.cluster_ip.is_none() {
            body.spec.cluster_ip = None;
        }
        if desired.spec.cluster_ips.is_empty() {
            body.spec.cluster_ips.clear();
        }
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_map_binary_data() {
        let yaml = "data:\n  a: b\nbinaryData:\n  blob: AAEC\n";
        let body: ConfigMapBody = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(body.data["a"], "b");
        assert_eq!(body.binary_data["blob"].as_bytes(), &[0u8, 1, 2]);

        let out = serde_json::to_value(&body).unwrap();
        assert_eq!(out["binaryData"]["blob"], "AAEC");
        assert!(out.get("immutable").is_none());
    }

    #[test]
    fn test_secret_string_data_merge() {
        let yaml = "type: Opaque\ndata:\n  user: YWRtaW4=\n  pass: b2xk\nstringData:\n  pass: new\n";
        let body: SecretBody = serde_yaml::from_str(yaml).unwrap();
        let merged = body.with_string_data_merged();

        assert!(merged.string_data.is_empty());
        assert_eq!(merged.data["user"].as_bytes(), b"admin");
        assert_eq!(merged.data["pass"].as_bytes(), b"new");
    }

    #[test]
    fn test_service_spec_decode() {
        let yaml = r#"
spec:
  type: ClusterIP
  selector:
    app: web
  ports:
    - name: http
      port: 80
      targetPort: http
  externalTrafficPolicy: Local
"#;
        let body: ServiceBody = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(body.spec.service_type.as_deref(), Some("ClusterIP"));
        assert_eq!(body.spec.ports[0].port, 80);
        assert_eq!(
            body.spec.ports[0].target_port,
            Some(IntOrString::String("http".to_string()))
        );
        assert_eq!(
            body.spec.extra.get("externalTrafficPolicy"),
            Some(&serde_json::json!("Local"))
        );
    }

    #[test]
    fn test_service_port_keeps_app_protocol() {
        let yaml = "spec:\n  ports:\n    - port: 80\n      appProtocol: http\n";
        let body: ServiceBody = serde_yaml::from_str(yaml).unwrap();
        let port = &body.spec.ports[0];
        assert_eq!(port.port, 80);
        assert_eq!(port.extra["appProtocol"], serde_json::json!("http"));

        let out = serde_json::to_value(&body).unwrap();
        assert_eq!(out["spec"]["ports"][0]["appProtocol"], "http");
    }

    #[test]
    fn test_service_without_allocated_ips() {
        let desired = ServiceBody::default();
        let mut stored = ServiceBody::default();
        stored.spec.cluster_ip = Some("10.0.0.12".to_string());
        stored.spec.cluster_ips = vec!["10.0.0.12".to_string()];

        assert_eq!(stored.without_allocated_ips(&desired), desired);

        let mut pinned = ServiceBody::default();
        pinned.spec.cluster_ip = Some("None".to_string());
        let compared = stored.without_allocated_ips(&pinned);
        assert_eq!(compared.spec.cluster_ip.as_deref(), Some("10.0.0.12"));
    }
}
