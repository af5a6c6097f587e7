//! CNI conflist document shapes.
//!
//! The field layout follows the `CniConfig`/`IpamConfig`/`IpRange`/`Route`
//! serde shapes used elsewhere in the container-runtime corpus; the
//! two-plugin (`bridge` + `loopback`) composition and default values are
//! this runtime's own.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const CNI_VERSION: &str = "0.4.0";
pub const DEFAULT_SUBNET: &str = "10.88.0.0/16";
pub const DEFAULT_BRIDGE: &str = "cni0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CniConflist {
    #[serde(rename = "cniVersion")]
    pub cni_version: String,
    pub name: String,
    pub plugins: Vec<PluginConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfig {
    #[serde(rename = "type")]
    pub plugin_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_gateway: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_masq: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipam: Option<IpamConfig>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpamConfig {
    #[serde(rename = "type")]
    pub ipam_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranges: Option<Vec<Vec<IpRange>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<Route>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpRange {
    pub subnet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub dst: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gw: Option<String>,
}

/// Compose the two-plugin conflist described for `create_network`.
pub fn bridge_conflist(name: &str, bridge_name: &str, subnet_cidr: &str) -> CniConflist {
    let bridge = PluginConfig {
        plugin_type: "bridge".into(),
        bridge: Some(bridge_name.to_string()),
        is_gateway: Some(true),
        ip_masq: Some(true),
        ipam: Some(IpamConfig {
            ipam_type: "host-local".into(),
            ranges: Some(vec![vec![IpRange {
                subnet: subnet_cidr.to_string(),
            }]]),
            routes: Some(vec![Route {
                dst: "0.0.0.0/0".into(),
                gw: None,
            }]),
        }),
        extra: HashMap::new(),
    };

    let loopback = PluginConfig {
        plugin_type: "loopback".into(),
        bridge: None,
        is_gateway: None,
        ip_masq: None,
        ipam: None,
        extra: HashMap::new(),
    };

    CniConflist {
        cni_version: CNI_VERSION.to_string(),
        name: name.to_string(),
        plugins: vec![bridge, loopback],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridge_conflist_shape() {
        let conflist = bridge_conflist("default", "cni0", DEFAULT_SUBNET);
        assert_eq!(conflist.cni_version, "0.4.0");
        assert_eq!(conflist.plugins.len(), 2);
        assert_eq!(conflist.plugins[0].plugin_type, "bridge");
        assert_eq!(conflist.plugins[1].plugin_type, "loopback");

        let ipam = conflist.plugins[0].ipam.as_ref().unwrap();
        assert_eq!(ipam.ipam_type, "host-local");
        assert_eq!(ipam.ranges.as_ref().unwrap()[0][0].subnet, DEFAULT_SUBNET);
    }

    #[test]
    fn round_trips_through_json() {
        let conflist = bridge_conflist("main", "br0", "10.1.0.0/24");
        let json = serde_json::to_string(&conflist).unwrap();
        let back: CniConflist = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, "main");
        assert_eq!(back.plugins[0].bridge.as_deref(), Some("br0"));
    }
}
