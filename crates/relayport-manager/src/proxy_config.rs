//! Proxy engine configuration document.
//!
//! Maps a service's listener settings and its upstream node onto the JSON
//! document the provisioned proxy process reads from `XRAY_CONFIG`: one
//! shadowsocks inbound, one SOCKS outbound to the node, and one rule routing
//! the former to the latter. Pure: no I/O, no validation beyond parsing the
//! cipher name.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::storage::Node;

/// Environment variable the proxy image reads its configuration from.
pub const CONFIG_ENV_VAR: &str = "XRAY_CONFIG";

pub const INBOUND_TAG: &str = "ss-in";
pub const OUTBOUND_TAG: &str = "proxy";

/// Shadowsocks AEAD ciphers the proxy engine accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CipherMethod {
    Aes128Gcm,
    #[default]
    Aes256Gcm,
    Chacha20Poly1305,
    XChacha20Poly1305,
    Blake3Aes128Gcm,
    Blake3Aes256Gcm,
    Blake3Chacha20Poly1305,
}

impl CipherMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Aes128Gcm => "aes-128-gcm",
            Self::Aes256Gcm => "aes-256-gcm",
            Self::Chacha20Poly1305 => "chacha20-poly1305",
            Self::XChacha20Poly1305 => "xchacha20-poly1305",
            Self::Blake3Aes128Gcm => "2022-blake3-aes-128-gcm",
            Self::Blake3Aes256Gcm => "2022-blake3-aes-256-gcm",
            Self::Blake3Chacha20Poly1305 => "2022-blake3-chacha20-poly1305",
        }
    }
}

impl fmt::Display for CipherMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported cipher method '{0}'")]
pub struct UnknownCipher(pub String);

impl FromStr for CipherMethod {
    type Err = UnknownCipher;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aes-128-gcm" => Ok(Self::Aes128Gcm),
            "aes-256-gcm" => Ok(Self::Aes256Gcm),
            "chacha20-poly1305" | "chacha20-ietf-poly1305" => Ok(Self::Chacha20Poly1305),
            "xchacha20-poly1305" | "xchacha20-ietf-poly1305" => Ok(Self::XChacha20Poly1305),
            "2022-blake3-aes-128-gcm" => Ok(Self::Blake3Aes128Gcm),
            "2022-blake3-aes-256-gcm" => Ok(Self::Blake3Aes256Gcm),
            "2022-blake3-chacha20-poly1305" => Ok(Self::Blake3Chacha20Poly1305),
            _ => Err(UnknownCipher(s.to_string())),
        }
    }
}

/// Listener side of a service.
#[derive(Debug, Clone, Copy)]
pub struct ListenerSettings<'a> {
    pub port: u16,
    pub password: &'a str,
    pub method: CipherMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub log: LogSettings,
    pub inbounds: Vec<Inbound>,
    pub outbounds: Vec<Outbound>,
    pub routing: Routing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSettings {
    pub loglevel: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inbound {
    pub port: u16,
    pub protocol: String,
    pub settings: ShadowsocksSettings,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowsocksSettings {
    pub method: String,
    pub password: String,
    /// `tcp,udp`: stream and datagram.
    pub network: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outbound {
    pub protocol: String,
    pub settings: SocksSettings,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocksSettings {
    pub servers: Vec<SocksServer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocksServer {
    pub address: String,
    pub port: i64,
    pub users: Vec<SocksUser>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocksUser {
    pub user: String,
    pub pass: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routing {
    pub rules: Vec<RoutingRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRule {
    #[serde(rename = "type")]
    pub rule_type: String,
    #[serde(rename = "inboundTag")]
    pub inbound_tag: Vec<String>,
    #[serde(rename = "outboundTag")]
    pub outbound_tag: String,
}

impl ProxyConfig {
    /// `XRAY_CONFIG=<json>` entry for the container environment.
    pub fn to_env_entry(&self) -> Result<String, serde_json::Error> {
        Ok(format!("{CONFIG_ENV_VAR}={}", serde_json::to_string(self)?))
    }
}

/// Build the configuration for a listener forwarding to `node`.
pub fn build_proxy_config(listener: &ListenerSettings<'_>, node: &Node) -> ProxyConfig {
    let users = node
        .credential()
        .map(|(user, pass)| {
            vec![SocksUser {
                user: user.to_string(),
                pass: pass.to_string(),
            }]
        })
        .unwrap_or_default();

    ProxyConfig {
        log: LogSettings {
            loglevel: "warning".to_string(),
        },
        inbounds: vec![Inbound {
            port: listener.port,
            protocol: "shadowsocks".to_string(),
            settings: ShadowsocksSettings {
                method: listener.method.as_str().to_string(),
                password: listener.password.to_string(),
                network: "tcp,udp".to_string(),
            },
            tag: INBOUND_TAG.to_string(),
        }],
        outbounds: vec![Outbound {
            protocol: "socks".to_string(),
            settings: SocksSettings {
                servers: vec![SocksServer {
                    address: node.host.clone(),
                    port: node.port,
                    users,
                }],
            },
            tag: OUTBOUND_TAG.to_string(),
        }],
        routing: Routing {
            rules: vec![RoutingRule {
                rule_type: "field".to_string(),
                inbound_tag: vec![INBOUND_TAG.to_string()],
                outbound_tag: OUTBOUND_TAG.to_string(),
            }],
        },
    }
}
