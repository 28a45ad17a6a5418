// SPDX-License-Identifier: AGPL-3.0-only
//! Client configuration.

use crate::error::{ClientError, Result};
use std::str::FromStr;

/// IANA-assigned TACACS+ port.
pub const DEFAULT_SERVER_PORT: u16 = 49;

/// Address family the client resolves and binds within.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IpType {
    #[default]
    V4,
    V6,
}

impl IpType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IpType::V4 => "ip4",
            IpType::V6 => "ip6",
        }
    }
}

impl FromStr for IpType {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<IpType> {
        match s {
            "ip4" => Ok(IpType::V4),
            "ip6" => Ok(IpType::V6),
            other => Err(ClientError::InvalidConfig(format!(
                "ip_type must be \"ip4\" or \"ip6\", got \"{other}\""
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub ip_type: IpType,
    pub server_host: String,
    /// Defaults to 49.
    pub server_port: u16,
    /// Local address to bind before connecting; unbound when `None`.
    pub local_host: Option<String>,
    /// Local port to bind; ephemeral when `None`.
    pub local_port: Option<u16>,
    /// Ask the server to multiplex sessions over one TCP connection.
    pub connection_multiplexing: bool,
    /// ASCII shared secret keying the body obfuscation.
    pub shared_secret: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            ip_type: IpType::default(),
            server_host: String::new(),
            server_port: DEFAULT_SERVER_PORT,
            local_host: None,
            local_port: None,
            connection_multiplexing: false,
            shared_secret: String::new(),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if self.server_host.is_empty() {
            return Err(ClientError::InvalidConfig("server_host is empty".into()));
        }
        if self.server_port == 0 {
            return Err(ClientError::InvalidConfig("server_port is zero".into()));
        }
        if self.shared_secret.is_empty() {
            return Err(ClientError::InvalidConfig("shared_secret is empty".into()));
        }
        if !self.shared_secret.is_ascii() {
            return Err(ClientError::InvalidConfig(
                "shared_secret must be ASCII".into(),
            ));
        }
        Ok(())
    }
}
