// SPDX-License-Identifier: AGPL-3.0-only
//! TCP connection establishment: family-aware address resolution with an
//! optional local bind. No protocol knowledge lives here.

use crate::config::{ClientConfig, IpType};
use crate::error::{ClientError, Result};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::{TcpSocket, TcpStream, lookup_host};

pub(crate) struct Connection {
    pub stream: TcpStream,
    pub local_addr: SocketAddr,
}

pub(crate) async fn open(config: &ClientConfig) -> Result<Connection> {
    let bind = local_bind(config)?;
    let addrs = lookup_host((config.server_host.as_str(), config.server_port))
        .await
        .map_err(ClientError::Connect)?;

    let want_v4 = config.ip_type == IpType::V4;
    let mut last_err: Option<std::io::Error> = None;

    for addr in addrs.filter(|a| a.is_ipv4() == want_v4) {
        let socket = match config.ip_type {
            IpType::V4 => TcpSocket::new_v4(),
            IpType::V6 => TcpSocket::new_v6(),
        }
        .map_err(ClientError::Connect)?;
        if let Some(bind) = bind {
            socket.bind(bind).map_err(ClientError::Connect)?;
        }
        match socket.connect(addr).await {
            Ok(stream) => {
                let local_addr = stream.local_addr().map_err(ClientError::Connect)?;
                return Ok(Connection { stream, local_addr });
            }
            Err(err) => last_err = Some(err),
        }
    }

    Err(ClientError::Connect(last_err.unwrap_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            "no server address in the configured family",
        )
    })))
}

fn local_bind(config: &ClientConfig) -> Result<Option<SocketAddr>> {
    if config.local_host.is_none() && config.local_port.is_none() {
        return Ok(None);
    }
    let ip: IpAddr = match &config.local_host {
        Some(host) => host.parse().map_err(|_| {
            ClientError::InvalidConfig(format!("local_host \"{host}\" is not a literal IP address"))
        })?,
        None => match config.ip_type {
            IpType::V4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpType::V6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        },
    };
    let family_matches = match config.ip_type {
        IpType::V4 => ip.is_ipv4(),
        IpType::V6 => ip.is_ipv6(),
    };
    if !family_matches {
        return Err(ClientError::InvalidConfig(format!(
            "local_host \"{ip}\" does not match ip_type \"{}\"",
            config.ip_type.as_str()
        )));
    }
    Ok(Some(SocketAddr::new(ip, config.local_port.unwrap_or(0))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        ClientConfig {
            server_host: "127.0.0.1".to_string(),
            shared_secret: "12345678".to_string(),
            ..ClientConfig::default()
        }
    }

    #[test]
    fn no_bind_when_unconfigured() {
        assert!(local_bind(&config()).unwrap().is_none());
    }

    #[test]
    fn bind_port_only_uses_unspecified_host() {
        let mut cfg = config();
        cfg.local_port = Some(4500);
        let bind = local_bind(&cfg).unwrap().unwrap();
        assert_eq!(bind, "0.0.0.0:4500".parse().unwrap());
    }

    #[test]
    fn bind_host_only_uses_ephemeral_port() {
        let mut cfg = config();
        cfg.local_host = Some("127.0.0.1".to_string());
        let bind = local_bind(&cfg).unwrap().unwrap();
        assert_eq!(bind, "127.0.0.1:0".parse().unwrap());
    }

    #[test]
    fn bind_rejects_hostname() {
        let mut cfg = config();
        cfg.local_host = Some("localhost".to_string());
        assert!(matches!(
            local_bind(&cfg),
            Err(ClientError::InvalidConfig(_))
        ));
    }

    #[test]
    fn bind_rejects_family_mismatch() {
        let mut cfg = config();
        cfg.local_host = Some("::1".to_string());
        assert!(local_bind(&cfg).is_err());

        cfg.ip_type = IpType::V6;
        assert!(local_bind(&cfg).is_ok());
    }
}
