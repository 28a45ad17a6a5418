// SPDX-License-Identifier: AGPL-3.0-only
//! Error kinds surfaced to callers.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("client not initialized; call init() first")]
    NotInitialized,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to connect to TACACS+ server: {0}")]
    Connect(#[source] std::io::Error),

    /// The transport's loops have exited; nothing can be sent on it anymore.
    #[error("transport closed")]
    TransportClosed,

    #[error("timed out waiting for server reply")]
    Timeout,

    #[error("request cancelled")]
    Cancelled,

    #[error("session closed")]
    SessionClosed,

    #[error("protocol version mismatch: sent {sent:#04x}, received {received:#04x}")]
    VersionMismatch { sent: u8, received: u8 },

    #[error("server reply sequence number {received} does not match expected {expected}")]
    SeqMismatch { expected: u8, received: u8 },

    /// The per-session sequence counter hit 255; the exchange must restart
    /// in a fresh session.
    #[error("session sequence number exhausted; restart required")]
    SequenceOverflow,

    #[error("frame body of {0} bytes exceeds the 4096 byte limit")]
    FrameTooLarge(u32),

    #[error("frame with empty body")]
    EmptyFrame,

    #[error("server sent an unencrypted packet; plaintext is not supported")]
    UnencryptedRejected,

    #[error("server replied FAIL{}", fmt_server_msg(.0))]
    ServerFail(String),

    #[error("server replied ERROR{}", fmt_server_msg(.0))]
    ServerError(String),

    #[error("unsupported server reply: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Protocol(#[from] anyhow::Error),
}

fn fmt_server_msg(msg: &str) -> String {
    if msg.is_empty() {
        String::new()
    } else {
        format!(": {msg}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_replies_include_message_when_present() {
        let err = ClientError::ServerFail("bad password".to_string());
        assert_eq!(err.to_string(), "server replied FAIL: bad password");

        let err = ClientError::ServerFail(String::new());
        assert_eq!(err.to_string(), "server replied FAIL");
    }

    #[test]
    fn version_mismatch_formats_hex() {
        let err = ClientError::VersionMismatch {
            sent: 0xc0,
            received: 0xc1,
        };
        assert!(err.to_string().contains("0xc0"));
        assert!(err.to_string().contains("0xc1"));
    }

    #[test]
    fn protocol_errors_pass_through() {
        let err: ClientError = anyhow::anyhow!("authorization reply body too short").into();
        assert_eq!(err.to_string(), "authorization reply body too short");
    }
}
