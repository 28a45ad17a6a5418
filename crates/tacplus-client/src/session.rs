// SPDX-License-Identifier: AGPL-3.0-only
//! Per-exchange session state: sequence discipline, the inbound mailbox,
//! the sanity check every server reply must pass, and lifecycle.

use crate::error::{ClientError, Result};
use crate::transport::{SessionTable, Transport};
use anyhow::anyhow;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tacplus_proto::{FLAG_SINGLE_CONNECT, FLAG_UNENCRYPTED, HEADER_LEN, Header, seal_packet};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Clients send odd sequence numbers starting at 1; the counter must never
/// wrap, so 255 forces a session restart.
#[derive(Debug)]
struct SeqState {
    next_client: u8,
    expect_reply: Option<u8>,
}

impl SeqState {
    fn new() -> SeqState {
        SeqState {
            next_client: 1,
            expect_reply: None,
        }
    }

    fn next_send(&mut self) -> Result<u8> {
        if self.next_client == u8::MAX {
            return Err(ClientError::SequenceOverflow);
        }
        let seq_no = self.next_client;
        self.next_client += 2;
        self.expect_reply = Some(seq_no.wrapping_add(1));
        Ok(seq_no)
    }

    fn check_reply(&mut self, seq_no: u8) -> Result<()> {
        let expected = self
            .expect_reply
            .take()
            .ok_or_else(|| ClientError::Protocol(anyhow!("server reply with no request pending")))?;
        if seq_no != expected {
            return Err(ClientError::SeqMismatch {
                expected,
                received: seq_no,
            });
        }
        Ok(())
    }
}

/// One logically isolated request/response exchange, multiplexed onto a
/// transport by its random 32-bit id.
#[derive(Debug)]
pub struct Session {
    id: u32,
    user: String,
    password: Option<String>,
    shared_secret: String,
    version: AtomicU8,
    advertise_single_connect: bool,
    timeout: Duration,
    seq: StdMutex<SeqState>,
    mailbox: Mutex<mpsc::Receiver<Vec<u8>>>,
    cancel: CancellationToken,
    transport: Arc<Transport>,
    transport_shared: bool,
    sessions: SessionTable,
    closed: AtomicBool,
}

impl Session {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: u32,
        user: &str,
        password: Option<&str>,
        shared_secret: &str,
        advertise_single_connect: bool,
        timeout: Duration,
        mailbox: mpsc::Receiver<Vec<u8>>,
        cancel: CancellationToken,
        transport: Arc<Transport>,
        transport_shared: bool,
        sessions: SessionTable,
    ) -> Session {
        Session {
            id,
            user: user.to_string(),
            password: password.map(str::to_string),
            shared_secret: shared_secret.to_string(),
            version: AtomicU8::new(tacplus_proto::VERSION_DEFAULT),
            advertise_single_connect,
            timeout,
            seq: StdMutex::new(SeqState::new()),
            mailbox: Mutex::new(mailbox),
            cancel,
            transport,
            transport_shared,
            sessions,
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub(crate) fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub(crate) fn set_version(&self, version: u8) {
        self.version.store(version, Ordering::SeqCst);
    }

    pub(crate) fn version(&self) -> u8 {
        self.version.load(Ordering::SeqCst)
    }

    /// Local endpoint split for the START/REQUEST `port` and `rem_addr`
    /// fields: lowercase hex port, textual IP address.
    pub(crate) fn local_endpoint(&self) -> (String, String) {
        let addr = self.transport.local_addr();
        (format!("{:x}", addr.port()), addr.ip().to_string())
    }

    /// Marshal a request body into a complete obfuscated frame carrying
    /// this session's id, version and next client sequence number.
    pub(crate) fn seal(&self, packet_type: u8, body: Vec<u8>) -> Result<Vec<u8>> {
        let seq_no = self
            .seq
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next_send()?;
        let mut flags = 0u8;
        if self.advertise_single_connect {
            flags |= FLAG_SINGLE_CONNECT;
        }
        let header = Header {
            version: self.version(),
            packet_type,
            seq_no,
            flags,
            session_id: self.id,
            length: 0,
        };
        seal_packet(&header, body, self.shared_secret.as_bytes()).map_err(ClientError::Protocol)
    }

    /// Enqueue an outbound frame on the owning transport.
    pub async fn submit(&self, frame: Vec<u8>) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::SessionClosed);
        }
        self.transport.submit(frame).await
    }

    /// Wait for the next inbound frame, racing the per-session timeout and
    /// the manager's cancellation signal.
    pub async fn await_reply(&self) -> Result<Vec<u8>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::SessionClosed);
        }
        let mut mailbox = self.mailbox.lock().await;
        tokio::select! {
            frame = mailbox.recv() => frame.ok_or(ClientError::SessionClosed),
            _ = tokio::time::sleep(self.timeout) => Err(ClientError::Timeout),
            _ = self.cancel.cancelled() => Err(ClientError::Cancelled),
        }
    }

    /// The sanity check every inbound frame must pass before its body is
    /// handed to a flow: declared length against the frame actually read,
    /// no plaintext, the version this session sent, the expected sequence
    /// number. Returns the deobfuscated body.
    pub(crate) fn verify_reply(&self, frame: &[u8]) -> Result<(Header, Vec<u8>)> {
        let header = Header::parse(frame).map_err(ClientError::Protocol)?;
        if frame.len() != HEADER_LEN + header.length as usize {
            return Err(ClientError::Protocol(anyhow!(
                "frame of {} bytes does not match declared body length {}",
                frame.len(),
                header.length
            )));
        }
        if header.flags & FLAG_UNENCRYPTED != 0 {
            return Err(ClientError::UnencryptedRejected);
        }
        let sent = self.version();
        if header.version != sent {
            return Err(ClientError::VersionMismatch {
                sent,
                received: header.version,
            });
        }
        self.seq
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .check_reply(header.seq_no)?;

        let mut body = frame[HEADER_LEN..].to_vec();
        tacplus_proto::open_body(&header, &mut body, self.shared_secret.as_bytes())
            .map_err(ClientError::Protocol)?;
        Ok((header, body))
    }

    /// Deregister from the manager and, when this session exclusively owns
    /// its transport, shut the transport down. Shared transports stay open
    /// for their remaining holders; the manager closes them at exit.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.sessions.remove(&self.id);
        self.cancel.cancel();
        if !self.transport_shared {
            self.transport.close().await;
        }
        debug!(session_id = self.id, "session closed");
    }
}
