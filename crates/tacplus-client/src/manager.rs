// SPDX-License-Identifier: AGPL-3.0-only
//! Process-wide manager: session registry, shared transport and the
//! connection multiplexing policy.

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::session::Session;
use crate::transport::{MAILBOX_CAPACITY, SessionTable, Transport};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

static MANAGER: RwLock<Option<Arc<Manager>>> = RwLock::new(None);

pub(crate) struct Manager {
    sessions: SessionTable,
    shared: RwLock<Shared>,
    /// Latched true when any inbound frame carries the single-connect
    /// flag. Diagnostic only; attachment decisions use the client config.
    single_connect_seen: Arc<AtomicBool>,
    root_cancel: CancellationToken,
}

struct Shared {
    config: ClientConfig,
    transport: Option<Arc<Transport>>,
}

impl Manager {
    fn new() -> Manager {
        Manager {
            sessions: Arc::new(DashMap::new()),
            shared: RwLock::new(Shared {
                config: ClientConfig::default(),
                transport: None,
            }),
            single_connect_seen: Arc::new(AtomicBool::new(false)),
            root_cancel: CancellationToken::new(),
        }
    }

    fn config(&self) -> ClientConfig {
        self.shared
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .config
            .clone()
    }

    async fn new_session(
        &self,
        timeout: Duration,
        user: &str,
        password: Option<&str>,
    ) -> Result<Arc<Session>> {
        let config = self.config();
        config.validate()?;

        let (transport, transport_shared) = self.attach_transport(&config).await?;

        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let id = loop {
            let id = random_session_id()?;
            match self.sessions.entry(id) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    slot.insert(tx.clone());
                    break id;
                }
            }
        };
        debug!(session_id = id, user, "session registered");

        Ok(Arc::new(Session::new(
            id,
            user,
            password,
            &config.shared_secret,
            config.connection_multiplexing,
            timeout,
            rx,
            self.root_cancel.child_token(),
            transport,
            transport_shared,
            self.sessions.clone(),
        )))
    }

    /// Attach-or-create: reuse the live shared transport when the client
    /// wants multiplexing, otherwise open a fresh connection. The first
    /// multiplexed session installs its transport as the shared one.
    async fn attach_transport(&self, config: &ClientConfig) -> Result<(Arc<Transport>, bool)> {
        if !config.connection_multiplexing {
            let transport = Transport::open(
                config,
                self.sessions.clone(),
                self.single_connect_seen.clone(),
            )
            .await?;
            return Ok((transport, false));
        }

        let existing = {
            let shared = self.shared.read().unwrap_or_else(PoisonError::into_inner);
            shared.transport.clone()
        };
        if let Some(transport) = existing {
            if !transport.is_closed() {
                return Ok((transport, true));
            }
        }

        let fresh = Transport::open(
            config,
            self.sessions.clone(),
            self.single_connect_seen.clone(),
        )
        .await?;

        // Two sessions may race to install; the first writer wins and the
        // loser's connection is torn down again.
        let raced = {
            let mut shared = self.shared.write().unwrap_or_else(PoisonError::into_inner);
            match &shared.transport {
                Some(existing) if !existing.is_closed() => Some(existing.clone()),
                _ => {
                    shared.transport = Some(fresh.clone());
                    None
                }
            }
        };
        match raced {
            Some(winner) => {
                fresh.close().await;
                Ok((winner, true))
            }
            None => Ok((fresh, true)),
        }
    }
}

fn random_session_id() -> Result<u32> {
    let mut buf = [0u8; 4];
    openssl::rand::rand_bytes(&mut buf)
        .map_err(|err| ClientError::Protocol(anyhow::anyhow!("session id rng failure: {err}")))?;
    Ok(u32::from_be_bytes(buf))
}

fn manager() -> Result<Arc<Manager>> {
    MANAGER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .ok_or(ClientError::NotInitialized)
}

/// Install the client singleton. Calling again is harmless.
pub fn init() {
    let mut slot = MANAGER.write().unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() {
        debug!("tacplus client already initialized");
        return;
    }
    *slot = Some(Arc::new(Manager::new()));
    info!("tacplus client initialized");
}

pub fn set_config(config: ClientConfig) -> Result<()> {
    config.validate()?;
    let mgr = manager()?;
    let mut shared = mgr.shared.write().unwrap_or_else(PoisonError::into_inner);
    shared.config = config;
    Ok(())
}

pub fn get_config() -> Result<ClientConfig> {
    Ok(manager()?.config())
}

/// Whether any inbound frame so far advertised single-connect support.
pub fn server_supports_multiplexing() -> Result<bool> {
    Ok(manager()?.single_connect_seen.load(Ordering::SeqCst))
}

/// Register a new session for `user`, reusing or opening a transport per
/// the multiplexing policy.
pub async fn new_session(
    timeout: Duration,
    user: &str,
    password: Option<&str>,
) -> Result<Arc<Session>> {
    manager()?.new_session(timeout, user, password).await
}

/// Tear the client down: cancel in-flight flows, drop every registered
/// session and close the shared transport.
pub async fn exit() {
    let taken = {
        MANAGER
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    };
    let Some(mgr) = taken else {
        debug!("tacplus client was not initialized");
        return;
    };
    mgr.root_cancel.cancel();
    mgr.sessions.clear();
    let transport = {
        let mut shared = mgr.shared.write().unwrap_or_else(PoisonError::into_inner);
        shared.transport.take()
    };
    if let Some(transport) = transport {
        transport.close().await;
    }
    info!("tacplus client shut down");
}
