// SPDX-License-Identifier: AGPL-3.0-only
//! Async TACACS+ client (IETF opsawg draft lineage).
//!
//! Sessions are logically isolated exchanges identified by a random 32-bit
//! id; many sessions can multiplex over one TCP connection when
//! `connection_multiplexing` is enabled and the server plays along. Packet
//! bodies ride the wire obfuscated with the shared secret; plaintext
//! packets are refused in both directions.
//!
//! Lifecycle: [`init`], [`set_config`], then any number of
//! [`authen_ascii`] / [`authen_pap`] calls or [`new_session`] +
//! [`author`] / [`account`] exchanges, then [`exit`].
//!
//! ```no_run
//! use std::time::Duration;
//! use tacplus_client as tacplus;
//!
//! # async fn demo() -> tacplus::Result<()> {
//! tacplus::init();
//! tacplus::set_config(tacplus::ClientConfig {
//!     server_host: "192.0.2.7".into(),
//!     shared_secret: "12345678".into(),
//!     ..Default::default()
//! })?;
//! tacplus::authen_ascii(Duration::from_secs(10), "mason", "0000").await?;
//! tacplus::exit().await;
//! # Ok(())
//! # }
//! ```

mod account;
mod authen;
mod author;
mod config;
mod conn;
mod error;
mod manager;
mod session;
mod transport;

pub use account::{AcctTask, account};
pub use authen::{authen_ascii, authen_pap};
pub use author::{AuthorOutcome, author};
pub use config::{ClientConfig, DEFAULT_SERVER_PORT, IpType};
pub use error::{ClientError, Result};
pub use manager::{exit, get_config, init, new_session, server_supports_multiplexing, set_config};
pub use session::Session;

/// Wire-level constants and packet types, re-exported for callers that
/// build authorization and accounting requests.
pub use tacplus_proto as proto;
