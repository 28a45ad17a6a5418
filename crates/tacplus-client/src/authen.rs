// SPDX-License-Identifier: AGPL-3.0-only
//! Authentication flows: interactive ASCII login and single-exchange PAP.

use crate::error::{ClientError, Result};
use crate::manager::new_session;
use crate::session::Session;
use std::time::Duration;
use tacplus_proto::{
    AUTHEN_ACTION_LOGIN, AUTHEN_SERVICE_LOGIN, AUTHEN_STATUS_ERROR, AUTHEN_STATUS_FAIL,
    AUTHEN_STATUS_FOLLOW, AUTHEN_STATUS_GETDATA, AUTHEN_STATUS_GETPASS, AUTHEN_STATUS_GETUSER,
    AUTHEN_STATUS_PASS, AUTHEN_STATUS_RESTART, AUTHEN_TYPE_ASCII, AUTHEN_TYPE_PAP, AuthenContinue,
    AuthenReply, AuthenStart, PRIV_LVL_ROOT, TYPE_AUTHEN, VERSION_DEFAULT, VERSION_ONE,
};
use tracing::debug;

/// ASCII login: send a START carrying the username, answer a GETPASS
/// prompt with the password in a CONTINUE, and accept the terminal status.
pub async fn authen_ascii(timeout: Duration, user: &str, password: &str) -> Result<()> {
    let session = new_session(timeout, user, Some(password)).await?;
    let outcome = ascii_exchange(&session).await;
    session.close().await;
    outcome
}

async fn ascii_exchange(session: &Session) -> Result<()> {
    session.set_version(VERSION_DEFAULT);
    let (port, rem_addr) = session.local_endpoint();
    let start = AuthenStart::new(
        AUTHEN_ACTION_LOGIN,
        PRIV_LVL_ROOT,
        AUTHEN_TYPE_ASCII,
        AUTHEN_SERVICE_LOGIN,
    )
    .with_user(session.user().as_bytes().to_vec())
    .with_port(port)
    .with_rem_addr(rem_addr);
    let frame = session.seal(TYPE_AUTHEN, start.encode_body()?)?;
    session.submit(frame).await?;

    loop {
        let raw = session.await_reply().await?;
        let (_header, body) = session.verify_reply(&raw)?;
        let reply = AuthenReply::parse(&body)?;
        match reply.status {
            AUTHEN_STATUS_PASS => {
                debug!(user = session.user(), "authentication passed");
                return Ok(());
            }
            AUTHEN_STATUS_FAIL => return Err(ClientError::ServerFail(reply.server_msg)),
            AUTHEN_STATUS_GETPASS => {
                let cont = AuthenContinue::new()
                    .with_user_msg(session.password().unwrap_or("").as_bytes().to_vec());
                let frame = session.seal(TYPE_AUTHEN, cont.encode_body()?)?;
                session.submit(frame).await?;
            }
            AUTHEN_STATUS_ERROR => return Err(ClientError::ServerError(reply.server_msg)),
            AUTHEN_STATUS_GETUSER => {
                return Err(ClientError::Unsupported(
                    "authentication GETUSER prompt".into(),
                ));
            }
            AUTHEN_STATUS_GETDATA => {
                return Err(ClientError::Unsupported(
                    "authentication GETDATA prompt".into(),
                ));
            }
            AUTHEN_STATUS_RESTART => {
                return Err(ClientError::Unsupported("authentication RESTART".into()));
            }
            AUTHEN_STATUS_FOLLOW => {
                return Err(ClientError::Unsupported(
                    "authentication FOLLOW redirect".into(),
                ));
            }
            other => {
                return Err(ClientError::Unsupported(format!(
                    "unrecognized authentication status {other:#04x}"
                )));
            }
        }
    }
}

/// PAP login: one START with the password in the data field, exactly one
/// reply. The protocol forbids further prompts in a PAP exchange.
pub async fn authen_pap(timeout: Duration, user: &str, password: &str) -> Result<()> {
    let session = new_session(timeout, user, Some(password)).await?;
    let outcome = pap_exchange(&session).await;
    session.close().await;
    outcome
}

async fn pap_exchange(session: &Session) -> Result<()> {
    session.set_version(VERSION_ONE);
    let (port, rem_addr) = session.local_endpoint();
    let start = AuthenStart::new(
        AUTHEN_ACTION_LOGIN,
        PRIV_LVL_ROOT,
        AUTHEN_TYPE_PAP,
        AUTHEN_SERVICE_LOGIN,
    )
    .with_user(session.user().as_bytes().to_vec())
    .with_port(port)
    .with_rem_addr(rem_addr)
    .with_data(session.password().unwrap_or("").as_bytes().to_vec());
    let frame = session.seal(TYPE_AUTHEN, start.encode_body()?)?;
    session.submit(frame).await?;

    let raw = session.await_reply().await?;
    let (_header, body) = session.verify_reply(&raw)?;
    let reply = AuthenReply::parse(&body)?;
    match reply.status {
        AUTHEN_STATUS_PASS => {
            debug!(user = session.user(), "authentication passed");
            Ok(())
        }
        AUTHEN_STATUS_FAIL => Err(ClientError::ServerFail(reply.server_msg)),
        AUTHEN_STATUS_ERROR => Err(ClientError::ServerError(reply.server_msg)),
        other => Err(ClientError::Unsupported(format!(
            "authentication status {other:#04x} in a PAP exchange"
        ))),
    }
}
