// SPDX-License-Identifier: AGPL-3.0-only
//! Accounting flow: one REQUEST, one REPLY.

use crate::error::{ClientError, Result};
use crate::session::Session;
use tacplus_proto::{
    ACCT_STATUS_ERROR, ACCT_STATUS_FOLLOW, ACCT_STATUS_SUCCESS, AcctReply, AcctRequest, TYPE_ACCT,
    VERSION_DEFAULT,
};
use tracing::debug;

/// The task being accounted for: the record type (START, STOP or WATCHDOG)
/// plus the authentication context it happened under.
#[derive(Debug, Clone, Copy)]
pub struct AcctTask {
    pub flags: u8,
    pub authen_method: u8,
    pub priv_lvl: u8,
    pub authen_type: u8,
    pub authen_service: u8,
}

/// Record one accounting event on `session`. The session is consumed: it
/// is closed when this returns.
pub async fn account(session: &Session, task: AcctTask, args: &[String]) -> Result<()> {
    let outcome = account_exchange(session, task, args).await;
    session.close().await;
    outcome
}

async fn account_exchange(session: &Session, task: AcctTask, args: &[String]) -> Result<()> {
    session.set_version(VERSION_DEFAULT);
    let (port, rem_addr) = session.local_endpoint();
    let request = AcctRequest::new(
        task.flags,
        task.authen_method,
        task.priv_lvl,
        task.authen_type,
        task.authen_service,
    )
    .with_user(session.user().as_bytes().to_vec())
    .with_port(port)
    .with_rem_addr(rem_addr)
    .with_args(args.to_vec());
    let frame = session.seal(TYPE_ACCT, request.encode_body()?)?;
    session.submit(frame).await?;

    let raw = session.await_reply().await?;
    let (_header, body) = session.verify_reply(&raw)?;
    let reply = AcctReply::parse(&body)?;
    match reply.status {
        ACCT_STATUS_SUCCESS => {
            debug!(user = session.user(), "accounting record accepted");
            Ok(())
        }
        ACCT_STATUS_ERROR => Err(ClientError::ServerError(reply.server_msg)),
        ACCT_STATUS_FOLLOW => Err(ClientError::Unsupported(
            "accounting FOLLOW redirect".into(),
        )),
        other => Err(ClientError::Unsupported(format!(
            "unrecognized accounting status {other:#04x}"
        ))),
    }
}
