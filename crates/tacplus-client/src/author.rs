// SPDX-License-Identifier: AGPL-3.0-only
//! Authorization flow: one REQUEST, one REPLY.

use crate::error::{ClientError, Result};
use crate::session::Session;
use tacplus_proto::{
    AUTHOR_STATUS_ERROR, AUTHOR_STATUS_FAIL, AUTHOR_STATUS_FOLLOW, AUTHOR_STATUS_PASS_ADD,
    AUTHOR_STATUS_PASS_REPL, AuthorReply, AuthorRequest, TYPE_AUTHOR, VERSION_DEFAULT,
};
use tracing::debug;

/// The server's authorization verdict together with the attribute set the
/// caller is now bound to.
#[derive(Debug, Clone)]
pub struct AuthorOutcome {
    /// The effective attribute-value pairs: the request's plus the reply's
    /// on PASS_ADD, the reply's alone on PASS_REPL.
    pub args: Vec<String>,
    pub server_msg: String,
    /// True when the server replaced the requested attribute set.
    pub replaced: bool,
}

/// Run one authorization exchange on `session`. The session is consumed:
/// it is closed when this returns, whatever the verdict.
pub async fn author(
    session: &Session,
    authen_method: u8,
    priv_lvl: u8,
    authen_type: u8,
    authen_service: u8,
    args: &[String],
) -> Result<AuthorOutcome> {
    let outcome = author_exchange(
        session,
        authen_method,
        priv_lvl,
        authen_type,
        authen_service,
        args,
    )
    .await;
    session.close().await;
    outcome
}

async fn author_exchange(
    session: &Session,
    authen_method: u8,
    priv_lvl: u8,
    authen_type: u8,
    authen_service: u8,
    args: &[String],
) -> Result<AuthorOutcome> {
    session.set_version(VERSION_DEFAULT);
    let (port, rem_addr) = session.local_endpoint();
    let request = AuthorRequest::new(authen_method, priv_lvl, authen_type, authen_service)
        .with_user(session.user().as_bytes().to_vec())
        .with_port(port)
        .with_rem_addr(rem_addr)
        .with_args(args.to_vec());
    let frame = session.seal(TYPE_AUTHOR, request.encode_body()?)?;
    session.submit(frame).await?;

    let raw = session.await_reply().await?;
    let (_header, body) = session.verify_reply(&raw)?;
    let reply = AuthorReply::parse(&body)?;
    match reply.status {
        AUTHOR_STATUS_PASS_ADD => {
            debug!(user = session.user(), "authorization passed (additive)");
            let mut effective = args.to_vec();
            effective.extend(reply.args);
            Ok(AuthorOutcome {
                args: effective,
                server_msg: reply.server_msg,
                replaced: false,
            })
        }
        AUTHOR_STATUS_PASS_REPL => {
            debug!(user = session.user(), "authorization passed (replacement)");
            Ok(AuthorOutcome {
                args: reply.args,
                server_msg: reply.server_msg,
                replaced: true,
            })
        }
        AUTHOR_STATUS_FAIL => Err(ClientError::ServerFail(reply.server_msg)),
        AUTHOR_STATUS_ERROR => Err(ClientError::ServerError(reply.server_msg)),
        AUTHOR_STATUS_FOLLOW => Err(ClientError::Unsupported(
            "authorization FOLLOW redirect".into(),
        )),
        other => Err(ClientError::Unsupported(format!(
            "unrecognized authorization status {other:#04x}"
        ))),
    }
}
