// SPDX-License-Identifier: AGPL-3.0-only
//! Accounting packet bodies: REQUEST encoder, REPLY parser.

use crate::util::{read_string, validate_args};
use crate::{
    ACCT_FLAG_START, ACCT_FLAG_STOP, ACCT_FLAG_WATCHDOG, ACCT_STATUS_ERROR, ACCT_STATUS_FOLLOW,
    ACCT_STATUS_SUCCESS,
};
use anyhow::{Result, ensure};
use bytes::{BufMut, BytesMut};
use log::warn;

/// Accounting REQUEST body (draft section 7.1). The record flags byte must
/// carry exactly one of START, STOP, WATCHDOG.
#[derive(Debug, Clone)]
pub struct AcctRequest {
    pub flags: u8,
    pub authen_method: u8,
    pub priv_lvl: u8,
    pub authen_type: u8,
    pub authen_service: u8,
    pub user: Vec<u8>,
    pub port: String,
    pub rem_addr: String,
    pub args: Vec<String>,
}

impl AcctRequest {
    pub fn new(
        flags: u8,
        authen_method: u8,
        priv_lvl: u8,
        authen_type: u8,
        authen_service: u8,
    ) -> Self {
        AcctRequest {
            flags,
            authen_method,
            priv_lvl,
            authen_type,
            authen_service,
            user: Vec::new(),
            port: String::new(),
            rem_addr: String::new(),
            args: Vec::new(),
        }
    }

    pub fn with_user(mut self, user: Vec<u8>) -> Self {
        self.user = user;
        self
    }

    pub fn with_port(mut self, port: String) -> Self {
        self.port = port;
        self
    }

    pub fn with_rem_addr(mut self, rem_addr: String) -> Self {
        self.rem_addr = rem_addr;
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn encode_body(&self) -> Result<Vec<u8>> {
        let record_mask = ACCT_FLAG_START | ACCT_FLAG_STOP | ACCT_FLAG_WATCHDOG;
        ensure!(
            (self.flags & record_mask).count_ones() == 1 && self.flags & !record_mask == 0,
            "accounting record flags invalid: {:#04x}",
            self.flags
        );
        ensure!(self.user.len() <= u8::MAX as usize, "user exceeds 255 bytes");
        ensure!(self.port.len() <= u8::MAX as usize, "port exceeds 255 bytes");
        ensure!(
            self.rem_addr.len() <= u8::MAX as usize,
            "rem_addr exceeds 255 bytes"
        );
        validate_args(&self.args)?;

        let args_len: usize = self.args.iter().map(String::len).sum();
        let mut buf = BytesMut::with_capacity(
            9 + self.args.len() + self.user.len() + self.port.len() + self.rem_addr.len() + args_len,
        );
        buf.put_u8(self.flags);
        buf.put_u8(self.authen_method);
        buf.put_u8(self.priv_lvl);
        buf.put_u8(self.authen_type);
        buf.put_u8(self.authen_service);
        buf.put_u8(self.user.len() as u8);
        buf.put_u8(self.port.len() as u8);
        buf.put_u8(self.rem_addr.len() as u8);
        buf.put_u8(self.args.len() as u8);
        for arg in &self.args {
            buf.put_u8(arg.len() as u8);
        }
        buf.extend_from_slice(&self.user);
        buf.extend_from_slice(self.port.as_bytes());
        buf.extend_from_slice(self.rem_addr.as_bytes());
        for arg in &self.args {
            buf.extend_from_slice(arg.as_bytes());
        }
        Ok(buf.to_vec())
    }
}

/// Accounting REPLY body (draft section 7.2).
#[derive(Debug, Clone)]
pub struct AcctReply {
    pub status: u8,
    pub server_msg: String,
    pub data: String,
}

impl AcctReply {
    pub fn parse(body: &[u8]) -> Result<AcctReply> {
        ensure!(body.len() >= 5, "accounting reply body too short");
        let server_msg_len = u16::from_be_bytes([body[0], body[1]]) as usize;
        let data_len = u16::from_be_bytes([body[2], body[3]]) as usize;
        let status = body[4];
        ensure!(
            matches!(
                status,
                ACCT_STATUS_SUCCESS | ACCT_STATUS_ERROR | ACCT_STATUS_FOLLOW
            ),
            "invalid accounting reply status {status:#04x}"
        );
        if status == ACCT_STATUS_FOLLOW {
            warn!("accounting reply carries the deprecated FOLLOW status");
        }
        ensure!(
            5 + server_msg_len + data_len <= body.len(),
            "accounting reply exceeds body length"
        );
        let (server_msg, next) = read_string(body, 5, server_msg_len, "server_msg")?;
        let (data, _) = read_string(body, next, data_len, "data")?;

        Ok(AcctReply {
            status,
            server_msg,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AUTHEN_METHOD_TACACSPLUS, AUTHEN_SERVICE_NONE, AUTHEN_TYPE_NOT_SET, PRIV_LVL_ROOT};

    fn start_request() -> AcctRequest {
        AcctRequest::new(
            ACCT_FLAG_START,
            AUTHEN_METHOD_TACACSPLUS,
            PRIV_LVL_ROOT,
            AUTHEN_TYPE_NOT_SET,
            AUTHEN_SERVICE_NONE,
        )
        .with_user(b"mason".to_vec())
        .with_args(vec!["task_id=100".to_string()])
    }

    #[test]
    fn request_body_wire_image() {
        let body = start_request().encode_body().unwrap();

        let mut expected = vec![
            0x02, // flags = start
            0x06, // authen_method = tacacs+
            0x0f, // priv_lvl
            0x00, // authen_type
            0x00, // authen_service
            0x05, // user_len
            0x00, // port_len
            0x00, // rem_addr_len
            0x01, // arg_cnt
            0x0b, // len "task_id=100"
        ];
        expected.extend_from_slice(b"mason");
        expected.extend_from_slice(b"task_id=100");
        assert_eq!(body, expected);
    }

    #[test]
    fn request_rejects_combined_record_flags() {
        let mut req = start_request();
        req.flags = ACCT_FLAG_START | ACCT_FLAG_STOP;
        assert!(req.encode_body().is_err());

        req.flags = 0;
        assert!(req.encode_body().is_err());
    }

    fn reply_body(status: u8, server_msg: &str, data: &str) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&(server_msg.len() as u16).to_be_bytes());
        body.extend_from_slice(&(data.len() as u16).to_be_bytes());
        body.push(status);
        body.extend_from_slice(server_msg.as_bytes());
        body.extend_from_slice(data.as_bytes());
        body
    }

    #[test]
    fn reply_parse_success() {
        let reply = AcctReply::parse(&reply_body(ACCT_STATUS_SUCCESS, "logged", "")).unwrap();
        assert_eq!(reply.status, ACCT_STATUS_SUCCESS);
        assert_eq!(reply.server_msg, "logged");
        assert!(reply.data.is_empty());
    }

    #[test]
    fn reply_parse_rejects_unknown_status() {
        assert!(AcctReply::parse(&reply_body(0x05, "", "")).is_err());
    }

    #[test]
    fn reply_parse_rejects_truncated() {
        let mut body = reply_body(ACCT_STATUS_SUCCESS, "message", "");
        body.truncate(6);
        assert!(AcctReply::parse(&body).is_err());
    }
}
