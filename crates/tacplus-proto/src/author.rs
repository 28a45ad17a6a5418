// SPDX-License-Identifier: AGPL-3.0-only
//! Authorization packet bodies: REQUEST encoder, REPLY parser.

use crate::util::{read_string, validate_args};
use crate::{
    AUTHOR_STATUS_ERROR, AUTHOR_STATUS_FAIL, AUTHOR_STATUS_FOLLOW, AUTHOR_STATUS_PASS_ADD,
    AUTHOR_STATUS_PASS_REPL,
};
use anyhow::{Result, anyhow, ensure};
use bytes::{BufMut, BytesMut};
use log::warn;

/// Authorization REQUEST body (draft section 6.1).
#[derive(Debug, Clone)]
pub struct AuthorRequest {
    pub authen_method: u8,
    pub priv_lvl: u8,
    pub authen_type: u8,
    pub authen_service: u8,
    pub user: Vec<u8>,
    pub port: String,
    pub rem_addr: String,
    pub args: Vec<String>,
}

impl AuthorRequest {
    pub fn new(authen_method: u8, priv_lvl: u8, authen_type: u8, authen_service: u8) -> Self {
        AuthorRequest {
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
        ensure!(self.user.len() <= u8::MAX as usize, "user exceeds 255 bytes");
        ensure!(self.port.len() <= u8::MAX as usize, "port exceeds 255 bytes");
        ensure!(
            self.rem_addr.len() <= u8::MAX as usize,
            "rem_addr exceeds 255 bytes"
        );
        validate_args(&self.args)?;

        let args_len: usize = self.args.iter().map(String::len).sum();
        let mut buf = BytesMut::with_capacity(
            8 + self.args.len() + self.user.len() + self.port.len() + self.rem_addr.len() + args_len,
        );
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

/// Authorization REPLY body (draft section 6.2).
#[derive(Debug, Clone)]
pub struct AuthorReply {
    pub status: u8,
    pub server_msg: String,
    pub data: String,
    pub args: Vec<String>,
}

impl AuthorReply {
    pub fn parse(body: &[u8]) -> Result<AuthorReply> {
        ensure!(body.len() >= 6, "authorization reply body too short");
        let status = body[0];
        ensure!(
            matches!(
                status,
                AUTHOR_STATUS_PASS_ADD
                    | AUTHOR_STATUS_PASS_REPL
                    | AUTHOR_STATUS_FAIL
                    | AUTHOR_STATUS_ERROR
                    | AUTHOR_STATUS_FOLLOW
            ),
            "invalid authorization reply status {status:#04x}"
        );
        if status == AUTHOR_STATUS_FOLLOW {
            warn!("authorization reply carries the deprecated FOLLOW status");
        }
        let arg_cnt = body[1] as usize;
        let server_msg_len = u16::from_be_bytes([body[2], body[3]]) as usize;
        let data_len = u16::from_be_bytes([body[4], body[5]]) as usize;

        let mut cursor = 6;
        let arg_lens = body
            .get(cursor..cursor + arg_cnt)
            .ok_or_else(|| anyhow!("authorization reply arg lengths truncated"))?
            .to_vec();
        cursor += arg_cnt;
        let total_args_len: usize = arg_lens.iter().map(|l| *l as usize).sum();
        ensure!(
            cursor + server_msg_len + data_len + total_args_len <= body.len(),
            "authorization reply exceeds body length"
        );

        let (server_msg, next) = read_string(body, cursor, server_msg_len, "server_msg")?;
        cursor = next;
        let (data, next) = read_string(body, cursor, data_len, "data")?;
        cursor = next;
        let mut args = Vec::with_capacity(arg_cnt);
        for (idx, len) in arg_lens.iter().enumerate() {
            let (arg, next) = read_string(body, cursor, *len as usize, &format!("arg[{idx}]"))?;
            cursor = next;
            args.push(arg);
        }

        Ok(AuthorReply {
            status,
            server_msg,
            data,
            args,
        })
    }
}
