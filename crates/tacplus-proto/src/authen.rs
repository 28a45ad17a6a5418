// SPDX-License-Identifier: AGPL-3.0-only
//! Authentication packet bodies: START and CONTINUE encoders (client to
//! server), REPLY parser (server to client).

use crate::util::read_bytes;
use crate::{
    AUTHEN_REPLY_FLAG_NOECHO, AUTHEN_STATUS_ERROR, AUTHEN_STATUS_FAIL, AUTHEN_STATUS_FOLLOW,
    AUTHEN_STATUS_GETDATA, AUTHEN_STATUS_GETPASS, AUTHEN_STATUS_GETUSER, AUTHEN_STATUS_PASS,
    AUTHEN_STATUS_RESTART,
};
use anyhow::{Result, ensure};
use bytes::{BufMut, BytesMut};

/// Authentication START body (draft section 5.1).
#[derive(Debug, Clone)]
pub struct AuthenStart {
    pub action: u8,
    pub priv_lvl: u8,
    pub authen_type: u8,
    pub service: u8,
    pub user: Vec<u8>,
    pub port: String,
    pub rem_addr: String,
    pub data: Vec<u8>,
}

impl AuthenStart {
    pub fn new(action: u8, priv_lvl: u8, authen_type: u8, service: u8) -> AuthenStart {
        AuthenStart {
            action,
            priv_lvl,
            authen_type,
            service,
            user: Vec::new(),
            port: String::new(),
            rem_addr: String::new(),
            data: Vec::new(),
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

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    pub fn encode_body(&self) -> Result<Vec<u8>> {
        ensure!(self.user.len() <= u8::MAX as usize, "user exceeds 255 bytes");
        ensure!(self.port.len() <= u8::MAX as usize, "port exceeds 255 bytes");
        ensure!(
            self.rem_addr.len() <= u8::MAX as usize,
            "rem_addr exceeds 255 bytes"
        );
        ensure!(self.data.len() <= u8::MAX as usize, "data exceeds 255 bytes");

        let mut buf = BytesMut::with_capacity(
            8 + self.user.len() + self.port.len() + self.rem_addr.len() + self.data.len(),
        );
        buf.put_u8(self.action);
        buf.put_u8(self.priv_lvl);
        buf.put_u8(self.authen_type);
        buf.put_u8(self.service);
        buf.put_u8(self.user.len() as u8);
        buf.put_u8(self.port.len() as u8);
        buf.put_u8(self.rem_addr.len() as u8);
        buf.put_u8(self.data.len() as u8);
        buf.extend_from_slice(&self.user);
        buf.extend_from_slice(self.port.as_bytes());
        buf.extend_from_slice(self.rem_addr.as_bytes());
        buf.extend_from_slice(&self.data);
        Ok(buf.to_vec())
    }
}

/// Authentication CONTINUE body (draft section 5.3).
#[derive(Debug, Clone, Default)]
pub struct AuthenContinue {
    pub user_msg: Vec<u8>,
    pub data: Vec<u8>,
    pub flags: u8,
}

impl AuthenContinue {
    pub fn new() -> AuthenContinue {
        AuthenContinue::default()
    }

    pub fn with_user_msg(mut self, user_msg: Vec<u8>) -> Self {
        self.user_msg = user_msg;
        self
    }

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    pub fn with_flags(mut self, flags: u8) -> Self {
        self.flags = flags;
        self
    }

    pub fn encode_body(&self) -> Result<Vec<u8>> {
        ensure!(
            self.user_msg.len() <= u16::MAX as usize,
            "user_msg exceeds 65535 bytes"
        );
        ensure!(
            self.data.len() <= u16::MAX as usize,
            "data exceeds 65535 bytes"
        );

        let mut buf = BytesMut::with_capacity(5 + self.user_msg.len() + self.data.len());
        buf.put_u16(self.user_msg.len() as u16);
        buf.put_u16(self.data.len() as u16);
        buf.put_u8(self.flags);
        buf.extend_from_slice(&self.user_msg);
        buf.extend_from_slice(&self.data);
        Ok(buf.to_vec())
    }
}

/// Authentication REPLY body (draft section 5.2).
#[derive(Debug, Clone)]
pub struct AuthenReply {
    pub status: u8,
    pub flags: u8,
    pub server_msg: String,
    pub data: Vec<u8>,
}

impl AuthenReply {
    pub fn parse(body: &[u8]) -> Result<AuthenReply> {
        ensure!(body.len() >= 6, "authentication reply body too short");
        let status = body[0];
        let flags = body[1];
        ensure!(
            matches!(
                status,
                AUTHEN_STATUS_PASS
                    | AUTHEN_STATUS_FAIL
                    | AUTHEN_STATUS_GETDATA
                    | AUTHEN_STATUS_GETUSER
                    | AUTHEN_STATUS_GETPASS
                    | AUTHEN_STATUS_RESTART
                    | AUTHEN_STATUS_ERROR
                    | AUTHEN_STATUS_FOLLOW
            ),
            "invalid authentication reply status {status:#04x}"
        );
        ensure!(
            flags & !AUTHEN_REPLY_FLAG_NOECHO == 0,
            "invalid authentication reply flags {flags:#04x}"
        );
        let server_msg_len = u16::from_be_bytes([body[2], body[3]]) as usize;
        let data_len = u16::from_be_bytes([body[4], body[5]]) as usize;
        ensure!(
            6 + server_msg_len + data_len <= body.len(),
            "authentication reply exceeds body length"
        );
        let (server_msg_raw, next) = read_bytes(body, 6, server_msg_len, "server_msg")?;
        let server_msg = String::from_utf8_lossy(&server_msg_raw).into_owned();
        let (data, _) = read_bytes(body, next, data_len, "data")?;

        Ok(AuthenReply {
            status,
            flags,
            server_msg,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        AUTHEN_ACTION_LOGIN, AUTHEN_SERVICE_LOGIN, AUTHEN_TYPE_ASCII, AUTHEN_TYPE_PAP,
        PRIV_LVL_ROOT,
    };

    #[test]
    fn start_body_wire_image() {
        let start = AuthenStart::new(
            AUTHEN_ACTION_LOGIN,
            PRIV_LVL_ROOT,
            AUTHEN_TYPE_ASCII,
            AUTHEN_SERVICE_LOGIN,
        )
        .with_user(b"mason".to_vec())
        .with_port("1194".to_string())
        .with_rem_addr("127.0.0.1".to_string());

        let body = start.encode_body().unwrap();

        let mut expected = vec![
            0x01, // action = login
            0x0f, // priv_lvl = root
            0x01, // authen_type = ascii
            0x01, // service = login
            0x05, // user_len
            0x04, // port_len
            0x09, // rem_addr_len
            0x00, // data_len
        ];
        expected.extend_from_slice(b"mason");
        expected.extend_from_slice(b"1194");
        expected.extend_from_slice(b"127.0.0.1");
        assert_eq!(body, expected);
    }

    #[test]
    fn start_body_pap_carries_password_in_data() {
        let start = AuthenStart::new(
            AUTHEN_ACTION_LOGIN,
            PRIV_LVL_ROOT,
            AUTHEN_TYPE_PAP,
            AUTHEN_SERVICE_LOGIN,
        )
        .with_user(b"alice".to_vec())
        .with_data(b"wrong".to_vec());

        let body = start.encode_body().unwrap();
        assert_eq!(body[7], 5); // data_len
        assert_eq!(&body[8 + 5..], b"wrong");
    }

    #[test]
    fn start_body_rejects_oversized_user() {
        let start = AuthenStart::new(1, 1, AUTHEN_TYPE_ASCII, 1).with_user(vec![b'x'; 256]);
        assert!(start.encode_body().is_err());
    }

    #[test]
    fn continue_body_wire_image() {
        let cont = AuthenContinue::new().with_user_msg(b"0000".to_vec());
        let body = cont.encode_body().unwrap();

        let mut expected = vec![
            0x00, 0x04, // user_msg_len
            0x00, 0x00, // data_len
            0x00, // flags
        ];
        expected.extend_from_slice(b"0000");
        assert_eq!(body, expected);
    }

    #[test]
    fn reply_parse_valid() {
        let mut body = vec![
            AUTHEN_STATUS_GETPASS,
            AUTHEN_REPLY_FLAG_NOECHO,
            0x00,
            0x0a, // server_msg_len = 10
            0x00,
            0x00, // data_len = 0
        ];
        body.extend_from_slice(b"Password: ");

        let reply = AuthenReply::parse(&body).unwrap();
        assert_eq!(reply.status, AUTHEN_STATUS_GETPASS);
        assert_eq!(reply.flags, AUTHEN_REPLY_FLAG_NOECHO);
        assert_eq!(reply.server_msg, "Password: ");
        assert!(reply.data.is_empty());
    }

    #[test]
    fn reply_parse_all_valid_statuses() {
        for status in [
            AUTHEN_STATUS_PASS,
            AUTHEN_STATUS_FAIL,
            AUTHEN_STATUS_GETDATA,
            AUTHEN_STATUS_GETUSER,
            AUTHEN_STATUS_GETPASS,
            AUTHEN_STATUS_RESTART,
            AUTHEN_STATUS_ERROR,
            AUTHEN_STATUS_FOLLOW,
        ] {
            let body = vec![status, 0x00, 0x00, 0x00, 0x00, 0x00];
            assert!(
                AuthenReply::parse(&body).is_ok(),
                "status {status:#04x} should parse"
            );
        }
    }

    #[test]
    fn reply_parse_rejects_invalid_status() {
        let body = vec![0xFF, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert!(AuthenReply::parse(&body).is_err());
    }

    #[test]
    fn reply_parse_rejects_invalid_flags() {
        let body = vec![AUTHEN_STATUS_PASS, 0xFE, 0x00, 0x00, 0x00, 0x00];
        assert!(AuthenReply::parse(&body).is_err());
    }

    #[test]
    fn reply_parse_rejects_truncated_body() {
        let body = vec![AUTHEN_STATUS_PASS, 0x00, 0x00, 0x10, 0x00, 0x00];
        assert!(AuthenReply::parse(&body).is_err());
    }

    #[test]
    fn reply_parse_non_utf8_server_msg_is_lossy() {
        let mut body = vec![AUTHEN_STATUS_FAIL, 0x00, 0x00, 0x03, 0x00, 0x00];
        body.extend_from_slice(&[0xFF, 0xFE, 0xFD]);

        let reply = AuthenReply::parse(&body).unwrap();
        assert_eq!(reply.status, AUTHEN_STATUS_FAIL);
        assert!(!reply.server_msg.is_empty());
    }
}
