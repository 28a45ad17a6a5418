// SPDX-License-Identifier: AGPL-3.0-only
//! TACACS+ wire codec for client use: the 12-byte packet header, the six
//! request/reply body layouts of the opsawg draft (sections 5.1-7.2), and the
//! MD5 pseudo-pad body obfuscation.
//! The `legacy-md5` feature (on by default) enables the obfuscation; with it
//! disabled packets can be neither sealed nor opened (FIPS-only builds).

use anyhow::{Result, bail, ensure};

mod accounting;
mod authen;
mod author;
pub mod header;
mod obfuscate;
pub mod util;

pub use accounting::{AcctReply, AcctRequest};
pub use authen::{AuthenContinue, AuthenReply, AuthenStart};
pub use author::{AuthorReply, AuthorRequest};
pub use header::Header;
pub use obfuscate::apply_body_pad;
pub use util::{Attribute, split_attribute, validate_args};

pub const MAJOR_VERSION: u8 = 0xc;
pub const MINOR_VERSION_DEFAULT: u8 = 0x0;
pub const MINOR_VERSION_ONE: u8 = 0x1;
/// Version byte for ASCII login, authorization and accounting.
pub const VERSION_DEFAULT: u8 = MAJOR_VERSION << 4 | MINOR_VERSION_DEFAULT;
/// Version byte for PAP (and the CHAP family) login.
pub const VERSION_ONE: u8 = MAJOR_VERSION << 4 | MINOR_VERSION_ONE;

pub const TYPE_AUTHEN: u8 = 0x01;
pub const TYPE_AUTHOR: u8 = 0x02;
pub const TYPE_ACCT: u8 = 0x03;

pub const FLAG_UNENCRYPTED: u8 = 0x01;
pub const FLAG_SINGLE_CONNECT: u8 = 0x04;

pub const HEADER_LEN: usize = 12;
pub const MAX_BODY_LEN: u32 = 4096;

pub const AUTHEN_ACTION_LOGIN: u8 = 0x01;
pub const AUTHEN_ACTION_CHPASS: u8 = 0x02;
pub const AUTHEN_ACTION_SENDAUTH: u8 = 0x04;

pub const AUTHEN_TYPE_NOT_SET: u8 = 0x00;
pub const AUTHEN_TYPE_ASCII: u8 = 0x01;
pub const AUTHEN_TYPE_PAP: u8 = 0x02;
pub const AUTHEN_TYPE_CHAP: u8 = 0x03;
pub const AUTHEN_TYPE_ARAP: u8 = 0x04;
pub const AUTHEN_TYPE_MSCHAP: u8 = 0x05;
pub const AUTHEN_TYPE_MSCHAPV2: u8 = 0x06;

pub const AUTHEN_SERVICE_NONE: u8 = 0x00;
pub const AUTHEN_SERVICE_LOGIN: u8 = 0x01;
pub const AUTHEN_SERVICE_ENABLE: u8 = 0x02;
pub const AUTHEN_SERVICE_PPP: u8 = 0x03;
pub const AUTHEN_SERVICE_ARAP: u8 = 0x04;
pub const AUTHEN_SERVICE_PT: u8 = 0x05;
pub const AUTHEN_SERVICE_RCMD: u8 = 0x06;
pub const AUTHEN_SERVICE_X25: u8 = 0x07;
pub const AUTHEN_SERVICE_NASI: u8 = 0x08;
pub const AUTHEN_SERVICE_FWPROXY: u8 = 0x09;

pub const AUTHEN_METHOD_NOT_SET: u8 = 0x00;
pub const AUTHEN_METHOD_NONE: u8 = 0x01;
pub const AUTHEN_METHOD_KRB5: u8 = 0x02;
pub const AUTHEN_METHOD_LINE: u8 = 0x03;
pub const AUTHEN_METHOD_ENABLE: u8 = 0x04;
pub const AUTHEN_METHOD_LOCAL: u8 = 0x05;
pub const AUTHEN_METHOD_TACACSPLUS: u8 = 0x06;
pub const AUTHEN_METHOD_GUEST: u8 = 0x08;
pub const AUTHEN_METHOD_RADIUS: u8 = 0x10;
pub const AUTHEN_METHOD_KRB4: u8 = 0x11;
pub const AUTHEN_METHOD_RCMD: u8 = 0x20;

pub const PRIV_LVL_MIN: u8 = 0x00;
pub const PRIV_LVL_USER: u8 = 0x01;
pub const PRIV_LVL_ROOT: u8 = 0x0f;
pub const PRIV_LVL_MAX: u8 = 0x0f;

pub const AUTHEN_STATUS_PASS: u8 = 0x01;
pub const AUTHEN_STATUS_FAIL: u8 = 0x02;
pub const AUTHEN_STATUS_GETDATA: u8 = 0x03;
pub const AUTHEN_STATUS_GETUSER: u8 = 0x04;
pub const AUTHEN_STATUS_GETPASS: u8 = 0x05;
pub const AUTHEN_STATUS_RESTART: u8 = 0x06;
pub const AUTHEN_STATUS_ERROR: u8 = 0x07;
pub const AUTHEN_STATUS_FOLLOW: u8 = 0x21;

pub const AUTHEN_REPLY_FLAG_NOECHO: u8 = 0x01;
pub const AUTHEN_CONTINUE_FLAG_ABORT: u8 = 0x01;

pub const AUTHOR_STATUS_PASS_ADD: u8 = 0x01;
pub const AUTHOR_STATUS_PASS_REPL: u8 = 0x02;
pub const AUTHOR_STATUS_FAIL: u8 = 0x10;
pub const AUTHOR_STATUS_ERROR: u8 = 0x11;
pub const AUTHOR_STATUS_FOLLOW: u8 = 0x21;

pub const ACCT_STATUS_SUCCESS: u8 = 0x01;
pub const ACCT_STATUS_ERROR: u8 = 0x02;
pub const ACCT_STATUS_FOLLOW: u8 = 0x21;

pub const ACCT_FLAG_START: u8 = 0x02;
pub const ACCT_FLAG_STOP: u8 = 0x04;
pub const ACCT_FLAG_WATCHDOG: u8 = 0x08;

/// Marshal a complete outbound frame: header bytes followed by the
/// obfuscated body. The header's length field is taken from the body, not
/// from the caller.
pub fn seal_packet(header: &Header, mut body: Vec<u8>, secret: &[u8]) -> Result<Vec<u8>> {
    ensure!(!body.is_empty(), "refusing to seal an empty packet body");
    ensure!(
        body.len() <= MAX_BODY_LEN as usize,
        "packet body of {} bytes exceeds the {} byte limit",
        body.len(),
        MAX_BODY_LEN
    );
    let header = Header {
        length: body.len() as u32,
        ..header.clone()
    };
    apply_body_pad(&header, &mut body, secret)?;
    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.extend_from_slice(&header.to_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Deobfuscate an inbound body in place, keyed by the header values exactly
/// as they arrived on the wire. XOR with the pseudo-pad is self-inverse, so
/// this is the same transform `seal_packet` applies.
pub fn open_body(header: &Header, body: &mut [u8], secret: &[u8]) -> Result<()> {
    if header.flags & FLAG_UNENCRYPTED != 0 {
        bail!("unencrypted TACACS+ packet received (not supported)");
    }
    apply_body_pad(header, body, secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_header(seq_no: u8) -> Header {
        Header {
            version: VERSION_DEFAULT,
            packet_type: TYPE_AUTHEN,
            seq_no,
            flags: 0,
            session_id: 0x00c0ffee,
            length: 0,
        }
    }

    #[test]
    fn seal_packet_sets_length_from_body() {
        let body = vec![0u8; 42];
        let frame = seal_packet(&make_header(1), body, b"12345678").unwrap();

        assert_eq!(frame.len(), HEADER_LEN + 42);
        let header = Header::parse(&frame).unwrap();
        assert_eq!(header.length, 42);
    }

    #[test]
    fn seal_then_open_restores_body() {
        let body = b"a body that spans more than one MD5 block....".to_vec();
        let frame = seal_packet(&make_header(3), body.clone(), b"s3cret!!").unwrap();

        let header = Header::parse(&frame).unwrap();
        let mut opened = frame[HEADER_LEN..].to_vec();
        assert_ne!(opened, body, "body must not ride the wire in clear");
        open_body(&header, &mut opened, b"s3cret!!").unwrap();
        assert_eq!(opened, body);
    }

    #[test]
    fn seal_packet_rejects_empty_body() {
        let result = seal_packet(&make_header(1), Vec::new(), b"12345678");
        assert!(result.is_err());
    }

    #[test]
    fn seal_packet_rejects_oversized_body() {
        let body = vec![0u8; MAX_BODY_LEN as usize + 1];
        let result = seal_packet(&make_header(1), body, b"12345678");
        assert!(result.is_err());
    }

    #[test]
    fn open_body_rejects_unencrypted_flag() {
        let mut header = make_header(2);
        header.flags = FLAG_UNENCRYPTED;
        header.length = 4;
        let mut body = vec![1, 2, 3, 4];

        let result = open_body(&header, &mut body, b"12345678");
        assert!(result.is_err());
    }
}
