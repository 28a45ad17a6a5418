// SPDX-License-Identifier: AGPL-3.0-only
//! TACACS+ packet header: 12 bytes, all multibyte integers big-endian.

use anyhow::{Result, ensure};

use crate::HEADER_LEN;

/// The fixed header every TACACS+ packet starts with.
///
/// `length` counts the body only; a full frame is `length + 12` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub packet_type: u8,
    pub seq_no: u8,
    pub flags: u8,
    pub session_id: u32,
    pub length: u32,
}

impl Header {
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0] = self.version;
        buf[1] = self.packet_type;
        buf[2] = self.seq_no;
        buf[3] = self.flags;
        buf[4..8].copy_from_slice(&self.session_id.to_be_bytes());
        buf[8..12].copy_from_slice(&self.length.to_be_bytes());
        buf
    }

    /// Parse a header from the first 12 bytes of `buf`.
    pub fn parse(buf: &[u8]) -> Result<Header> {
        ensure!(
            buf.len() >= HEADER_LEN,
            "TACACS+ header needs {} bytes, got {}",
            HEADER_LEN,
            buf.len()
        );
        Ok(Header {
            version: buf[0],
            packet_type: buf[1],
            seq_no: buf[2],
            flags: buf[3],
            session_id: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            length: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
        })
    }

    pub fn major_version(&self) -> u8 {
        self.version >> 4
    }

    pub fn minor_version(&self) -> u8 {
        self.version & 0x0f
    }
}
