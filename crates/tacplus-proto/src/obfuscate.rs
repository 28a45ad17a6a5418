// SPDX-License-Identifier: AGPL-3.0-only
//! Shared-secret body obfuscation: XOR with a chained-MD5 pseudo-pad.
//!
//! pad_1 = MD5(session_id, secret, version, seq_no)
//! pad_n = MD5(session_id, secret, version, seq_no, pad_{n-1})
//! truncated to the body length. The transform is its own inverse.

use crate::header::Header;
use anyhow::{Result, ensure};
#[cfg(feature = "legacy-md5")]
use anyhow::anyhow;
#[cfg(not(feature = "legacy-md5"))]
use anyhow::bail;
#[cfg(feature = "legacy-md5")]
use openssl::hash::{MessageDigest, hash};

/// XOR `body` in place with the pseudo-pad derived from `header` and
/// `secret`. Obfuscation covers the body only, never the header.
pub fn apply_body_pad(header: &Header, body: &mut [u8], secret: &[u8]) -> Result<()> {
    ensure!(!secret.is_empty(), "shared secret must not be empty");

    #[cfg(not(feature = "legacy-md5"))]
    {
        let _ = (header, body);
        bail!("TACACS+ body obfuscation is disabled (legacy-md5 feature off)");
    }

    #[cfg(feature = "legacy-md5")]
    {
        let mut prev: Option<[u8; 16]> = None;
        let mut offset = 0usize;

        while offset < body.len() {
            let mut seed: Vec<u8> = Vec::with_capacity(4 + secret.len() + 2 + 16);
            seed.extend_from_slice(&header.session_id.to_be_bytes());
            seed.extend_from_slice(secret);
            seed.push(header.version);
            seed.push(header.seq_no);
            if let Some(prev_pad) = prev {
                seed.extend_from_slice(&prev_pad);
            }
            let digest = hash(MessageDigest::md5(), &seed)?;
            let digest: [u8; 16] = digest
                .as_ref()
                .try_into()
                .map_err(|_| anyhow!("unexpected MD5 digest length"))?;

            for (b, p) in body[offset..].iter_mut().zip(digest.iter()) {
                *b ^= *p;
            }
            offset += 16;
            prev = Some(digest);
        }
        Ok(())
    }
}
