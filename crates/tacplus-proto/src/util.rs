// SPDX-License-Identifier: AGPL-3.0-only
//! Shared parsing helpers for TACACS+ packet bodies.

use anyhow::{Context, Result, anyhow, ensure};

pub fn read_bytes(body: &[u8], offset: usize, len: usize, label: &str) -> Result<(Vec<u8>, usize)> {
    let next = offset
        .checked_add(len)
        .ok_or_else(|| anyhow!("overflow parsing {label}"))?;
    let slice = body
        .get(offset..next)
        .ok_or_else(|| anyhow!("{label} truncated"))?;
    Ok((slice.to_vec(), next))
}

pub fn read_string(body: &[u8], offset: usize, len: usize, label: &str) -> Result<(String, usize)> {
    let (raw, next) = read_bytes(body, offset, len, label)?;
    let value = String::from_utf8(raw).with_context(|| format!("decoding {label} as UTF-8"))?;
    Ok((value, next))
}

/// One attribute-value pair. A `=` separator marks the attribute mandatory,
/// `*` marks it optional; a string without either separator is a bare name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: Option<String>,
    pub optional: bool,
}

pub fn split_attribute(arg: &str) -> Attribute {
    let sep = arg.find(['=', '*']);
    match sep {
        Some(idx) => {
            let (name, rest) = arg.split_at(idx);
            Attribute {
                name: name.to_string(),
                value: Some(rest[1..].to_string()),
                optional: rest.starts_with('*'),
            }
        }
        None => Attribute {
            name: arg.to_string(),
            value: None,
            optional: false,
        },
    }
}

/// Argument strings ride the wire behind one-byte length prefixes, so each
/// must be nonempty and at most 255 bytes, and there can be at most 255.
pub fn validate_args(args: &[String]) -> Result<()> {
    ensure!(args.len() <= u8::MAX as usize, "more than 255 arguments");
    for (idx, arg) in args.iter().enumerate() {
        ensure!(!arg.is_empty(), "arg[{idx}] is empty");
        ensure!(arg.len() <= u8::MAX as usize, "arg[{idx}] exceeds 255 bytes");
    }
    Ok(())
}
