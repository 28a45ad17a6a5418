// SPDX-License-Identifier: AGPL-3.0-only
//! Scripted in-process TACACS+ server for the end-to-end tests.
//!
//! Accepts exactly one TCP connection, answers the scripted replies in
//! order (echoing each request header with seq_no + 1), then lingers until
//! the client closes. Every inbound frame is recorded with its body
//! already deobfuscated so tests can assert on wire content.

use std::net::SocketAddr;
use tacplus_proto::{HEADER_LEN, Header, open_body, seal_packet};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Serializes tests that share the process-wide client singleton.
pub static CLIENT_LOCK: Mutex<()> = Mutex::const_new(());

pub const SECRET: &str = "12345678";

#[allow(dead_code)]
pub enum Reply {
    Authen {
        status: u8,
        server_msg: &'static str,
    },
    Author {
        status: u8,
        args: Vec<&'static str>,
        server_msg: &'static str,
    },
    Acct {
        status: u8,
    },
    /// Read the request but never answer it.
    Silence,
}

pub struct InboundFrame {
    pub header: Header,
    pub body: Vec<u8>,
}

#[derive(Default)]
pub struct Report {
    pub connections: usize,
    pub frames: Vec<InboundFrame>,
}

pub struct MockServer {
    pub addr: SocketAddr,
    handle: JoinHandle<Report>,
}

impl MockServer {
    /// `reply_flags` goes into every reply header; set it to
    /// `FLAG_SINGLE_CONNECT` to advertise multiplexing support.
    pub async fn start(reply_flags: u8, replies: Vec<Reply>) -> MockServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(serve(listener, reply_flags, replies));
        MockServer { addr, handle }
    }

    pub async fn finish(self) -> Report {
        self.handle.await.unwrap()
    }
}

async fn serve(listener: TcpListener, reply_flags: u8, replies: Vec<Reply>) -> Report {
    let mut report = Report::default();
    let Ok((mut stream, _)) = listener.accept().await else {
        return report;
    };
    report.connections = 1;

    for reply in replies {
        let Some((header, body)) = read_frame(&mut stream).await else {
            return report;
        };
        report.frames.push(InboundFrame {
            header: header.clone(),
            body,
        });
        if let Some(frame) = encode_reply(&header, reply_flags, &reply) {
            stream.write_all(&frame).await.unwrap();
        }
    }

    // Script exhausted; wait for the client to hang up.
    let mut buf = [0u8; 1];
    let _ = stream.read(&mut buf).await;
    report
}

async fn read_frame(stream: &mut TcpStream) -> Option<(Header, Vec<u8>)> {
    let mut head = [0u8; HEADER_LEN];
    stream.read_exact(&mut head).await.ok()?;
    let header = Header::parse(&head).unwrap();
    let mut body = vec![0u8; header.length as usize];
    stream.read_exact(&mut body).await.ok()?;
    open_body(&header, &mut body, SECRET.as_bytes()).unwrap();
    Some((header, body))
}

fn encode_reply(request: &Header, reply_flags: u8, reply: &Reply) -> Option<Vec<u8>> {
    let body = match reply {
        Reply::Authen { status, server_msg } => authen_reply_body(*status, server_msg),
        Reply::Author {
            status,
            args,
            server_msg,
        } => author_reply_body(*status, args, server_msg),
        Reply::Acct { status } => acct_reply_body(*status),
        Reply::Silence => return None,
    };
    let header = Header {
        version: request.version,
        packet_type: request.packet_type,
        seq_no: request.seq_no + 1,
        flags: reply_flags,
        session_id: request.session_id,
        length: 0,
    };
    Some(seal_packet(&header, body, SECRET.as_bytes()).unwrap())
}

fn authen_reply_body(status: u8, server_msg: &str) -> Vec<u8> {
    let mut body = vec![status, 0x00];
    body.extend_from_slice(&(server_msg.len() as u16).to_be_bytes());
    body.extend_from_slice(&0u16.to_be_bytes());
    body.extend_from_slice(server_msg.as_bytes());
    body
}

fn author_reply_body(status: u8, args: &[&str], server_msg: &str) -> Vec<u8> {
    let mut body = vec![status, args.len() as u8];
    body.extend_from_slice(&(server_msg.len() as u16).to_be_bytes());
    body.extend_from_slice(&0u16.to_be_bytes());
    for arg in args {
        body.push(arg.len() as u8);
    }
    body.extend_from_slice(server_msg.as_bytes());
    for arg in args {
        body.extend_from_slice(arg.as_bytes());
    }
    body
}

fn acct_reply_body(status: u8) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&0u16.to_be_bytes());
    body.extend_from_slice(&0u16.to_be_bytes());
    body.push(status);
    body
}
