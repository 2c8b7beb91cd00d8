/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Pure translation between protocol commands and wire text.
//!
//! Nothing here performs I/O. A decoded `MSG` header only describes the payload
//! that follows it; reading those bytes is left to the reader loop.

use crate::error::{Error, Result};
use crate::options::Options;
use crate::protocol::server_info::ConnectInfo;
use std::fmt;

pub const CRLF: &[u8] = b"\r\n";
pub const PONG: &[u8] = b"PONG\r\n";

/// One decoded control line received from the server.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ServerOp {
    /// Raw JSON body of an INFO line.
    Info(String),
    Msg(MsgHeader),
    Ping,
    Pong,
    Ok,
    Err(String),
    Unknown(String),
}

/// Header of a `MSG` delivery; `payload_len` bytes plus CRLF follow on the wire.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MsgHeader {
    pub subject: String,
    pub sid: u64,
    pub reply_to: Option<String>,
    pub payload_len: usize,
}

/// A control line that could not be decoded.
///
/// `payload_len` is set when the line announced a payload whose size is still
/// known, so the caller can discard it and stay aligned with the stream.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FrameError {
    pub reason: String,
    pub payload_len: Option<usize>,
}

impl FrameError {
    fn new(reason: impl Into<String>, payload_len: Option<usize>) -> Self {
        Self {
            reason: reason.into(),
            payload_len,
        }
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

impl std::error::Error for FrameError {}

pub fn encode_connect(options: &Options) -> std::result::Result<String, serde_json::Error> {
    let body = serde_json::to_string(&ConnectInfo::from(options))?;
    Ok(format!("CONNECT {body}\r\n"))
}

/// Header line of a publish; the payload and a CRLF must be written after it.
pub fn encode_publish(subject: &str, reply_to: Option<&str>, payload_len: usize) -> String {
    match reply_to {
        Some(reply_to) => format!("PUB {subject} {reply_to} {payload_len}\r\n"),
        None => format!("PUB {subject} {payload_len}\r\n"),
    }
}

pub fn encode_subscribe(subject: &str, queue_group: Option<&str>, sid: u64) -> String {
    match queue_group {
        Some(queue_group) => format!("SUB {subject} {queue_group} {sid}\r\n"),
        None => format!("SUB {subject} {sid}\r\n"),
    }
}

pub fn encode_unsubscribe(sid: u64, max_messages: Option<u64>) -> String {
    match max_messages {
        Some(max_messages) => format!("UNSUB {sid} {max_messages}\r\n"),
        None => format!("UNSUB {sid}\r\n"),
    }
}

/// Decodes one terminator-stripped control line.
pub fn decode_line(line: &str) -> std::result::Result<ServerOp, FrameError> {
    let line = line.trim_start();
    let (op, rest) = match line.split_once(|c: char| c.is_ascii_whitespace()) {
        Some((op, rest)) => (op, rest.trim()),
        None => (line.trim_end(), ""),
    };

    if op.eq_ignore_ascii_case("MSG") {
        return decode_msg(rest).map(ServerOp::Msg);
    }
    if op.eq_ignore_ascii_case("PING") {
        return Ok(ServerOp::Ping);
    }
    if op.eq_ignore_ascii_case("PONG") {
        return Ok(ServerOp::Pong);
    }
    if op.eq_ignore_ascii_case("+OK") {
        return Ok(ServerOp::Ok);
    }
    if op.eq_ignore_ascii_case("-ERR") {
        return Ok(ServerOp::Err(rest.trim_matches('\'').to_string()));
    }
    if op.eq_ignore_ascii_case("INFO") {
        return Ok(ServerOp::Info(rest.to_string()));
    }
    Ok(ServerOp::Unknown(line.to_string()))
}

// MSG <subject> <sid> [reply-to] <#bytes>
fn decode_msg(args: &str) -> std::result::Result<MsgHeader, FrameError> {
    let tokens: Vec<&str> = args.split_ascii_whitespace().collect();
    if tokens.len() < 3 {
        return Err(FrameError::new(
            format!("MSG needs at least 4 tokens, got {}", tokens.len() + 1),
            None,
        ));
    }

    let payload_len = tokens[tokens.len() - 1].parse::<usize>().ok();
    if tokens.len() > 4 {
        return Err(FrameError::new(
            format!("MSG has {} tokens, expected 4 or 5", tokens.len() + 1),
            payload_len,
        ));
    }
    let payload_len = payload_len.ok_or_else(|| {
        FrameError::new(
            format!("invalid MSG byte count {:?}", tokens[tokens.len() - 1]),
            None,
        )
    })?;
    let sid = tokens[1].parse::<u64>().map_err(|_| {
        FrameError::new(
            format!("invalid MSG subscription id {:?}", tokens[1]),
            Some(payload_len),
        )
    })?;

    Ok(MsgHeader {
        subject: tokens[0].to_string(),
        sid,
        reply_to: (tokens.len() == 4).then(|| tokens[2].to_string()),
        payload_len,
    })
}

/// Rejects names that would corrupt a control line.
pub fn validate_subject(subject: &str) -> Result<()> {
    if subject.is_empty() || subject.chars().any(|c| c.is_whitespace()) {
        return Err(Error::InvalidSubject(subject.to_string()));
    }
    Ok(())
}
