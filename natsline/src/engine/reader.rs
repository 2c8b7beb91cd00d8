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

//! Body of the reader thread: handshake, then frame loop until the stream ends.

use super::{ConnectionEngine, ConnectionState};
use crate::error::Error;
use crate::observability::{events, fields};
use crate::protocol::codec::{self, ServerOp};
use crate::protocol::ServerInfo;
use crate::transport::LineReader;
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

const COMPONENT: &str = "reader";

/// Longest slice of an offending line echoed into logs and errors.
const LINE_PREVIEW: usize = 80;

enum ReaderExit {
    LocalClose,
    EndOfStream,
    ReadFailed(io::Error),
    PayloadReadFailed(io::Error),
    WriteFailed(Error),
}

impl ReaderExit {
    fn from_read_error(engine: &ConnectionEngine, err: io::Error, payload: bool) -> Self {
        if engine.state() == ConnectionState::Closed {
            ReaderExit::LocalClose
        } else if payload {
            ReaderExit::PayloadReadFailed(err)
        } else if err.kind() == io::ErrorKind::UnexpectedEof {
            ReaderExit::EndOfStream
        } else {
            ReaderExit::ReadFailed(err)
        }
    }

    fn reason(&self) -> &'static str {
        match self {
            ReaderExit::LocalClose => fields::REASON_LOCAL_CLOSE,
            ReaderExit::EndOfStream => fields::REASON_END_OF_STREAM,
            ReaderExit::ReadFailed(_) => fields::REASON_READ_FAILED,
            ReaderExit::PayloadReadFailed(_) => fields::REASON_PAYLOAD_READ_FAILED,
            ReaderExit::WriteFailed(_) => fields::REASON_WRITE_FAILED,
        }
    }

    fn detail(&self) -> String {
        match self {
            ReaderExit::LocalClose | ReaderExit::EndOfStream => fields::NONE.to_string(),
            ReaderExit::ReadFailed(err) | ReaderExit::PayloadReadFailed(err) => err.to_string(),
            ReaderExit::WriteFailed(err) => err.to_string(),
        }
    }
}

/// Runs the reader to completion. The engine is closed on every exit path,
/// including a panic inside the loop.
pub(crate) fn run(engine: Arc<ConnectionEngine>, lines: LineReader) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| drive(&engine, lines))) {
        let message = fields::panic_message(panic.as_ref());
        error!(
            event = events::READER_EXIT,
            component = COMPONENT,
            reason = fields::REASON_READER_PANICKED,
            panic = message,
            "reader thread panicked"
        );
        if engine.state() == ConnectionState::Connecting {
            engine.fail_handshake(format!("reader panicked: {message}"));
        } else {
            engine.shut_down(fields::REASON_READER_PANICKED);
        }
    }
}

fn drive(engine: &ConnectionEngine, mut lines: LineReader) {
    match handshake(engine, &mut lines) {
        Ok(()) => {}
        Err(_) if engine.state() == ConnectionState::Closed => {
            debug!(
                event = events::READER_EXIT,
                component = COMPONENT,
                reason = fields::REASON_LOCAL_CLOSE,
                "reader stopped during handshake"
            );
            return;
        }
        Err(reason) => {
            warn!(
                event = events::HANDSHAKE_FAILED,
                component = COMPONENT,
                reason = reason.as_str(),
                "handshake failed"
            );
            engine.fail_handshake(reason);
            return;
        }
    }

    let exit = read_loop(engine, &mut lines);
    info!(
        event = events::READER_EXIT,
        component = COMPONENT,
        reason = exit.reason(),
        err = exit.detail().as_str(),
        "reader loop finished"
    );
    engine.shut_down(exit.reason());
}

fn handshake(engine: &ConnectionEngine, lines: &mut LineReader) -> Result<(), String> {
    let line = lines
        .read_line()
        .map_err(|err| format!("no server greeting: {err}"))?;

    let json = match codec::decode_line(&line) {
        Ok(ServerOp::Info(json)) => json,
        _ => return Err(format!("expected INFO greeting, got {:?}", preview(&line))),
    };

    let info = ServerInfo::parse(&json).unwrap_or_else(|err| {
        warn!(
            event = events::HANDSHAKE_INFO_UNPARSEABLE,
            component = COMPONENT,
            err = %err,
            "server INFO is not valid JSON; continuing with defaults"
        );
        ServerInfo::default()
    });
    debug!(
        event = events::HANDSHAKE_INFO_RECEIVED,
        component = COMPONENT,
        server_id = info.server_id.as_str(),
        server_version = info.version.as_str(),
        headers = info.headers,
        max_payload = info.max_payload,
        "received server INFO"
    );
    if info.tls_required {
        warn!(
            event = events::HANDSHAKE_INFO_RECEIVED,
            component = COMPONENT,
            "server requires TLS, which this client does not negotiate"
        );
    }
    lines.set_payload_limit(info.max_payload);
    engine.record_server_info(info);

    let connect = codec::encode_connect(engine.options())
        .map_err(|err| format!("unable to encode CONNECT: {err}"))?;
    engine
        .try_write(&[connect.as_bytes()])
        .map_err(|err| format!("unable to send CONNECT: {err}"))?;
    debug!(
        event = events::HANDSHAKE_CONNECT_SENT,
        component = COMPONENT,
        "sent CONNECT"
    );

    if !engine.mark_ready() {
        return Err("connection closed during handshake".to_string());
    }
    Ok(())
}

fn read_loop(engine: &ConnectionEngine, lines: &mut LineReader) -> ReaderExit {
    loop {
        let line = match lines.read_line() {
            Ok(line) => line,
            Err(err) => return ReaderExit::from_read_error(engine, err, false),
        };

        match codec::decode_line(&line) {
            Ok(ServerOp::Msg(header)) => {
                let payload = match lines.read_payload(header.payload_len) {
                    Ok(payload) => payload,
                    Err(err) => return ReaderExit::from_read_error(engine, err, true),
                };
                engine.dispatch(header, payload);
            }
            Ok(ServerOp::Ping) => {
                if let Err(err) = engine.write_frame(&[codec::PONG]) {
                    return ReaderExit::WriteFailed(err);
                }
                trace!(
                    event = events::PING_ANSWERED,
                    component = COMPONENT,
                    "answered PING"
                );
            }
            Ok(ServerOp::Pong) | Ok(ServerOp::Ok) => {}
            Ok(ServerOp::Err(text)) => warn!(
                event = events::SERVER_ERROR,
                component = COMPONENT,
                err = text.as_str(),
                "server reported an error"
            ),
            Ok(ServerOp::Info(_)) => debug!(
                event = events::ASYNC_INFO_IGNORED,
                component = COMPONENT,
                "ignoring INFO after handshake"
            ),
            Ok(ServerOp::Unknown(line)) => debug!(
                event = events::UNKNOWN_LINE_IGNORED,
                component = COMPONENT,
                line = preview(&line),
                "ignoring unrecognized line"
            ),
            Err(frame_err) => {
                warn!(
                    event = events::MALFORMED_FRAME_SKIPPED,
                    component = COMPONENT,
                    reason = frame_err.reason.as_str(),
                    line = preview(&line),
                    "skipping malformed frame"
                );
                if let Some(len) = frame_err.payload_len {
                    if let Err(err) = lines.read_payload(len) {
                        return ReaderExit::from_read_error(engine, err, true);
                    }
                }
            }
        }
    }
}

fn preview(line: &str) -> &str {
    match line.char_indices().nth(LINE_PREVIEW) {
        Some((end, _)) => &line[..end],
        None => line,
    }
}
