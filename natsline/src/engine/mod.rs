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

//! Connection engine: state machine, serialized write path and dispatch.
//!
//! Lock order: the state lock may be held while taking the transport slot,
//! never the other way round. The write lock is always taken last and no other
//! lock is acquired while it is held. No lock is held while a handler runs.

pub(crate) mod reader;
mod state;

pub use state::ConnectionState;

use crate::error::{Error, Result};
use crate::handler::{Message, MessageHandler};
use crate::observability::{events, fields};
use crate::options::Options;
use crate::protocol::codec::{self, MsgHeader};
use crate::protocol::ServerInfo;
use crate::registry::SubscriptionRegistry;
use crate::transport::Transport;
use parking_lot::{Condvar, Mutex};
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

const COMPONENT: &str = "connection_engine";

pub(crate) struct ConnectionEngine {
    options: Options,
    state: Mutex<ConnectionState>,
    state_changed: Condvar,
    handshake_error: Mutex<Option<String>>,
    server_info: OnceLock<ServerInfo>,
    transport: Mutex<Option<Arc<dyn Transport>>>,
    write_lock: Mutex<()>,
    registry: SubscriptionRegistry,
}

impl ConnectionEngine {
    pub(crate) fn new(options: Options) -> Self {
        Self {
            options,
            state: Mutex::new(ConnectionState::Idle),
            state_changed: Condvar::new(),
            handshake_error: Mutex::new(None),
            server_info: OnceLock::new(),
            transport: Mutex::new(None),
            write_lock: Mutex::new(()),
            registry: SubscriptionRegistry::new(),
        }
    }

    pub(crate) fn options(&self) -> &Options {
        &self.options
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub(crate) fn server_info(&self) -> Option<ServerInfo> {
        self.server_info.get().cloned()
    }

    pub(crate) fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Moves `Idle` to `Connecting`. Returns `false` when a dial is not needed
    /// because another caller already started one or the handshake is done.
    pub(crate) fn begin_connect(&self) -> Result<bool> {
        let mut state = self.state.lock();
        match *state {
            ConnectionState::Idle => {
                *state = ConnectionState::Connecting;
                Ok(true)
            }
            ConnectionState::Connecting | ConnectionState::Ready => Ok(false),
            ConnectionState::Closed => Err(Error::Closed),
        }
    }

    /// Hands the dialed transport to the engine; refused once the engine closed.
    pub(crate) fn install_transport(&self, transport: Arc<dyn Transport>) -> bool {
        let state = self.state.lock();
        if *state != ConnectionState::Connecting {
            drop(state);
            transport.shutdown();
            return false;
        }
        *self.transport.lock() = Some(transport);
        true
    }

    pub(crate) fn record_server_info(&self, info: ServerInfo) {
        let _ = self.server_info.set(info);
    }

    /// `Connecting` -> `Ready`, waking the blocked `connect` caller.
    pub(crate) fn mark_ready(&self) -> bool {
        let mut state = self.state.lock();
        if *state != ConnectionState::Connecting {
            return false;
        }
        *state = ConnectionState::Ready;
        self.state_changed.notify_all();
        drop(state);

        info!(
            event = events::CONNECTION_READY,
            component = COMPONENT,
            address = self.options.address().as_str(),
            "connection ready"
        );
        true
    }

    pub(crate) fn fail_handshake(&self, reason: String) {
        *self.handshake_error.lock() = Some(reason);
        self.shut_down(fields::REASON_HANDSHAKE_FAILED);
    }

    /// Blocks until the handshake finishes, fails, or `deadline` passes.
    pub(crate) fn wait_until_ready(&self, deadline: Instant, timeout: Duration) -> Result<()> {
        let mut state = self.state.lock();
        while *state == ConnectionState::Connecting {
            if self
                .state_changed
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                break;
            }
        }
        let current = *state;
        drop(state);

        match current {
            ConnectionState::Ready => Ok(()),
            ConnectionState::Connecting => {
                warn!(
                    event = events::HANDSHAKE_TIMEOUT,
                    component = COMPONENT,
                    address = self.options.address().as_str(),
                    timeout_ms = timeout.as_millis() as u64,
                    "handshake did not complete in time"
                );
                Err(Error::HandshakeTimeout(timeout))
            }
            ConnectionState::Closed => Err(self
                .handshake_error
                .lock()
                .clone()
                .map(Error::HandshakeFailed)
                .unwrap_or(Error::Closed)),
            ConnectionState::Idle => Err(Error::NotConnected),
        }
    }

    /// Blocks until the engine is `Closed`. Only valid once `Ready`.
    pub(crate) fn wait_until_closed(&self) -> Result<()> {
        let mut state = self.state.lock();
        if *state != ConnectionState::Ready {
            return Err(Error::NotConnected);
        }
        while *state != ConnectionState::Closed {
            self.state_changed.wait(&mut state);
        }
        Ok(())
    }

    /// Moves to `Closed`: tears down the transport, wakes every waiter and
    /// notifies live handlers. Returns `false` if the engine was already closed.
    pub(crate) fn shut_down(&self, reason: &'static str) -> bool {
        let previous = {
            let mut state = self.state.lock();
            let previous = *state;
            *state = ConnectionState::Closed;
            self.state_changed.notify_all();
            previous
        };
        if previous == ConnectionState::Closed {
            return false;
        }

        if let Some(transport) = self.transport.lock().take() {
            transport.shutdown();
        }

        let handlers = self.registry.drain();
        for handler in &handlers {
            handler.on_connection_closed();
        }

        info!(
            event = events::CONNECTION_CLOSED,
            component = COMPONENT,
            previous_state = %previous,
            reason,
            dropped_subscriptions = handlers.len(),
            "connection closed"
        );
        true
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.state() {
            ConnectionState::Ready => Ok(()),
            _ => Err(Error::NotConnected),
        }
    }

    /// Writes `parts` back to back while holding the write lock.
    pub(crate) fn try_write(&self, parts: &[&[u8]]) -> io::Result<()> {
        let transport = self.transport.lock().clone().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "transport is not installed")
        })?;

        let _serialized = self.write_lock.lock();
        for part in parts {
            transport.write_all(part)?;
        }
        transport.flush()
    }

    /// Like [`Self::try_write`], but a failed write closes the connection.
    pub(crate) fn write_frame(&self, parts: &[&[u8]]) -> Result<()> {
        self.try_write(parts).map_err(|err| {
            if err.kind() == io::ErrorKind::NotConnected {
                return Error::NotConnected;
            }
            warn!(
                event = events::SEND_FAILED,
                component = COMPONENT,
                err = %err,
                "frame write failed; closing connection"
            );
            self.shut_down(fields::REASON_WRITE_FAILED);
            Error::SendFailed(err)
        })
    }

    pub(crate) fn publish(&self, subject: &str, reply_to: Option<&str>, payload: &[u8]) -> Result<()> {
        codec::validate_subject(subject)?;
        if let Some(reply_to) = reply_to {
            codec::validate_subject(reply_to)?;
        }
        self.ensure_ready()?;

        if let Some(max) = self
            .server_info
            .get()
            .map(|info| info.max_payload)
            .filter(|max| *max > 0)
        {
            if payload.len() > max {
                return Err(Error::PayloadTooLarge {
                    size: payload.len(),
                    max,
                });
            }
        }

        let header = codec::encode_publish(subject, reply_to, payload.len());
        self.write_frame(&[header.as_bytes(), payload, codec::CRLF])
    }

    /// Registers `handler` first, then sends SUB, so the entry exists before
    /// any delivery can reference it.
    pub(crate) fn subscribe(
        &self,
        subject: &str,
        queue_group: Option<&str>,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<u64> {
        codec::validate_subject(subject)?;
        if let Some(queue_group) = queue_group {
            codec::validate_subject(queue_group)?;
        }
        self.ensure_ready()?;

        let sid = self.registry.add(subject, handler);
        let frame = codec::encode_subscribe(subject, queue_group, sid);
        if let Err(err) = self.write_frame(&[frame.as_bytes()]) {
            self.registry.remove(sid);
            return Err(err);
        }
        Ok(sid)
    }

    pub(crate) fn unsubscribe(&self, sid: u64, max_messages: Option<u64>) -> Result<()> {
        self.ensure_ready()?;

        match max_messages {
            None => {
                self.registry.remove(sid);
            }
            Some(max_messages) => self.registry.limit(sid, max_messages),
        }

        let frame = codec::encode_unsubscribe(sid, max_messages);
        self.write_frame(&[frame.as_bytes()])
    }

    /// Runs the handler registered for `header.sid` on the calling (reader) thread.
    pub(crate) fn dispatch(&self, header: MsgHeader, payload: Vec<u8>) {
        if self.state() == ConnectionState::Closed {
            return;
        }

        let Some(handler) = self.registry.lookup(header.sid) else {
            debug!(
                event = events::MESSAGE_UNROUTED,
                component = COMPONENT,
                sid = header.sid,
                subject = header.subject.as_str(),
                "dropping message for unknown subscription"
            );
            return;
        };

        trace!(
            event = events::MESSAGE_DISPATCHED,
            component = COMPONENT,
            sid = header.sid,
            subject = header.subject.as_str(),
            reply_to = fields::format_reply_to(header.reply_to.as_deref()),
            payload_len = payload.len(),
            "dispatching message"
        );

        let sid = header.sid;
        let message = Message {
            subject: header.subject,
            sid,
            reply_to: header.reply_to,
            payload,
        };
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler.on_message(message))) {
            warn!(
                event = events::HANDLER_PANICKED,
                component = COMPONENT,
                sid,
                panic = fields::panic_message(panic.as_ref()),
                "message handler panicked"
            );
        }
    }
}
