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

//! # natsline
//!
//! `natsline` is a blocking client for the NATS text protocol: publish,
//! subscribe with wildcards and queue groups, and request/reply over a single
//! TCP connection.
//!
//! Typical usage is centered on [`Client`]. A background reader thread owns the
//! inbound half of the connection; it answers server keepalives and runs
//! message handlers one at a time, in the order the server sent the messages.
//!
//! ## Quick start
//!
//! ```no_run
//! use natsline::{Client, Message, Options};
//! use std::time::Duration;
//!
//! let client = Client::new(Options::default().with_name("quick-start"));
//! client.connect()?;
//!
//! client.subscribe("greet.*", |message: Message| {
//!     println!("{}: {:?}", message.subject, message.payload);
//! })?;
//! client.publish("greet.joe", b"hello")?;
//!
//! client.respond("time.now", |_subject: &str, _payload: &[u8]| -> Result<Vec<u8>, natsline::HandlerError> {
//!     Ok(b"noon".to_vec())
//! })?;
//! let reply = client.request("time.now", b"", Duration::from_secs(1))?;
//! assert_eq!(reply, b"noon");
//!
//! client.close();
//! # Ok::<(), natsline::Error>(())
//! ```
//!
//! ## Connection lifecycle
//!
//! A client moves through [`ConnectionState`] `Idle -> Connecting -> Ready ->
//! Closed`. Operations other than `connect`, `close`, and the accessors return
//! [`Error::NotConnected`] unless the client is `Ready`. A closed client never
//! reconnects; build a new one instead.
//!
//! ## Observability model
//!
//! Runtime logs are emitted through `tracing` with stable structured fields:
//! `event` names come from [`observability::events`] and every event carries a
//! `component`. Connection-level events also carry `reason` values from
//! [`observability::fields`] so a closed connection can be traced back to what
//! closed it. Subscribers are configured by the application, usually with
//! `tracing_subscriber` and `RUST_LOG`.

mod client;
mod engine;
mod error;
mod handler;
pub mod observability;
mod options;
pub mod protocol;
mod registry;
mod request_reply;
mod runtime;
mod transport;

pub use client::Client;
pub use engine::ConnectionState;
pub use error::{Error, Result};
pub use handler::{HandlerError, Message, MessageHandler, RequestHandler};
pub use options::Options;
pub use protocol::ServerInfo;
pub use transport::{
    DialedConnection, Dialer, LineReader, TcpDialer, Transport, MAX_CONTROL_LINE, MAX_PAYLOAD,
};
