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

//! Error kinds surfaced by the public client operations.

use std::io;
use std::time::Duration;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure a caller can observe, one variant per cause.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The operation requires a connection that has completed its handshake.
    #[error("not connected")]
    NotConnected,

    /// `connect` was called on a client that has already been closed.
    #[error("connection is closed; create a new client to reconnect")]
    Closed,

    /// The transport could not be dialed.
    #[error("unable to connect to {address}: {source}")]
    ConnectFailed {
        address: String,
        #[source]
        source: io::Error,
    },

    /// The server greeting was missing or invalid, or CONNECT could not be sent.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// No INFO/CONNECT exchange completed within the configured bound.
    #[error("handshake did not complete within {0:?}")]
    HandshakeTimeout(Duration),

    /// Writing a frame failed; the connection has been closed.
    #[error("failed to send frame: {0}")]
    SendFailed(#[source] io::Error),

    /// No reply arrived on the request inbox in time.
    #[error("request on {subject} timed out after {timeout:?}")]
    RequestTimeout { subject: String, timeout: Duration },

    /// The payload exceeds the `max_payload` advertised by the server.
    #[error("payload of {size} bytes exceeds server max_payload of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    /// A subject, reply subject or queue group that cannot be put on the wire.
    #[error("invalid subject {0:?}")]
    InvalidSubject(String),

    /// The server URL could not be parsed into options.
    #[error("invalid server url {0:?}")]
    InvalidUrl(String),
}
