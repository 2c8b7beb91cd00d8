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

//! Canonical structured event names used across `natsline`.

// Connection lifecycle events.
pub const DIAL_START: &str = "dial_start";
pub const DIAL_OK: &str = "dial_ok";
pub const DIAL_FAILED: &str = "dial_failed";
pub const HANDSHAKE_INFO_RECEIVED: &str = "handshake_info_received";
pub const HANDSHAKE_INFO_UNPARSEABLE: &str = "handshake_info_unparseable";
pub const HANDSHAKE_CONNECT_SENT: &str = "handshake_connect_sent";
pub const HANDSHAKE_FAILED: &str = "handshake_failed";
pub const HANDSHAKE_TIMEOUT: &str = "handshake_timeout";
pub const CONNECTION_READY: &str = "connection_ready";
pub const CONNECTION_CLOSED: &str = "connection_closed";
pub const CLOSE_REQUESTED: &str = "close_requested";
pub const SEND_FAILED: &str = "send_failed";

// Reader loop events.
pub const READER_SPAWN_OK: &str = "reader_spawn_ok";
pub const READER_SPAWN_FAILED: &str = "reader_spawn_failed";
pub const READER_EXIT: &str = "reader_exit";
pub const PING_ANSWERED: &str = "ping_answered";
pub const SERVER_ERROR: &str = "server_error";
pub const ASYNC_INFO_IGNORED: &str = "async_info_ignored";
pub const MALFORMED_FRAME_SKIPPED: &str = "malformed_frame_skipped";
pub const UNKNOWN_LINE_IGNORED: &str = "unknown_line_ignored";
pub const MESSAGE_DISPATCHED: &str = "message_dispatched";
pub const MESSAGE_UNROUTED: &str = "message_unrouted";
pub const HANDLER_PANICKED: &str = "handler_panicked";

// Subscription registry events.
pub const SUBSCRIPTION_ADDED: &str = "subscription_added";
pub const SUBSCRIPTION_REMOVED: &str = "subscription_removed";
pub const SUBSCRIPTION_AUTO_REMOVED: &str = "subscription_auto_removed";

// Request/reply events.
pub const REQUEST_TIMEOUT: &str = "request_timeout";
pub const REQUEST_LATE_REPLY_DROPPED: &str = "request_late_reply_dropped";
pub const REQUEST_CLEANUP_FAILED: &str = "request_cleanup_failed";
pub const RESPONDER_NO_REPLY_SUBJECT: &str = "responder_no_reply_subject";
pub const RESPONDER_HANDLER_FAILED: &str = "responder_handler_failed";
pub const RESPONDER_PUBLISH_FAILED: &str = "responder_publish_failed";
