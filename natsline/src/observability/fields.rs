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

//! Canonical structured field keys and value-format helpers.

use std::any::Any;

pub const EVENT: &str = "event";
pub const COMPONENT: &str = "component";
pub const ADDRESS: &str = "address";
pub const READER_THREAD: &str = "reader_thread";
pub const SID: &str = "sid";
pub const SUBJECT: &str = "subject";
pub const REPLY_TO: &str = "reply_to";
pub const PAYLOAD_LEN: &str = "payload_len";
pub const REASON: &str = "reason";
pub const ERR: &str = "err";

pub const NONE: &str = "none";
pub const DEFAULT_READER_THREAD: &str = "unknown-thread";

// Values of the `reason` field on `connection_closed` / `reader_exit`.
pub const REASON_LOCAL_CLOSE: &str = "local_close";
pub const REASON_END_OF_STREAM: &str = "end_of_stream";
pub const REASON_READ_FAILED: &str = "read_failed";
pub const REASON_WRITE_FAILED: &str = "write_failed";
pub const REASON_PAYLOAD_READ_FAILED: &str = "payload_read_failed";
pub const REASON_HANDSHAKE_FAILED: &str = "handshake_failed";
pub const REASON_DIAL_FAILED: &str = "dial_failed";
pub const REASON_READER_PANICKED: &str = "reader_panicked";

pub fn thread_name_or_default(thread_name: Option<&str>) -> String {
    thread_name.unwrap_or(DEFAULT_READER_THREAD).to_string()
}

pub fn current_thread_name_or_default() -> String {
    thread_name_or_default(std::thread::current().name())
}

pub fn format_reply_to(reply_to: Option<&str>) -> &str {
    reply_to.unwrap_or(NONE)
}

/// Text carried by a caught panic payload.
pub fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
