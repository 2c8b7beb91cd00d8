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

//! Callback capabilities stored by the subscription registry.

use std::error::Error as StdError;

/// A message delivered to a subscription.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Message {
    pub subject: String,
    pub sid: u64,
    pub reply_to: Option<String>,
    pub payload: Vec<u8>,
}

/// Receives deliveries for one subscription.
///
/// Runs on the connection's reader thread: deliveries are sequential and in
/// server order, and a handler that blocks stalls every subscription on the
/// connection. Handlers may call back into the client.
pub trait MessageHandler: Send + Sync + 'static {
    fn on_message(&self, message: Message);

    /// Called once when the connection closes while the subscription is live.
    fn on_connection_closed(&self) {}
}

impl<F> MessageHandler for F
where
    F: Fn(Message) + Send + Sync + 'static,
{
    fn on_message(&self, message: Message) {
        self(message)
    }
}

pub type HandlerError = Box<dyn StdError + Send + Sync>;

/// Produces the reply for a request received by a responder.
pub trait RequestHandler: Send + Sync + 'static {
    fn handle(&self, subject: &str, payload: &[u8]) -> Result<Vec<u8>, HandlerError>;
}

impl<F> RequestHandler for F
where
    F: Fn(&str, &[u8]) -> Result<Vec<u8>, HandlerError> + Send + Sync + 'static,
{
    fn handle(&self, subject: &str, payload: &[u8]) -> Result<Vec<u8>, HandlerError> {
        self(subject, payload)
    }
}
