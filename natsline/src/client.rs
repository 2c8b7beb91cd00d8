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

//! Public client facade.

use crate::engine::{reader, ConnectionEngine, ConnectionState};
use crate::error::{Error, Result};
use crate::handler::{MessageHandler, RequestHandler};
use crate::observability::{events, fields};
use crate::options::Options;
use crate::protocol::ServerInfo;
use crate::request_reply;
use crate::runtime::reader_runtime;
use crate::transport::{Dialer, LineReader, TcpDialer};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const COMPONENT: &str = "client";

/// One connection to a message server.
///
/// Every method takes `&self`; share the client across threads with an `Arc`.
/// Dropping the client closes the connection.
pub struct Client {
    engine: Arc<ConnectionEngine>,
    dialer: Arc<dyn Dialer>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    /// Creates an idle client that dials over TCP. No I/O happens until [`Client::connect`].
    pub fn new(options: Options) -> Self {
        Self::with_dialer(options, Arc::new(TcpDialer))
    }

    /// Creates an idle client that opens its byte stream through `dialer`.
    pub fn with_dialer(options: Options, dialer: Arc<dyn Dialer>) -> Self {
        Self {
            engine: Arc::new(ConnectionEngine::new(options)),
            dialer,
            reader: Mutex::new(None),
        }
    }

    pub fn options(&self) -> &Options {
        self.engine.options()
    }

    pub fn state(&self) -> ConnectionState {
        self.engine.state()
    }

    /// The server's INFO greeting, once the handshake has read it.
    pub fn server_info(&self) -> Option<ServerInfo> {
        self.engine.server_info()
    }

    /// Number of live subscriptions, request inboxes included.
    pub fn subscription_count(&self) -> usize {
        self.engine.registry().len()
    }

    /// Dials the server and completes the INFO/CONNECT handshake.
    ///
    /// Returns once the connection is ready, or fails after the configured
    /// handshake timeout. A timed-out client stays in `Connecting` until
    /// [`Client::close`]. Calling `connect` on a ready client is a no-op.
    pub fn connect(&self) -> Result<()> {
        let timeout = self.engine.options().handshake_timeout();
        let deadline = Instant::now() + timeout;

        if !self.engine.begin_connect()? {
            return self.engine.wait_until_ready(deadline, timeout);
        }

        let address = self.engine.options().address();
        debug!(
            event = events::DIAL_START,
            component = COMPONENT,
            address = address.as_str(),
            "dialing server"
        );
        let connection = match self.dialer.dial(&address, timeout) {
            Ok(connection) => connection,
            Err(source) => {
                warn!(
                    event = events::DIAL_FAILED,
                    component = COMPONENT,
                    address = address.as_str(),
                    err = %source,
                    "unable to reach server"
                );
                self.engine.shut_down(fields::REASON_DIAL_FAILED);
                return Err(Error::ConnectFailed { address, source });
            }
        };
        debug!(
            event = events::DIAL_OK,
            component = COMPONENT,
            address = address.as_str(),
            "transport established"
        );

        {
            let mut reader_slot = self.reader.lock();
            if !self.engine.install_transport(connection.transport) {
                return Err(Error::Closed);
            }
            let spawned = reader_runtime::spawn_reader_loop(
                self.engine.clone(),
                LineReader::new(connection.reader),
                reader::run,
            );
            match spawned {
                Ok(handle) => *reader_slot = Some(handle),
                Err(source) => {
                    self.engine.shut_down(fields::REASON_READ_FAILED);
                    return Err(Error::ConnectFailed { address, source });
                }
            }
        }

        self.engine.wait_until_ready(deadline, timeout)
    }

    /// Closes the connection and waits for the reader thread to finish.
    ///
    /// Idempotent and valid in any state. Every blocked `request` and
    /// `run_forever` returns. When called from a message handler the reader
    /// is not joined; it exits as soon as the handler returns.
    pub fn close(&self) {
        if self.engine.shut_down(fields::REASON_LOCAL_CLOSE) {
            info!(
                event = events::CLOSE_REQUESTED,
                component = COMPONENT,
                closing_thread = %fields::current_thread_name_or_default(),
                "client closed"
            );
        }

        let handle = self.reader.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!(
                    event = events::READER_EXIT,
                    component = COMPONENT,
                    "reader thread panicked"
                );
            }
        }
    }

    /// Blocks until the connection is closed, locally or by the server.
    pub fn run_forever(&self) -> Result<()> {
        self.engine.wait_until_closed()
    }

    /// Publishes `payload` on `subject`.
    pub fn publish(&self, subject: &str, payload: &[u8]) -> Result<()> {
        self.engine.publish(subject, None, payload)
    }

    /// Publishes `payload` on `subject`, asking receivers to answer on `reply_to`.
    pub fn publish_with_reply(&self, subject: &str, reply_to: &str, payload: &[u8]) -> Result<()> {
        self.engine.publish(subject, Some(reply_to), payload)
    }

    /// Registers `handler` for `subject` and returns the subscription id.
    ///
    /// `subject` may contain the server's `*` and `>` wildcards.
    pub fn subscribe<H: MessageHandler>(&self, subject: &str, handler: H) -> Result<u64> {
        self.engine.subscribe(subject, None, Arc::new(handler))
    }

    /// Like [`Client::subscribe`]; the server delivers each message to one member of `queue_group`.
    pub fn queue_subscribe<H: MessageHandler>(
        &self,
        subject: &str,
        queue_group: &str,
        handler: H,
    ) -> Result<u64> {
        self.engine
            .subscribe(subject, Some(queue_group), Arc::new(handler))
    }

    /// Stops delivery for `sid`.
    ///
    /// With `max_messages` the server stops after that many deliveries in
    /// total and the local entry goes away once the last one is dispatched.
    /// Without it no callback fires for `sid` after this returns. Unknown ids
    /// are not an error.
    pub fn unsubscribe(&self, sid: u64, max_messages: Option<u64>) -> Result<()> {
        self.engine.unsubscribe(sid, max_messages)
    }

    /// Publishes `payload` on `subject` and waits up to `timeout` for the first reply.
    ///
    /// Calling this from a message handler blocks the reader thread, so the
    /// reply cannot be delivered and the call ends with `RequestTimeout`.
    pub fn request(&self, subject: &str, payload: &[u8], timeout: Duration) -> Result<Vec<u8>> {
        request_reply::request(&self.engine, subject, payload, timeout)
    }

    /// Answers every request on `subject` with the output of `handler`.
    ///
    /// A handler error is sent back as the text `error: <message>`.
    pub fn respond<H: RequestHandler>(&self, subject: &str, handler: H) -> Result<u64> {
        request_reply::respond(&self.engine, subject, None, handler)
    }

    /// Like [`Client::respond`], sharing the load with other members of `queue_group`.
    pub fn queue_respond<H: RequestHandler>(
        &self,
        subject: &str,
        queue_group: &str,
        handler: H,
    ) -> Result<u64> {
        request_reply::respond(&self.engine, subject, Some(queue_group), handler)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Message;
    use crate::transport::DialedConnection;
    use std::io;

    struct RefusingDialer;

    impl Dialer for RefusingDialer {
        fn dial(&self, _address: &str, _timeout: Duration) -> io::Result<DialedConnection> {
            Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
        }
    }

    #[test]
    fn operations_before_connect_are_not_connected() {
        let client = Client::new(Options::default());

        assert!(matches!(client.publish("a", b"x"), Err(Error::NotConnected)));
        assert!(matches!(
            client.subscribe("a", |_m: Message| {}),
            Err(Error::NotConnected)
        ));
        assert!(matches!(client.unsubscribe(1, None), Err(Error::NotConnected)));
        assert!(matches!(
            client.request("a", b"x", Duration::from_millis(10)),
            Err(Error::NotConnected)
        ));
        assert!(matches!(client.run_forever(), Err(Error::NotConnected)));
        assert_eq!(client.state(), ConnectionState::Idle);
        assert_eq!(client.subscription_count(), 0);
    }

    #[test]
    fn dial_failure_closes_the_client() {
        let client = Client::with_dialer(Options::default(), Arc::new(RefusingDialer));

        let err = client.connect().unwrap_err();

        assert!(matches!(
            err,
            Error::ConnectFailed { ref address, .. } if address == "127.0.0.1:4222"
        ));
        assert_eq!(client.state(), ConnectionState::Closed);
        assert!(matches!(client.connect(), Err(Error::Closed)));
    }

    #[test]
    fn close_is_idempotent_from_any_state() {
        let client = Client::new(Options::default());

        client.close();
        client.close();

        assert_eq!(client.state(), ConnectionState::Closed);
        assert!(matches!(client.publish("a", b"x"), Err(Error::NotConnected)));
    }
}
