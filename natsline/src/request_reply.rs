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

//! Request/reply on top of publish and a private inbox subscription.

use crate::engine::ConnectionEngine;
use crate::error::{Error, Result};
use crate::handler::{Message, MessageHandler, RequestHandler};
use crate::observability::{events, fields};
use crate::protocol::codec;
use parking_lot::{Condvar, Mutex};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};
use uuid::Uuid;

const COMPONENT: &str = "request_reply";

pub(crate) const INBOX_PREFIX: &str = "_INBOX.";

/// Returns a fresh inbox subject, unique per call.
pub(crate) fn new_inbox() -> String {
    format!("{INBOX_PREFIX}{}", Uuid::new_v4().simple())
}

#[derive(Default)]
struct PendingState {
    reply: Option<Vec<u8>>,
    closed: bool,
}

enum Outcome {
    Reply(Vec<u8>),
    Closed,
    TimedOut,
}

/// One in-flight request. The first reply wins.
#[derive(Default)]
struct PendingRequest {
    state: Mutex<PendingState>,
    done: Condvar,
}

impl PendingRequest {
    fn wait(&self, deadline: Instant) -> Outcome {
        let mut state = self.state.lock();
        while state.reply.is_none() && !state.closed {
            if self.done.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        match state.reply.take() {
            Some(reply) => Outcome::Reply(reply),
            None if state.closed => Outcome::Closed,
            None => Outcome::TimedOut,
        }
    }
}

impl MessageHandler for PendingRequest {
    fn on_message(&self, message: Message) {
        let mut state = self.state.lock();
        if state.reply.is_some() {
            trace!(
                event = events::REQUEST_LATE_REPLY_DROPPED,
                component = COMPONENT,
                subject = message.subject.as_str(),
                "dropping extra reply"
            );
            return;
        }
        state.reply = Some(message.payload);
        self.done.notify_all();
    }

    fn on_connection_closed(&self) {
        self.state.lock().closed = true;
        self.done.notify_all();
    }
}

pub(crate) fn request(
    engine: &ConnectionEngine,
    subject: &str,
    payload: &[u8],
    timeout: Duration,
) -> Result<Vec<u8>> {
    codec::validate_subject(subject)?;

    let inbox = new_inbox();
    let pending = Arc::new(PendingRequest::default());
    let sid = engine.subscribe(&inbox, None, pending.clone())?;

    if let Err(err) = engine.publish(subject, Some(&inbox), payload) {
        release_inbox(engine, sid);
        return Err(err);
    }

    let outcome = pending.wait(Instant::now() + timeout);
    release_inbox(engine, sid);

    match outcome {
        Outcome::Reply(reply) => Ok(reply),
        Outcome::Closed => Err(Error::NotConnected),
        Outcome::TimedOut => {
            debug!(
                event = events::REQUEST_TIMEOUT,
                component = COMPONENT,
                subject,
                timeout_ms = timeout.as_millis() as u64,
                "request timed out"
            );
            Err(Error::RequestTimeout {
                subject: subject.to_string(),
                timeout,
            })
        }
    }
}

/// Drops the inbox locally and tells the server; the latter is best effort.
fn release_inbox(engine: &ConnectionEngine, sid: u64) {
    engine.registry().remove(sid);
    if let Err(err) = engine.unsubscribe(sid, None) {
        debug!(
            event = events::REQUEST_CLEANUP_FAILED,
            component = COMPONENT,
            sid,
            err = %err,
            "unable to unsubscribe request inbox"
        );
    }
}

struct Responder<H> {
    engine: Weak<ConnectionEngine>,
    handler: H,
}

impl<H: RequestHandler> MessageHandler for Responder<H> {
    fn on_message(&self, message: Message) {
        let Some(reply_to) = message.reply_to.as_deref().filter(|r| !r.is_empty()) else {
            debug!(
                event = events::RESPONDER_NO_REPLY_SUBJECT,
                component = COMPONENT,
                subject = message.subject.as_str(),
                "request has no reply subject; dropping"
            );
            return;
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.handler.handle(&message.subject, &message.payload)
        }));
        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                warn!(
                    event = events::RESPONDER_HANDLER_FAILED,
                    component = COMPONENT,
                    subject = message.subject.as_str(),
                    err = %err,
                    "request handler failed; replying with error text"
                );
                format!("error: {err}").into_bytes()
            }
            Err(panic) => {
                let text = fields::panic_message(panic.as_ref());
                warn!(
                    event = events::RESPONDER_HANDLER_FAILED,
                    component = COMPONENT,
                    subject = message.subject.as_str(),
                    panic = text,
                    "request handler panicked; replying with error text"
                );
                format!("error: {text}").into_bytes()
            }
        };

        let Some(engine) = self.engine.upgrade() else {
            return;
        };
        if let Err(err) = engine.publish(reply_to, None, &response) {
            warn!(
                event = events::RESPONDER_PUBLISH_FAILED,
                component = COMPONENT,
                reply_to,
                err = %err,
                "unable to publish response"
            );
        }
    }
}

pub(crate) fn respond<H: RequestHandler>(
    engine: &Arc<ConnectionEngine>,
    subject: &str,
    queue_group: Option<&str>,
    handler: H,
) -> Result<u64> {
    let responder = Responder {
        engine: Arc::downgrade(engine),
        handler,
    };
    engine.subscribe(subject, queue_group, Arc::new(responder))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::{ready_engine, RecordingTransport};
    use crate::handler::HandlerError;
    use crate::protocol::MsgHeader;
    use std::thread;

    type Reply = std::result::Result<Vec<u8>, HandlerError>;

    fn deliver(engine: &ConnectionEngine, sid: u64, reply_to: Option<&str>, payload: &[u8]) {
        engine.dispatch(
            MsgHeader {
                subject: "svc".to_string(),
                sid,
                reply_to: reply_to.map(str::to_string),
                payload_len: payload.len(),
            },
            payload.to_vec(),
        );
    }

    #[test]
    fn inboxes_are_unique_and_prefixed() {
        let first = new_inbox();
        let second = new_inbox();

        assert!(first.starts_with(INBOX_PREFIX));
        assert_ne!(first, second);
        assert!(codec::validate_subject(&first).is_ok());
    }

    #[test]
    fn first_reply_wins() {
        let pending = PendingRequest::default();
        for payload in [b"one".to_vec(), b"two".to_vec()] {
            pending.on_message(Message {
                subject: "_INBOX.x".to_string(),
                sid: 1,
                reply_to: None,
                payload,
            });
        }

        match pending.wait(Instant::now()) {
            Outcome::Reply(reply) => assert_eq!(reply, b"one"),
            _ => panic!("expected a reply"),
        }
    }

    #[test]
    fn pending_request_wakes_on_close() {
        let pending = Arc::new(PendingRequest::default());
        let closer = pending.clone();
        let handle = thread::spawn(move || closer.on_connection_closed());

        let outcome = pending.wait(Instant::now() + Duration::from_secs(5));
        handle.join().unwrap();
        assert!(matches!(outcome, Outcome::Closed));
    }

    #[test]
    fn request_times_out_and_releases_inbox() {
        let transport = Arc::new(RecordingTransport::default());
        let engine = ready_engine(transport.clone());

        let err = request(&engine, "nobody.home", b"ping", Duration::from_millis(20)).unwrap_err();

        assert!(matches!(
            err,
            Error::RequestTimeout { ref subject, .. } if subject == "nobody.home"
        ));
        assert_eq!(engine.registry().len(), 0);
        let written = transport.written();
        assert!(written.starts_with("SUB _INBOX."));
        assert!(written.contains("PUB nobody.home _INBOX."));
        assert!(written.ends_with("UNSUB 1\r\n"));
    }

    #[test]
    fn request_before_ready_is_not_connected() {
        let engine = ConnectionEngine::new(crate::options::Options::default());
        assert!(matches!(
            request(&engine, "a", b"", Duration::from_millis(1)),
            Err(Error::NotConnected)
        ));
    }

    #[test]
    fn responder_replies_to_reply_subject() {
        let transport = Arc::new(RecordingTransport::default());
        let engine = ready_engine(transport.clone());
        let sid = respond(&engine, "svc", None, |_subject: &str, payload: &[u8]| -> Reply {
            let mut reply = b"hello ".to_vec();
            reply.extend_from_slice(payload);
            Ok(reply)
        })
        .unwrap();

        deliver(&engine, sid, Some("_INBOX.r"), b"bob");

        assert!(transport
            .written()
            .ends_with("PUB _INBOX.r 9\r\nhello bob\r\n"));
    }

    #[test]
    fn responder_turns_handler_error_into_error_reply() {
        let transport = Arc::new(RecordingTransport::default());
        let engine = ready_engine(transport.clone());
        let sid = respond(
            &engine,
            "svc",
            Some("workers"),
            |_subject: &str, _payload: &[u8]| -> Reply {
                Err("bad input".into())
            },
        )
        .unwrap();

        deliver(&engine, sid, Some("_INBOX.r"), b"x");

        assert!(transport
            .written()
            .ends_with("PUB _INBOX.r 16\r\nerror: bad input\r\n"));
    }

    #[test]
    fn responder_turns_handler_panic_into_error_reply() {
        let transport = Arc::new(RecordingTransport::default());
        let engine = ready_engine(transport.clone());
        let sid = respond(&engine, "svc", None, |_subject: &str, _payload: &[u8]| -> Reply {
            panic!("handler blew up")
        })
        .unwrap();

        deliver(&engine, sid, Some("_INBOX.r"), b"x");

        assert!(transport
            .written()
            .ends_with("PUB _INBOX.r 23\r\nerror: handler blew up\r\n"));
        assert_eq!(engine.state(), crate::engine::ConnectionState::Ready);
    }

    #[test]
    fn responder_ignores_requests_without_reply_subject() {
        let transport = Arc::new(RecordingTransport::default());
        let engine = ready_engine(transport.clone());
        let sid = respond(&engine, "svc", None, |_subject: &str, payload: &[u8]| -> Reply {
            Ok(payload.to_vec())
        })
        .unwrap();
        let before = transport.written();

        deliver(&engine, sid, None, b"x");

        assert_eq!(transport.written(), before);
    }
}
