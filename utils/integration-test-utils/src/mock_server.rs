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

//! A small in-process server speaking the text protocol, one thread per connection.
//!
//! It routes PUB to matching SUBs (wildcards, queue groups, bounded UNSUB) and
//! exposes hooks to observe or disturb the connection from a test.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

const COMPONENT: &str = "mock_server";
const SERVER_ID: &str = "mock-server";
const MAX_PAYLOAD: usize = 1024 * 1024;

/// What the server says first on every accepted connection.
#[derive(Clone, Debug)]
pub enum Greeting {
    /// A regular `INFO {...}` line.
    Info,
    /// Nothing at all; the client's handshake should time out.
    Silent,
    /// This exact line, CRLF appended.
    Raw(String),
}

struct Subscription {
    subject: String,
    queue_group: Option<String>,
    delivered: u64,
    max_messages: Option<u64>,
}

struct Session {
    id: u64,
    writer: Mutex<TcpStream>,
    subscriptions: Mutex<HashMap<u64, Subscription>>,
}

impl Session {
    fn send(&self, bytes: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock();
        writer.write_all(bytes)?;
        writer.flush()
    }
}

struct Shared {
    greeting: Greeting,
    sessions: Mutex<Vec<Arc<Session>>>,
    connects: Mutex<Vec<String>>,
    pongs: AtomicUsize,
    next_session: AtomicU64,
    stopping: AtomicBool,
}

pub struct MockServer {
    address: SocketAddr,
    shared: Arc<Shared>,
    acceptor: Option<JoinHandle<()>>,
}

impl MockServer {
    /// Starts a server on an ephemeral loopback port with a regular INFO greeting.
    pub fn start() -> Self {
        Self::start_with(Greeting::Info)
    }

    pub fn start_with(greeting: Greeting) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server listener");
        let address = listener.local_addr().expect("mock server local address");
        let shared = Arc::new(Shared {
            greeting,
            sessions: Mutex::new(Vec::new()),
            connects: Mutex::new(Vec::new()),
            pongs: AtomicUsize::new(0),
            next_session: AtomicU64::new(1),
            stopping: AtomicBool::new(false),
        });

        let accept_shared = shared.clone();
        let acceptor = thread::Builder::new()
            .name("mock-server-accept".to_string())
            .spawn(move || accept_loop(listener, accept_shared))
            .expect("spawn mock server acceptor");

        debug!(component = COMPONENT, %address, "mock server listening");
        Self {
            address,
            shared,
            acceptor: Some(acceptor),
        }
    }

    pub fn host(&self) -> String {
        self.address.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.address.port()
    }

    pub fn url(&self) -> String {
        format!("nats://{}", self.address)
    }

    /// JSON bodies of every CONNECT received so far, in arrival order.
    pub fn connect_payloads(&self) -> Vec<String> {
        self.shared.connects.lock().clone()
    }

    pub fn session_count(&self) -> usize {
        self.shared.sessions.lock().len()
    }

    /// Live subscriptions across all connected clients.
    pub fn subscription_count(&self) -> usize {
        self.sessions()
            .iter()
            .map(|session| session.subscriptions.lock().len())
            .sum()
    }

    /// Subjects currently subscribed, across all clients.
    pub fn subscribed_subjects(&self) -> Vec<String> {
        self.sessions()
            .iter()
            .flat_map(|session| {
                session
                    .subscriptions
                    .lock()
                    .values()
                    .map(|subscription| subscription.subject.clone())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    pub fn send_ping(&self) {
        self.broadcast(b"PING\r\n");
    }

    /// Number of PONG lines received from clients.
    pub fn pong_count(&self) -> usize {
        self.shared.pongs.load(Ordering::SeqCst)
    }

    /// Writes `bytes` verbatim to every connected client.
    pub fn inject_raw(&self, bytes: &[u8]) {
        self.broadcast(bytes);
    }

    /// Publishes from the server side, as if another client had sent PUB.
    pub fn publish(&self, subject: &str, reply_to: Option<&str>, payload: &[u8]) {
        route(&self.shared, subject, reply_to, payload);
    }

    /// Drops every client connection from the server side.
    pub fn disconnect_all(&self) {
        for session in self.shared.sessions.lock().drain(..) {
            let _ = session.writer.lock().shutdown(Shutdown::Both);
        }
    }

    fn sessions(&self) -> Vec<Arc<Session>> {
        self.shared.sessions.lock().clone()
    }

    fn broadcast(&self, bytes: &[u8]) {
        for session in self.sessions() {
            if let Err(err) = session.send(bytes) {
                warn!(component = COMPONENT, session = session.id, %err, "write to client failed");
            }
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.shared.stopping.store(true, Ordering::SeqCst);
        self.disconnect_all();
        // Unblock accept().
        let _ = TcpStream::connect(self.address);
        if let Some(acceptor) = self.acceptor.take() {
            let _ = acceptor.join();
        }
    }
}

fn accept_loop(listener: TcpListener, shared: Arc<Shared>) {
    for stream in listener.incoming() {
        if shared.stopping.load(Ordering::SeqCst) {
            return;
        }
        let stream = match stream {
            Ok(stream) => stream,
            Err(err) => {
                warn!(component = COMPONENT, %err, "accept failed");
                continue;
            }
        };
        let session_shared = shared.clone();
        let spawned = thread::Builder::new()
            .name("mock-server-session".to_string())
            .spawn(move || {
                if let Err(err) = serve(stream, &session_shared) {
                    debug!(component = COMPONENT, %err, "session ended");
                }
            });
        if let Err(err) = spawned {
            warn!(component = COMPONENT, %err, "unable to spawn session thread");
        }
    }
}

fn serve(stream: TcpStream, shared: &Arc<Shared>) -> io::Result<()> {
    let session = Arc::new(Session {
        id: shared.next_session.fetch_add(1, Ordering::SeqCst),
        writer: Mutex::new(stream.try_clone()?),
        subscriptions: Mutex::new(HashMap::new()),
    });
    let mut reader = BufReader::new(stream);

    match &shared.greeting {
        Greeting::Info => {
            let info = serde_json::json!({
                "server_id": SERVER_ID,
                "version": "2.10.0-mock",
                "headers": true,
                "max_payload": MAX_PAYLOAD,
            });
            session.send(format!("INFO {info}\r\n").as_bytes())?;
        }
        Greeting::Silent => {}
        Greeting::Raw(line) => session.send(format!("{line}\r\n").as_bytes())?,
    }
    shared.sessions.lock().push(session.clone());

    let outcome = read_commands(&mut reader, &session, shared);
    shared
        .sessions
        .lock()
        .retain(|other| other.id != session.id);
    outcome
}

fn read_commands(
    reader: &mut BufReader<TcpStream>,
    session: &Session,
    shared: &Shared,
) -> io::Result<()> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(());
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        let (op, args) = trimmed.split_once(' ').unwrap_or((trimmed, ""));

        match op.to_ascii_uppercase().as_str() {
            "CONNECT" => shared.connects.lock().push(args.to_string()),
            "PING" => session.send(b"PONG\r\n")?,
            "PONG" => {
                shared.pongs.fetch_add(1, Ordering::SeqCst);
            }
            "PUB" => {
                let tokens: Vec<&str> = args.split_whitespace().collect();
                let (subject, reply_to, len) = match tokens.as_slice() {
                    [subject, len] => (*subject, None, len),
                    [subject, reply_to, len] => (*subject, Some(*reply_to), len),
                    _ => {
                        session.send(b"-ERR 'Invalid Publish'\r\n")?;
                        continue;
                    }
                };
                let len: usize = len
                    .parse()
                    .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "bad PUB size"))?;
                let mut payload = vec![0u8; len + 2];
                reader.read_exact(&mut payload)?;
                payload.truncate(len);
                route(shared, subject, reply_to, &payload);
            }
            "SUB" => {
                let tokens: Vec<&str> = args.split_whitespace().collect();
                let (subject, queue_group, sid) = match tokens.as_slice() {
                    [subject, sid] => (*subject, None, sid),
                    [subject, queue, sid] => (*subject, Some(queue.to_string()), sid),
                    _ => {
                        session.send(b"-ERR 'Invalid Subscription'\r\n")?;
                        continue;
                    }
                };
                if let Ok(sid) = sid.parse::<u64>() {
                    session.subscriptions.lock().insert(
                        sid,
                        Subscription {
                            subject: subject.to_string(),
                            queue_group,
                            delivered: 0,
                            max_messages: None,
                        },
                    );
                }
            }
            "UNSUB" => {
                let mut tokens = args.split_whitespace();
                let sid = tokens.next().and_then(|sid| sid.parse::<u64>().ok());
                let max = tokens.next().and_then(|max| max.parse::<u64>().ok());
                if let Some(sid) = sid {
                    let mut subscriptions = session.subscriptions.lock();
                    match max {
                        Some(max) => {
                            let exhausted = subscriptions.get_mut(&sid).is_some_and(|sub| {
                                sub.max_messages = Some(max);
                                sub.delivered >= max
                            });
                            if exhausted {
                                subscriptions.remove(&sid);
                            }
                        }
                        None => {
                            subscriptions.remove(&sid);
                        }
                    }
                }
            }
            _ => session.send(b"-ERR 'Unknown Protocol Operation'\r\n")?,
        }
    }
}

fn route(shared: &Shared, subject: &str, reply_to: Option<&str>, payload: &[u8]) {
    let sessions = shared.sessions.lock().clone();
    let mut queue_taken: Vec<String> = Vec::new();

    for session in sessions {
        let mut targets = Vec::new();
        {
            let mut subscriptions = session.subscriptions.lock();
            let mut sids: Vec<u64> = subscriptions.keys().copied().collect();
            sids.sort_unstable();
            for sid in sids {
                let Some(sub) = subscriptions.get_mut(&sid) else {
                    continue;
                };
                if !subject_matches(&sub.subject, subject) {
                    continue;
                }
                if let Some(queue) = &sub.queue_group {
                    let key = format!("{}|{}", sub.subject, queue);
                    if queue_taken.contains(&key) {
                        continue;
                    }
                    queue_taken.push(key);
                }
                sub.delivered += 1;
                targets.push(sid);
                if sub.max_messages.is_some_and(|max| sub.delivered >= max) {
                    subscriptions.remove(&sid);
                }
            }
        }

        for sid in targets {
            let header = match reply_to {
                Some(reply_to) => format!("MSG {subject} {sid} {reply_to} {}\r\n", payload.len()),
                None => format!("MSG {subject} {sid} {}\r\n", payload.len()),
            };
            let mut frame = header.into_bytes();
            frame.extend_from_slice(payload);
            frame.extend_from_slice(b"\r\n");
            if let Err(err) = session.send(&frame) {
                warn!(component = COMPONENT, session = session.id, %err, "delivery failed");
            }
        }
    }
}

/// Subject matching with `*` (one token) and `>` (one or more trailing tokens).
pub fn subject_matches(pattern: &str, subject: &str) -> bool {
    let mut subject_tokens = subject.split('.');
    for pattern_token in pattern.split('.') {
        match (pattern_token, subject_tokens.next()) {
            (">", Some(_)) => return true,
            ("*", Some(_)) => {}
            (literal, Some(token)) if literal == token => {}
            _ => return false,
        }
    }
    subject_tokens.next().is_none()
}
