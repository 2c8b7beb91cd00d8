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

mod support;

use integration_test_utils::{wait_for, MockServer, Recorder};
use natsline::{ConnectionState, Error, Message};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use support::{connected_client, wait_for_server_subscriptions, DELIVERY_TIMEOUT};

const MESSAGES_PER_PUBLISHER: usize = 200;

fn payloads(messages: &[Message]) -> Vec<String> {
    messages
        .iter()
        .map(|message| String::from_utf8_lossy(&message.payload).into_owned())
        .collect()
}

#[test]
fn publish_reaches_own_subscription() {
    integration_test_utils::init_logging();
    let server = MockServer::start();
    let client = connected_client(&server, "round-trip");
    let received = Arc::new(Recorder::new());

    let sink = received.clone();
    let sid = client
        .subscribe("test.subject", move |message: Message| sink.push(message))
        .unwrap();
    wait_for_server_subscriptions(&server, 1);

    client.publish("test.subject", b"hello-from-test").unwrap();

    let messages = received.wait_for_len(1, DELIVERY_TIMEOUT);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].subject, "test.subject");
    assert_eq!(messages[0].sid, sid);
    assert_eq!(messages[0].reply_to, None);
    assert_eq!(messages[0].payload, b"hello-from-test");
}

#[test]
fn reply_subject_and_binary_payload_are_preserved() {
    integration_test_utils::init_logging();
    let server = MockServer::start();
    let client = connected_client(&server, "binary");
    let received = Arc::new(Recorder::new());

    let sink = received.clone();
    client
        .subscribe("bin", move |message: Message| sink.push(message))
        .unwrap();
    wait_for_server_subscriptions(&server, 1);

    let payload = b"line one\r\nline two\r\n\x00\xff".to_vec();
    client.publish_with_reply("bin", "answers.here", &payload).unwrap();
    client.publish("bin", b"").unwrap();

    let messages = received.wait_for_len(2, DELIVERY_TIMEOUT);
    assert_eq!(messages[0].payload, payload);
    assert_eq!(messages[0].reply_to.as_deref(), Some("answers.here"));
    assert!(messages[1].payload.is_empty());
}

#[test]
fn unsubscribe_stops_delivery() {
    integration_test_utils::init_logging();
    let server = MockServer::start();
    let client = connected_client(&server, "unsubscriber");
    let received = Arc::new(Recorder::new());

    let sink = received.clone();
    let sid = client
        .subscribe("news", move |message: Message| sink.push(message))
        .unwrap();
    wait_for_server_subscriptions(&server, 1);
    client.publish("news", b"first").unwrap();
    received.wait_for_len(1, DELIVERY_TIMEOUT);

    client.unsubscribe(sid, None).unwrap();
    assert_eq!(client.subscription_count(), 0);
    assert!(wait_for(DELIVERY_TIMEOUT, || server.subscription_count() == 0));

    client.publish("news", b"second").unwrap();
    // Server-side injection bypasses server routing and exercises the local drop.
    server.inject_raw(format!("MSG news {sid} 5\r\nthird\r\n").as_bytes());
    thread::sleep(Duration::from_millis(100));

    assert_eq!(payloads(&received.snapshot()), vec!["first"]);
    assert_eq!(client.state(), ConnectionState::Ready);
}

#[test]
fn unsubscribing_unknown_id_is_not_an_error() {
    integration_test_utils::init_logging();
    let server = MockServer::start();
    let client = connected_client(&server, "unknown-sid");

    assert!(client.unsubscribe(9_999, None).is_ok());
}

#[test]
fn bounded_unsubscribe_delivers_remaining_messages_then_stops() {
    integration_test_utils::init_logging();
    let server = MockServer::start();
    let client = connected_client(&server, "bounded");
    let received = Arc::new(Recorder::new());

    let sink = received.clone();
    let sid = client
        .subscribe("ticks", move |message: Message| sink.push(message))
        .unwrap();
    wait_for_server_subscriptions(&server, 1);
    client.publish("ticks", b"1").unwrap();
    received.wait_for_len(1, DELIVERY_TIMEOUT);

    client.unsubscribe(sid, Some(3)).unwrap();
    for n in 2..=5 {
        client.publish("ticks", n.to_string().as_bytes()).unwrap();
    }

    let messages = received.wait_for_len(3, DELIVERY_TIMEOUT);
    thread::sleep(Duration::from_millis(100));
    assert_eq!(payloads(&messages), vec!["1", "2", "3"]);
    assert_eq!(received.len(), 3);
    assert!(wait_for(DELIVERY_TIMEOUT, || client.subscription_count() == 0));
}

#[test]
fn messages_from_concurrent_publishers_keep_per_publisher_order() {
    integration_test_utils::init_logging();
    let server = MockServer::start();
    let client = Arc::new(connected_client(&server, "ordering"));
    let received = Arc::new(Recorder::new());

    let sink = received.clone();
    client
        .subscribe("ordered.*", move |message: Message| sink.push(message))
        .unwrap();
    wait_for_server_subscriptions(&server, 1);

    let publishers: Vec<_> = ["ordered.a", "ordered.b"]
        .into_iter()
        .map(|subject| {
            let client = client.clone();
            thread::spawn(move || {
                for n in 0..MESSAGES_PER_PUBLISHER {
                    client.publish(subject, n.to_string().as_bytes()).unwrap();
                }
            })
        })
        .collect();
    for publisher in publishers {
        publisher.join().unwrap();
    }

    let messages = received.wait_for_len(2 * MESSAGES_PER_PUBLISHER, DELIVERY_TIMEOUT);
    assert_eq!(messages.len(), 2 * MESSAGES_PER_PUBLISHER);
    for subject in ["ordered.a", "ordered.b"] {
        let sequence: Vec<usize> = messages
            .iter()
            .filter(|message| message.subject == subject)
            .map(|message| String::from_utf8_lossy(&message.payload).parse().unwrap())
            .collect();
        assert_eq!(sequence, (0..MESSAGES_PER_PUBLISHER).collect::<Vec<_>>());
    }
}

#[test]
fn wildcard_subscription_receives_matching_subjects_only() {
    integration_test_utils::init_logging();
    let server = MockServer::start();
    let client = connected_client(&server, "wildcards");
    let received = Arc::new(Recorder::new());

    let sink = received.clone();
    client
        .subscribe("demo.>", move |message: Message| sink.push(message.subject))
        .unwrap();
    wait_for_server_subscriptions(&server, 1);

    for subject in ["demo.a", "other.a", "demo.a.b", "demo"] {
        client.publish(subject, b"x").unwrap();
    }
    client.publish("demo.done", b"x").unwrap();

    let subjects = received.wait_for_len(3, DELIVERY_TIMEOUT);
    assert_eq!(subjects, vec!["demo.a", "demo.a.b", "demo.done"]);
}

#[test]
fn queue_group_delivers_each_message_once() {
    integration_test_utils::init_logging();
    let server = MockServer::start();
    let client = connected_client(&server, "queue");
    let received = Arc::new(Recorder::new());

    for _ in 0..2 {
        let sink = received.clone();
        client
            .queue_subscribe("jobs", "workers", move |message: Message| sink.push(message))
            .unwrap();
    }
    wait_for_server_subscriptions(&server, 2);

    client.publish("jobs", b"job-1").unwrap();
    client.publish("jobs", b"job-2").unwrap();

    received.wait_for_len(2, DELIVERY_TIMEOUT);
    thread::sleep(Duration::from_millis(100));
    assert_eq!(payloads(&received.snapshot()), vec!["job-1", "job-2"]);
}

#[test]
fn malformed_and_unknown_frames_do_not_break_the_stream() {
    integration_test_utils::init_logging();
    let server = MockServer::start();
    let client = connected_client(&server, "resilient");
    let received = Arc::new(Recorder::new());

    let sink = received.clone();
    let sid = client
        .subscribe("feed", move |message: Message| sink.push(message))
        .unwrap();
    wait_for_server_subscriptions(&server, 1);

    server.inject_raw(b"MSG feed not-a-sid 3\r\nbad\r\n");
    server.inject_raw(b"MSG feed 4242 4\r\nlost\r\n");
    server.inject_raw(b"+OK\r\n-ERR 'Stale Connection'\r\nINFO {}\r\nHMSG odd\r\n");
    server.inject_raw(format!("MSG feed {sid} 4\r\ngood\r\n").as_bytes());

    let messages = received.wait_for_len(1, DELIVERY_TIMEOUT);
    assert_eq!(payloads(&messages), vec!["good"]);
    assert_eq!(client.state(), ConnectionState::Ready);
}

#[test]
fn invalid_subjects_are_rejected_locally() {
    integration_test_utils::init_logging();
    let server = MockServer::start();
    let client = connected_client(&server, "validator");

    assert!(matches!(
        client.publish("has space", b"x"),
        Err(Error::InvalidSubject(_))
    ));
    assert!(matches!(
        client.subscribe("", |_message: Message| {}),
        Err(Error::InvalidSubject(_))
    ));
    assert_eq!(client.subscription_count(), 0);
    assert_eq!(client.state(), ConnectionState::Ready);
}

#[test]
fn payload_over_server_limit_is_rejected() {
    integration_test_utils::init_logging();
    let server = MockServer::start();
    let client = connected_client(&server, "oversized");

    let payload = vec![0u8; 1024 * 1024 + 1];
    assert!(matches!(
        client.publish("big", &payload),
        Err(Error::PayloadTooLarge { .. })
    ));
    assert_eq!(client.state(), ConnectionState::Ready);
}
