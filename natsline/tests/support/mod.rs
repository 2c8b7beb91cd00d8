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

#![allow(dead_code)]

use integration_test_utils::MockServer;
use natsline::{Client, Options};
use std::time::Duration;

pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn options_for(server: &MockServer, name: &str) -> Options {
    Options {
        host: server.host(),
        port: server.port(),
        ..Options::default()
    }
    .with_name(name)
    .with_handshake_timeout(Duration::from_secs(5))
}

pub fn connected_client(server: &MockServer, name: &str) -> Client {
    let client = Client::new(options_for(server, name));
    client.connect().expect("client should connect to mock server");
    client
}

/// SUB is fire-and-forget; wait until the server has it before publishing.
pub fn wait_for_server_subscriptions(server: &MockServer, count: usize) {
    assert!(
        integration_test_utils::wait_for(DELIVERY_TIMEOUT, || server.subscription_count()
            >= count),
        "server never saw {count} subscriptions"
    );
}
