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

use natsline::Options;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub(crate) client: Options,
    #[serde(default)]
    pub(crate) demo: DemoConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct DemoConfig {
    pub(crate) watch_subject: String,
    pub(crate) greeting_subject: String,
    pub(crate) service_subject: String,
    pub(crate) request_timeout_ms: u64,
    pub(crate) send_request: bool,
}

impl DemoConfig {
    pub(crate) fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            watch_subject: "demo.>".to_string(),
            greeting_subject: "demo.greeting".to_string(),
            service_subject: "service.greeting".to_string(),
            request_timeout_ms: 2000,
            send_request: true,
        }
    }
}
