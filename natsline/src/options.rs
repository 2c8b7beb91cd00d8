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

//! Connection options captured when a [`Client`](crate::Client) is built.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 4222;
pub const DEFAULT_NAME: &str = "natsline";
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 5000;

const URL_SCHEME: &str = "nats://";

/// Immutable client configuration.
///
/// Credentials are forwarded verbatim in the CONNECT frame and are otherwise
/// opaque to the client.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    pub host: String,
    pub port: u16,
    /// Client display name reported to the server.
    pub name: String,
    pub handshake_timeout_ms: u64,
    pub verbose: bool,
    pub pedantic: bool,
    pub headers: bool,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub auth_token: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            name: DEFAULT_NAME.to_string(),
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT_MS,
            verbose: false,
            pedantic: false,
            headers: false,
            user: None,
            pass: None,
            auth_token: None,
        }
    }
}

impl Options {
    /// Builds options from `nats://[user:pass@|token@]host[:port]`.
    pub fn from_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix(URL_SCHEME)
            .ok_or_else(|| Error::InvalidUrl(url.to_string()))?;

        let mut options = Self::default();

        let location = match rest.rsplit_once('@') {
            Some((credentials, location)) => {
                match credentials.split_once(':') {
                    Some((user, pass)) => {
                        options.user = Some(user.to_string());
                        options.pass = Some(pass.to_string());
                    }
                    None => options.auth_token = Some(credentials.to_string()),
                }
                location
            }
            None => rest,
        };

        let location = location.trim_end_matches('/');
        match location.rsplit_once(':') {
            Some((host, port)) => {
                options.port = port
                    .parse()
                    .map_err(|_| Error::InvalidUrl(url.to_string()))?;
                if !host.is_empty() {
                    options.host = host.to_string();
                }
            }
            None if !location.is_empty() => options.host = location.to_string(),
            None => {}
        }

        Ok(options)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// `host:port` in the form accepted by the dialer.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}
