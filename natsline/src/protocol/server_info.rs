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

//! JSON bodies of the INFO greeting and the CONNECT reply.

use crate::options::Options;
use serde::{Deserialize, Serialize};

pub(crate) const CLIENT_LANG: &str = "rust";
pub(crate) const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Server properties read once from the INFO greeting.
///
/// Absent fields take their default value; the nonce is kept only so it can be
/// handed to an embedder that signs it.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ServerInfo {
    pub server_id: String,
    pub version: String,
    pub headers: bool,
    pub tls_required: bool,
    pub auth_required: bool,
    pub nonce: String,
    /// Largest payload the server accepts, `0` when not advertised.
    pub max_payload: usize,
}

impl ServerInfo {
    pub(crate) fn parse(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Serialize, Debug)]
pub(crate) struct ConnectInfo<'a> {
    lang: &'static str,
    version: &'static str,
    name: &'a str,
    verbose: bool,
    pedantic: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    headers: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pass: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    auth_token: Option<&'a str>,
}

impl<'a> From<&'a Options> for ConnectInfo<'a> {
    fn from(options: &'a Options) -> Self {
        Self {
            lang: CLIENT_LANG,
            version: CLIENT_VERSION,
            name: &options.name,
            verbose: options.verbose,
            pedantic: options.pedantic,
            headers: options.headers.then_some(true),
            user: options.user.as_deref(),
            pass: options.pass.as_deref(),
            auth_token: options.auth_token.as_deref(),
        }
    }
}
