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

mod config;

use crate::config::Config;
use clap::Parser;
use natsline::{Client, HandlerError, Message, Options};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{error, info, warn};

const SIGNAL_THREAD_NAME: &str = "natsline-demo-signal";

#[derive(Parser)]
#[command(about = "Publishes, subscribes and answers requests through natsline")]
struct DemoArgs {
    /// json5 configuration file; command-line flags override it.
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,
    /// Server URL, e.g. nats://127.0.0.1:4222
    #[arg(short, long, value_name = "URL")]
    server: Option<String>,
    #[arg(short, long)]
    name: Option<String>,
    /// Subject pattern to watch, e.g. "demo.>"
    #[arg(long, value_name = "SUBJECT")]
    subject: Option<String>,
    /// Subject the responder serves.
    #[arg(long, value_name = "SUBJECT")]
    service: Option<String>,
    /// Skip the request/reply round trip at startup.
    #[arg(long)]
    no_request: bool,
}

#[derive(Serialize, Deserialize, Debug)]
struct Greeting {
    from: String,
    text: String,
    sent_at_ms: u128,
}

fn load_config(args: &DemoArgs) -> Result<Config, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .map_err(|e| format!("Unable to read config file {path}: {e}"))?;
            json5::from_str::<Config>(&contents)
                .map_err(|e| format!("Unable to parse config file {path}: {e}"))?
        }
        None => Config::default(),
    };

    if let Some(server) = &args.server {
        let name = config.client.name.clone();
        config.client = Options::from_url(server)?.with_name(name);
    }
    if let Some(name) = &args.name {
        config.client.name = name.clone();
    }
    if let Some(subject) = &args.subject {
        config.demo.watch_subject = subject.clone();
    }
    if let Some(service) = &args.service {
        config.demo.service_subject = service.clone();
    }
    if args.no_request {
        config.demo.send_request = false;
    }
    Ok(config)
}

fn spawn_ctrl_c_watcher(client: Arc<Client>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(SIGNAL_THREAD_NAME.to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    error!("Unable to build signal runtime: {err}");
                    return;
                }
            };
            match runtime.block_on(tokio::signal::ctrl_c()) {
                Ok(()) => {
                    info!("Ctrl-C received, closing connection");
                    client.close();
                }
                Err(err) => error!("Unable to listen for Ctrl-C: {err}"),
            }
        })
}

fn main() -> Result<(), Box<dyn Error>> {
    let _ = tracing_subscriber::fmt::try_init();

    info!("Started natsline-demo");

    let args = DemoArgs::parse();
    let config = load_config(&args)?;
    let demo = config.demo;

    let client = Arc::new(Client::new(config.client));
    client.connect()?;
    if let Some(server) = client.server_info() {
        info!(
            "Connected to {} (server {} {})",
            client.options().address(),
            server.server_id,
            server.version
        );
    }

    client.subscribe(demo.watch_subject.as_str(), |message: Message| {
        match serde_json::from_slice::<Greeting>(&message.payload) {
            Ok(greeting) => info!(
                "[{}] greeting from {}: {}",
                message.subject, greeting.from, greeting.text
            ),
            Err(_) => info!(
                "[{}] {} bytes: {}",
                message.subject,
                message.payload.len(),
                String::from_utf8_lossy(&message.payload)
            ),
        }
    })?;

    let own_name = client.options().name.clone();
    client.respond(
        demo.service_subject.as_str(),
        move |_subject: &str, payload: &[u8]| -> Result<Vec<u8>, HandlerError> {
            let caller = std::str::from_utf8(payload)?;
            Ok(format!("hello {caller}, this is {own_name}").into_bytes())
        },
    )?;

    let greeting = Greeting {
        from: client.options().name.clone(),
        text: "hello from natsline".to_string(),
        sent_at_ms: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default(),
    };
    client.publish(&demo.greeting_subject, &serde_json::to_vec(&greeting)?)?;

    if demo.send_request {
        match client.request(
            &demo.service_subject,
            client.options().name.as_bytes(),
            demo.request_timeout(),
        ) {
            Ok(reply) => info!("Service replied: {}", String::from_utf8_lossy(&reply)),
            Err(err) => warn!("Request to {} failed: {err}", demo.service_subject),
        }
    }

    let _watcher = spawn_ctrl_c_watcher(client.clone())?;
    info!("Waiting for messages; press Ctrl-C to stop");
    client.run_forever()?;

    info!("Connection closed, exiting");
    Ok(())
}
