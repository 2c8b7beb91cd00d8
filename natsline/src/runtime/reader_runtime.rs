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

//! Runtime helper for spawning the connection reader loop.

use crate::engine::ConnectionEngine;
use crate::observability::{events, fields};
use crate::transport::LineReader;
use std::io;
use std::sync::Arc;
use std::thread;
use tracing::{debug, error};

pub(crate) const READER_THREAD_NAME: &str = "natsline-reader";

const COMPONENT: &str = "reader_runtime";

pub(crate) fn spawn_reader_loop<F>(
    engine: Arc<ConnectionEngine>,
    lines: LineReader,
    run_loop: F,
) -> io::Result<thread::JoinHandle<()>>
where
    F: FnOnce(Arc<ConnectionEngine>, LineReader) + Send + 'static,
{
    let spawned = thread::Builder::new()
        .name(READER_THREAD_NAME.to_string())
        .spawn(move || run_loop(engine, lines));

    match &spawned {
        Ok(handle) => debug!(
            event = events::READER_SPAWN_OK,
            component = COMPONENT,
            reader_thread = %fields::thread_name_or_default(handle.thread().name()),
            "reader thread started"
        ),
        Err(err) => error!(
            event = events::READER_SPAWN_FAILED,
            component = COMPONENT,
            err = %err,
            "unable to spawn reader thread"
        ),
    }
    spawned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;
    use std::io::Cursor;

    #[test]
    fn reader_loop_runs_on_named_thread() {
        let engine = Arc::new(ConnectionEngine::new(Options::default()));
        let lines = LineReader::new(Box::new(Cursor::new(Vec::new())));

        let handle = spawn_reader_loop(engine, lines, |_engine, _lines| {
            assert_eq!(
                fields::current_thread_name_or_default(),
                READER_THREAD_NAME
            );
        })
        .unwrap();

        handle.join().unwrap();
    }
}
