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

//! Byte-stream boundary consumed by the connection engine.
//!
//! The write half is shared by every caller thread behind the engine's write
//! lock; the read half is owned by the single reader thread.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

/// Longest control line accepted from the server.
pub const MAX_CONTROL_LINE: usize = 64 * 1024;

/// Largest message body accepted from the server, whatever its INFO advertises.
pub const MAX_PAYLOAD: usize = 64 * 1024 * 1024;

const READ_BUFFER_CAPACITY: usize = 32 * 1024;

/// Write side of a connected duplex stream.
pub trait Transport: Send + Sync {
    fn write_all(&self, bytes: &[u8]) -> io::Result<()>;

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }

    /// Tears the stream down in both directions, unblocking a pending read.
    fn shutdown(&self);
}

/// Both halves of a freshly dialed connection.
pub struct DialedConnection {
    pub transport: Arc<dyn Transport>,
    pub reader: Box<dyn BufRead + Send>,
}

/// Opens connections for the engine.
pub trait Dialer: Send + Sync {
    fn dial(&self, address: &str, timeout: Duration) -> io::Result<DialedConnection>;
}

/// Plain TCP dialer used by [`Client::new`](crate::Client::new).
#[derive(Clone, Debug, Default)]
pub struct TcpDialer;

impl Dialer for TcpDialer {
    fn dial(&self, address: &str, timeout: Duration) -> io::Result<DialedConnection> {
        let mut last_err = None;
        for socket_addr in address.to_socket_addrs()? {
            match TcpStream::connect_timeout(&socket_addr, timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    let reader = BufReader::with_capacity(READ_BUFFER_CAPACITY, stream.try_clone()?);
                    return Ok(DialedConnection {
                        transport: Arc::new(TcpTransport { stream }),
                        reader: Box::new(reader),
                    });
                }
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("{address} did not resolve to any address"),
            )
        }))
    }
}

struct TcpTransport {
    stream: TcpStream,
}

impl Transport for TcpTransport {
    fn write_all(&self, bytes: &[u8]) -> io::Result<()> {
        (&self.stream).write_all(bytes)
    }

    fn flush(&self) -> io::Result<()> {
        (&self.stream).flush()
    }

    fn shutdown(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

/// Line and length framing over a buffered reader.
pub struct LineReader {
    inner: Box<dyn BufRead + Send>,
    line: Vec<u8>,
    payload_limit: usize,
}

impl LineReader {
    pub fn new(inner: Box<dyn BufRead + Send>) -> Self {
        Self {
            inner,
            line: Vec::with_capacity(256),
            payload_limit: MAX_PAYLOAD,
        }
    }

    /// Lowers the accepted payload size, typically to the server's `max_payload`.
    ///
    /// Zero leaves the current limit in place; the limit never exceeds [`MAX_PAYLOAD`].
    pub fn set_payload_limit(&mut self, limit: usize) {
        if limit > 0 {
            self.payload_limit = limit.min(MAX_PAYLOAD);
        }
    }

    pub fn payload_limit(&self) -> usize {
        self.payload_limit
    }

    /// Reads one control line with its CRLF (or bare LF) removed.
    ///
    /// End of stream, including a final line without terminator, is an error.
    pub fn read_line(&mut self) -> io::Result<String> {
        self.line.clear();
        let limit = MAX_CONTROL_LINE as u64 + 2;
        let read = (&mut self.inner)
            .take(limit)
            .read_until(b'\n', &mut self.line)?;

        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by peer",
            ));
        }
        if self.line.last() != Some(&b'\n') {
            let kind = if read as u64 >= limit {
                io::ErrorKind::InvalidData
            } else {
                io::ErrorKind::UnexpectedEof
            };
            return Err(io::Error::new(kind, "control line not terminated"));
        }

        self.line.pop();
        if self.line.last() == Some(&b'\r') {
            self.line.pop();
        }
        Ok(String::from_utf8_lossy(&self.line).into_owned())
    }

    /// Reads exactly `len` payload bytes followed by the mandatory CRLF.
    ///
    /// A `len` above the payload limit is rejected before anything is read.
    pub fn read_payload(&mut self, len: usize) -> io::Result<Vec<u8>> {
        if len > self.payload_limit {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "payload length {len} exceeds limit {}",
                    self.payload_limit
                ),
            ));
        }
        let mut payload = vec![0u8; len];
        self.inner.read_exact(&mut payload)?;

        let mut terminator = [0u8; 2];
        self.inner.read_exact(&mut terminator)?;
        if terminator != *b"\r\n" {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "payload not followed by CRLF",
            ));
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(bytes: &[u8]) -> LineReader {
        LineReader::new(Box::new(Cursor::new(bytes.to_vec())))
    }

    #[test]
    fn read_line_strips_crlf_and_lf() {
        let mut lines = reader(b"PING\r\n+OK\n");
        assert_eq!(lines.read_line().unwrap(), "PING");
        assert_eq!(lines.read_line().unwrap(), "+OK");
    }

    #[test]
    fn read_line_reports_eof() {
        let mut lines = reader(b"");
        let err = lines.read_line().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        let mut partial = reader(b"PIN");
        assert_eq!(
            partial.read_line().unwrap_err().kind(),
            io::ErrorKind::UnexpectedEof
        );
    }

    #[test]
    fn read_line_rejects_oversized_lines() {
        let mut oversized = vec![b'x'; MAX_CONTROL_LINE + 10];
        oversized.extend_from_slice(b"\r\n");
        let mut lines = reader(&oversized);
        assert_eq!(
            lines.read_line().unwrap_err().kind(),
            io::ErrorKind::InvalidData
        );
    }

    #[test]
    fn read_payload_keeps_embedded_crlf() {
        let mut lines = reader(b"a\r\nb\r\nPING\r\n");
        assert_eq!(lines.read_payload(4).unwrap(), b"a\r\nb");
        assert_eq!(lines.read_line().unwrap(), "PING");
    }

    #[test]
    fn read_payload_short_read_fails() {
        let mut lines = reader(b"abc");
        assert_eq!(
            lines.read_payload(5).unwrap_err().kind(),
            io::ErrorKind::UnexpectedEof
        );
    }

    #[test]
    fn read_payload_requires_terminator() {
        let mut lines = reader(b"abcXY");
        assert_eq!(
            lines.read_payload(3).unwrap_err().kind(),
            io::ErrorKind::InvalidData
        );
    }

    #[test]
    fn read_payload_rejects_lengths_over_the_limit() {
        let mut lines = reader(b"abc\r\nPING\r\n");
        assert_eq!(
            lines.read_payload(usize::MAX).unwrap_err().kind(),
            io::ErrorKind::InvalidData
        );

        lines.set_payload_limit(2);
        assert_eq!(
            lines.read_payload(3).unwrap_err().kind(),
            io::ErrorKind::InvalidData
        );
    }

    #[test]
    fn payload_limit_is_capped_and_ignores_zero() {
        let mut lines = reader(b"");
        assert_eq!(lines.payload_limit(), MAX_PAYLOAD);

        lines.set_payload_limit(0);
        assert_eq!(lines.payload_limit(), MAX_PAYLOAD);

        lines.set_payload_limit(usize::MAX);
        assert_eq!(lines.payload_limit(), MAX_PAYLOAD);

        lines.set_payload_limit(1024);
        assert_eq!(lines.payload_limit(), 1024);
    }
}
