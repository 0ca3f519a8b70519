//! Per-connection command handling.
//!
//! A session is a batch of newline-terminated command lines ended by a blank
//! line or EOF. The server answers with one JSON line:
//!
//! ```text
//! {"ok":true}
//! {"ok":true,"skipped":["LED not defined: LED99"]}
//! {"ok":false,"error":"RIGHT: USB write timed out after 1000ms"}
//! ```

use std::fmt;
use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::address_map::AddressError;
use crate::command::{ParseError, parse_command, strip_effect_suffix};
use crate::engine::Engine;
use crate::packet::{SideBatches, build_entry};
use crate::protocol::{PRIORITY_EFFECT, PRIORITY_STATIC, SESSION_IO_TIMEOUT_MS};

// ── Response ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn success(skipped: Vec<String>) -> Self {
        Response {
            ok: true,
            skipped,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Response {
            ok: false,
            skipped: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// Serialize as a single newline-terminated JSON line.
    pub fn to_line(&self) -> String {
        let mut line = serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"ok":false,"error":"response encoding failed"}"#.into());
        line.push('\n');
        line
    }
}

// ── Per-line errors ──

/// Why a single line was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    Parse(ParseError),
    Address(AddressError),
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineError::Parse(e) => write!(f, "{e}"),
            LineError::Address(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for LineError {}

impl From<ParseError> for LineError {
    fn from(e: ParseError) -> Self {
        LineError::Parse(e)
    }
}

impl From<AddressError> for LineError {
    fn from(e: AddressError) -> Self {
        LineError::Address(e)
    }
}

// ── Reading ──

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

/// Read command lines until a blank line, EOF or a read timeout.
///
/// Invalid UTF-8 is replaced, line terminators are stripped.
pub fn read_lines<R: BufRead>(mut reader: R) -> io::Result<Vec<String>> {
    let mut lines = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        // On a timeout `buf` still holds what was read so far.
        let timed_out = match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => false,
            Err(e) if is_timeout(&e) => true,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            break;
        }
        lines.push(line.to_string());
        if timed_out {
            break;
        }
    }
    Ok(lines)
}

// ── Handling ──

impl Engine {
    /// Apply a batch of command lines and transmit the resulting packets.
    pub fn handle_lines(&self, lines: &[String]) -> Response {
        if lines.is_empty() {
            return Response::failure("no commands");
        }
        self.mark_received();
        for (i, line) in lines.iter().enumerate() {
            debug!("[rx] {}: {}", i + 1, line.trim_end());
        }

        let mut batches = SideBatches::default();
        let mut skipped = Vec::new();
        for line in lines {
            if let Err(e) = self.apply_line(line, &mut batches) {
                debug!("[rx] skipped '{}': {e}", line.trim());
                skipped.push(e.to_string());
            }
        }

        match self.transmit(&batches) {
            Ok(_) => Response::success(skipped),
            Err(e) => {
                warn!("Session failed: {e}");
                Response::failure(e.to_string())
            }
        }
    }

    /// Update state and effects for one line, queueing immediate entries.
    ///
    /// Every member LED is resolved before anything is mutated, so a line
    /// naming an unknown LED changes nothing.
    fn apply_line(&self, line: &str, batches: &mut SideBatches) -> Result<(), LineError> {
        let (core, mode, period_ms) = strip_effect_suffix(line);
        let cmd = parse_command(&core)?;
        let priority = if mode.is_some() {
            PRIORITY_EFFECT
        } else {
            PRIORITY_STATIC
        };

        let members = self.map().expand(&cmd.led);
        let entries = members
            .iter()
            .map(|name| build_entry(self.map(), name, cmd.color))
            .collect::<Result<Vec<_>, _>>()?;

        // Effects start from the streaming loop when it runs.
        let send_now = mode.is_none() || !self.streaming_enabled();
        for (name, entry) in members.iter().zip(entries) {
            if !self.state().set(cmd.side, name, cmd.color, priority) {
                continue;
            }
            self.effects()
                .set_effect(cmd.side, name, mode, period_ms, cmd.color, priority);
            if send_now {
                batches.push(cmd.side, entry);
            }
        }
        Ok(())
    }
}

/// Serve one TCP connection: read a batch, apply it, reply with one line.
pub fn handle_connection(engine: &Engine, stream: TcpStream) -> io::Result<()> {
    let timeout = Some(Duration::from_millis(SESSION_IO_TIMEOUT_MS));
    stream.set_read_timeout(timeout)?;
    stream.set_write_timeout(timeout)?;

    let response = match read_lines(BufReader::new(&stream)) {
        Ok(lines) => engine.handle_lines(&lines),
        Err(e) => Response::failure(format!("read failed: {e}")),
    };
    let mut writer = &stream;
    writer.write_all(response.to_line().as_bytes())?;
    writer.flush()
}
