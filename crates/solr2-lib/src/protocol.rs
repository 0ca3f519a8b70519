//! Protocol constants for the SOL-R2 LED boards and the TCP line protocol.
//!
//! ## USB packet layout
//!
//! Every report written to a board's OUT endpoint is a 4-byte header followed
//! by up to [`MAX_ENTRIES_PER_PACKET`] entries of `(address, R, G, B)`:
//!
//! ```text
//! header[4] || (addr, r, g, b) * N        with 4 + 4N <= 64
//! ```
//!
//! The header selects the LED bank; all entries in one packet share it.

// ── USB identification ──

/// Vendor ID shared by both boards.
pub const SOLR2_VID: u16 = 0x044F;

/// Product ID of the right-hand board.
pub const PID_RIGHT: u16 = 0x0422;

/// Product ID of the left-hand board.
pub const PID_LEFT: u16 = 0x042A;

/// Interface carrying the LED OUT endpoint.
pub const DEFAULT_USB_INTERFACE: u8 = 1;

/// Interrupt OUT endpoint address.
pub const DEFAULT_USB_ENDPOINT: u8 = 0x02;

/// Default bound on a single USB write.
pub const DEFAULT_USB_TIMEOUT_MS: u64 = 1000;

// ── Packet framing ──

/// USB report size ceiling.
pub const USB_REPORT_SIZE: usize = 64;

/// Length of the per-packet bank header.
pub const HEADER_LEN: usize = 4;

/// Length of one `(address, R, G, B)` entry.
pub const ENTRY_LEN: usize = 4;

/// Largest entry count that keeps a packet within [`USB_REPORT_SIZE`] (15).
pub const MAX_ENTRIES_PER_PACKET: usize = (USB_REPORT_SIZE - HEADER_LEN) / ENTRY_LEN;

// ── Priority tiers ──

/// Unclaimed LED; also the tier a released LED falls back to.
pub const PRIORITY_UNCLAIMED: u8 = 0;

/// LED owned by a running effect.
pub const PRIORITY_EFFECT: u8 = 1;

/// LED owned by an explicit static command.
pub const PRIORITY_STATIC: u8 = 2;

// ── TCP line protocol ──

/// Default listen address of the server.
pub const DEFAULT_LISTEN_HOST: &str = "0.0.0.0";

/// Default TCP port (server and client).
pub const DEFAULT_PORT: u16 = 8766;

/// Address the client connects to by default.
pub const DEFAULT_CLIENT_HOST: &str = "127.0.0.1";

/// Per-connection socket read/write timeout on the server side.
pub const SESSION_IO_TIMEOUT_MS: u64 = 1000;

/// Effect keywords accepted at the end of a command line.
pub const EFFECT_KEYWORDS: [&str; 3] = ["BLINK", "FADE", "RAINBOW"];

/// Default streaming idle timeout.
pub const DEFAULT_STREAM_IDLE_TIMEOUT_MS: u64 = 3000;
