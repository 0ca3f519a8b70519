//! Board transport: trait, USB backend (Linux), dry-run and mock boards.

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use log::{debug, info};
use serde::Serialize;

use crate::command::Side;
use crate::packet::{Packet, hex_bytes};
use crate::protocol::*;

// ── Error type ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    NotFound { board: String, pid: u16 },
    OpenFailed { board: String, reason: String },
    ClaimFailed { board: String, interface: u8, reason: String },
    WriteFailed { board: String, reason: String },
    Timeout { board: String, timeout_ms: u64 },
    ShortWrite { board: String, written: usize, expected: usize },
    Unsupported,
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::NotFound { board, pid } => write!(
                f,
                "{board} board not found (VID=0x{SOLR2_VID:04X} PID=0x{pid:04X})"
            ),
            DeviceError::OpenFailed { board, reason } => {
                write!(f, "Failed to open {board} board: {reason}")
            }
            DeviceError::ClaimFailed {
                board,
                interface,
                reason,
            } => write!(f, "{board}: claim interface {interface}: {reason}"),
            DeviceError::WriteFailed { board, reason } => {
                write!(f, "{board}: USB write failed: {reason}")
            }
            DeviceError::Timeout { board, timeout_ms } => {
                write!(f, "{board}: USB write timed out after {timeout_ms}ms")
            }
            DeviceError::ShortWrite {
                board,
                written,
                expected,
            } => write!(f, "{board}: short write ({written}/{expected} bytes)"),
            DeviceError::Unsupported => {
                write!(f, "USB access is not supported on this platform (use --dry-run)")
            }
        }
    }
}

impl std::error::Error for DeviceError {}

pub type Result<T> = std::result::Result<T, DeviceError>;

// ── Trait ──

/// One LED board that accepts raw packets.
pub trait LedBoard: Send {
    /// Label used in logs and errors (`LEFT` / `RIGHT`).
    fn name(&self) -> &str;

    /// Write one packet to the board's OUT endpoint.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Release the underlying device. Writes after close are undefined.
    fn close(&mut self) {}
}

/// USB parameters shared by both boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbSettings {
    pub interface: u8,
    pub endpoint: u8,
    pub timeout: Duration,
}

impl Default for UsbSettings {
    fn default() -> Self {
        UsbSettings {
            interface: DEFAULT_USB_INTERFACE,
            endpoint: DEFAULT_USB_ENDPOINT,
            timeout: Duration::from_millis(DEFAULT_USB_TIMEOUT_MS),
        }
    }
}

// ── Dry run ──

/// Board that only logs what it would write.
pub struct DryRunBoard {
    name: String,
}

impl DryRunBoard {
    pub fn new(name: &str) -> Self {
        DryRunBoard {
            name: name.to_string(),
        }
    }
}

impl LedBoard for DryRunBoard {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        debug!("[usb:dry] {} ({}B) {}", self.name, data.len(), hex_bytes(data));
        Ok(())
    }
}

// ── Linux implementation ──

#[cfg(target_os = "linux")]
mod linux_impl {
    use super::*;
    use std::sync::mpsc;

    use futures::channel::oneshot;
    use futures::executor::block_on;
    use futures::future::{Either, select};

    /// Request/response pair for the I/O worker thread.
    struct WriteRequest {
        data: Vec<u8>,
        cancel: oneshot::Receiver<()>,
        reply: mpsc::Sender<std::result::Result<usize, String>>,
    }

    pub struct UsbBoard {
        name: String,
        settings: UsbSettings,
        /// Channel to the dedicated I/O worker. `None` once closed.
        io_tx: Option<mpsc::Sender<WriteRequest>>,
    }

    impl UsbBoard {
        /// Find the board by VID/PID, detach the kernel driver and claim the
        /// LED interface.
        pub fn open(name: &str, pid: u16, settings: UsbSettings) -> Result<Self> {
            let device_info = nusb::list_devices()
                .map_err(|e| DeviceError::OpenFailed {
                    board: name.to_string(),
                    reason: format!("USB enumeration: {e}"),
                })?
                .find(|dev| dev.vendor_id() == SOLR2_VID && dev.product_id() == pid)
                .ok_or_else(|| DeviceError::NotFound {
                    board: name.to_string(),
                    pid,
                })?;

            let device = device_info.open().map_err(|e| DeviceError::OpenFailed {
                board: name.to_string(),
                reason: format!("USB open: {e}"),
            })?;

            let interface = device
                .detach_and_claim_interface(settings.interface)
                .map_err(|e| DeviceError::ClaimFailed {
                    board: name.to_string(),
                    interface: settings.interface,
                    reason: e.to_string(),
                })?;

            info!(
                "Opened {name} board (usb:{:03}/{:03} {SOLR2_VID:04x}:{pid:04x}) \
                 iface={} ep=0x{:02X}",
                device_info.bus_number(),
                device_info.device_address(),
                settings.interface,
                settings.endpoint
            );

            Ok(UsbBoard {
                name: name.to_string(),
                settings,
                io_tx: Some(Self::spawn_io_worker(interface, settings.endpoint)),
            })
        }

        /// Start the I/O worker. It owns the claimed interface and runs until
        /// the sender is dropped.
        fn spawn_io_worker(interface: nusb::Interface, endpoint: u8) -> mpsc::Sender<WriteRequest> {
            let (tx, rx) = mpsc::channel::<WriteRequest>();
            std::thread::spawn(move || {
                while let Ok(req) = rx.recv() {
                    let transfer = Box::pin(interface.interrupt_out(endpoint, req.data));
                    let result = match block_on(select(transfer, req.cancel)) {
                        Either::Left((completion, _)) => completion
                            .into_result()
                            .map(|buf| buf.actual_length())
                            .map_err(|e| e.to_string()),
                        // Dropping the transfer future cancels it.
                        Either::Right(_) => Err("cancelled".into()),
                    };
                    let _ = req.reply.send(result);
                }
            });
            tx
        }
    }

    impl LedBoard for UsbBoard {
        fn name(&self) -> &str {
            &self.name
        }

        fn write(&mut self, data: &[u8]) -> Result<()> {
            let io_tx = self.io_tx.as_ref().ok_or_else(|| DeviceError::WriteFailed {
                board: self.name.clone(),
                reason: "board is closed".into(),
            })?;

            let (cancel_tx, cancel_rx) = oneshot::channel();
            let (reply_tx, reply_rx) = mpsc::channel();
            io_tx
                .send(WriteRequest {
                    data: data.to_vec(),
                    cancel: cancel_rx,
                    reply: reply_tx,
                })
                .map_err(|_| DeviceError::WriteFailed {
                    board: self.name.clone(),
                    reason: "I/O worker thread has exited".into(),
                })?;

            match reply_rx.recv_timeout(self.settings.timeout) {
                Ok(Ok(written)) if written < data.len() => Err(DeviceError::ShortWrite {
                    board: self.name.clone(),
                    written,
                    expected: data.len(),
                }),
                Ok(Ok(_)) => Ok(()),
                Ok(Err(reason)) => Err(DeviceError::WriteFailed {
                    board: self.name.clone(),
                    reason,
                }),
                Err(_) => {
                    let _ = cancel_tx.send(());
                    Err(DeviceError::Timeout {
                        board: self.name.clone(),
                        timeout_ms: self.settings.timeout.as_millis() as u64,
                    })
                }
            }
        }

        fn close(&mut self) {
            if self.io_tx.take().is_some() {
                info!("Closed {} board", self.name);
            }
        }
    }
}

#[cfg(target_os = "linux")]
pub use linux_impl::UsbBoard;

/// Open a real USB board for the current platform.
pub fn open_usb_board(name: &str, pid: u16, settings: UsbSettings) -> Result<Box<dyn LedBoard>> {
    #[cfg(target_os = "linux")]
    {
        Ok(Box::new(UsbBoard::open(name, pid, settings)?))
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = (name, pid, settings);
        Err(DeviceError::Unsupported)
    }
}

// ── Board pair ──

/// The left and right boards plus write pacing.
pub struct Boards {
    left: Mutex<Box<dyn LedBoard>>,
    right: Mutex<Box<dyn LedBoard>>,
    repeat: u32,
    tx_delay: Duration,
}

impl Boards {
    /// Wrap two already-open boards. `repeat` is raised to at least 1.
    pub fn new(
        left: Box<dyn LedBoard>,
        right: Box<dyn LedBoard>,
        repeat: u32,
        tx_delay: Duration,
    ) -> Self {
        Boards {
            left: Mutex::new(left),
            right: Mutex::new(right),
            repeat: repeat.max(1),
            tx_delay,
        }
    }

    /// Open both boards (right first), or two dry-run boards.
    pub fn open(
        settings: UsbSettings,
        dry_run: bool,
        repeat: u32,
        tx_delay: Duration,
    ) -> Result<Self> {
        let (right, left): (Box<dyn LedBoard>, Box<dyn LedBoard>) = if dry_run {
            info!("Dry run: USB writes are logged only");
            (
                Box::new(DryRunBoard::new("RIGHT")),
                Box::new(DryRunBoard::new("LEFT")),
            )
        } else {
            let right = open_usb_board("RIGHT", PID_RIGHT, settings)?;
            let left = open_usb_board("LEFT", PID_LEFT, settings)?;
            (right, left)
        };
        Ok(Self::new(left, right, repeat, tx_delay))
    }

    /// Write `packets` to the boards `side` targets (`Both`: right, then left).
    ///
    /// Each packet is written `repeat` times, followed by the inter-packet
    /// delay. The first failed write aborts the call.
    pub fn send_packets(&self, packets: &[Packet], side: Side) -> Result<()> {
        if packets.is_empty() {
            return Ok(());
        }
        let targets = match side {
            Side::Both => vec![&self.right, &self.left],
            Side::Left => vec![&self.left],
            Side::Right => vec![&self.right],
        };
        for board in targets {
            let mut board = board.lock().unwrap_or_else(|e| e.into_inner());
            for p in packets {
                for _ in 0..self.repeat {
                    board.write(p.as_bytes())?;
                }
                if !self.tx_delay.is_zero() {
                    std::thread::sleep(self.tx_delay);
                }
            }
        }
        Ok(())
    }

    /// Release both boards.
    pub fn close(&self) {
        for board in [&self.right, &self.left] {
            board.lock().unwrap_or_else(|e| e.into_inner()).close();
        }
    }
}

// ── Enumeration ──

/// An attached SOL-R2 board (not opened).
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredBoard {
    /// `LEFT` or `RIGHT`.
    pub side: &'static str,
    pub path: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub product: Option<String>,
    pub serial: Option<String>,
}

fn side_for_pid(pid: u16) -> Option<&'static str> {
    match pid {
        PID_RIGHT => Some("RIGHT"),
        PID_LEFT => Some("LEFT"),
        _ => None,
    }
}

/// List attached boards. Always empty on unsupported platforms.
pub fn enumerate_boards() -> Vec<DiscoveredBoard> {
    #[cfg(target_os = "linux")]
    {
        enumerate_boards_linux()
    }
    #[cfg(not(target_os = "linux"))]
    {
        Vec::new()
    }
}

#[cfg(target_os = "linux")]
fn enumerate_boards_linux() -> Vec<DiscoveredBoard> {
    let Ok(devices) = nusb::list_devices() else {
        return Vec::new();
    };

    devices
        .filter(|dev| dev.vendor_id() == SOLR2_VID)
        .filter_map(|dev| {
            let side = side_for_pid(dev.product_id())?;
            Some(DiscoveredBoard {
                side,
                path: format!("usb:{:03}/{:03}", dev.bus_number(), dev.device_address()),
                vendor_id: dev.vendor_id(),
                product_id: dev.product_id(),
                product: dev.product_string().map(|s| s.to_string()),
                serial: dev.serial_number().map(|s| s.to_string()),
            })
        })
        .collect()
}

// ── Mock board for testing ──

/// In-memory board for unit and integration tests.
///
/// Always compiled, hidden from public docs.
#[doc(hidden)]
pub mod mock {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Records every write. Clones share the same log, so a test can keep one
    /// handle while the other lives inside [`Boards`].
    #[derive(Clone)]
    pub struct MockBoard {
        name: String,
        writes: Arc<Mutex<Vec<Vec<u8>>>>,
        fail: Arc<AtomicBool>,
        closed: Arc<AtomicBool>,
    }

    impl MockBoard {
        pub fn new(name: &str) -> Self {
            MockBoard {
                name: name.to_string(),
                writes: Arc::new(Mutex::new(Vec::new())),
                fail: Arc::new(AtomicBool::new(false)),
                closed: Arc::new(AtomicBool::new(false)),
            }
        }

        /// Copy of all packets written so far.
        pub fn writes(&self) -> Vec<Vec<u8>> {
            self.writes.lock().unwrap_or_else(|e| e.into_inner()).clone()
        }

        pub fn clear(&self) {
            self.writes.lock().unwrap_or_else(|e| e.into_inner()).clear();
        }

        /// Make subsequent writes fail with `WriteFailed`.
        pub fn fail_writes(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        pub fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    impl LedBoard for MockBoard {
        fn name(&self) -> &str {
            &self.name
        }

        fn write(&mut self, data: &[u8]) -> Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(DeviceError::WriteFailed {
                    board: self.name.clone(),
                    reason: "mock: write failure injected".into(),
                });
            }
            self.writes
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(data.to_vec());
            Ok(())
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// A [`Boards`] pair backed by mocks, returning `(boards, left, right)`.
    pub fn mock_boards(repeat: u32) -> (Boards, MockBoard, MockBoard) {
        let left = MockBoard::new("LEFT");
        let right = MockBoard::new("RIGHT");
        let boards = Boards::new(
            Box::new(left.clone()),
            Box::new(right.clone()),
            repeat,
            Duration::ZERO,
        );
        (boards, left, right)
    }
}

#[cfg(test)]
mod tests {
    use super::mock::*;
    use super::*;
    use crate::packet::{Entry, pack_by_header};

    fn packets(n: u8) -> Vec<Packet> {
        let entries: Vec<Entry> = (0..n)
            .map(|i| Entry {
                header: [0x01, 0x08, 0x05, 0xFF],
                data: [i, 1, 2, 3],
            })
            .collect();
        pack_by_header(&entries, 1)
    }

    #[test]
    fn both_writes_each_board() {
        let (boards, left, right) = mock_boards(1);
        boards.send_packets(&packets(2), Side::Both).unwrap();
        assert_eq!(left.writes().len(), 2);
        assert_eq!(right.writes().len(), 2);
        assert_eq!(left.writes()[1][4], 1);
    }

    #[test]
    fn single_side_targets_one_board() {
        let (boards, left, right) = mock_boards(1);
        boards.send_packets(&packets(1), Side::Left).unwrap();
        assert_eq!(left.writes().len(), 1);
        assert!(right.writes().is_empty());
    }

    #[test]
    fn repeat_writes_each_packet_n_times() {
        let (boards, left, _) = mock_boards(3);
        boards.send_packets(&packets(2), Side::Left).unwrap();
        let w = left.writes();
        assert_eq!(w.len(), 6);
        assert_eq!(w[0], w[2]);
        assert_ne!(w[2], w[3]);
    }

    #[test]
    fn repeat_zero_is_raised_to_one() {
        let (boards, _, right) = mock_boards(0);
        boards.send_packets(&packets(1), Side::Right).unwrap();
        assert_eq!(right.writes().len(), 1);
    }

    #[test]
    fn both_stops_at_first_failure() {
        let (boards, left, right) = mock_boards(1);
        right.fail_writes(true);
        let err = boards.send_packets(&packets(1), Side::Both).unwrap_err();
        assert!(matches!(err, DeviceError::WriteFailed { ref board, .. } if board == "RIGHT"));
        // Right goes first, so left is never reached.
        assert!(left.writes().is_empty());
    }

    #[test]
    fn empty_packet_list_is_noop() {
        let (boards, left, right) = mock_boards(1);
        left.fail_writes(true);
        boards.send_packets(&[], Side::Both).unwrap();
        assert!(right.writes().is_empty());
    }

    #[test]
    fn close_closes_both() {
        let (boards, left, right) = mock_boards(1);
        boards.close();
        assert!(left.is_closed());
        assert!(right.is_closed());
    }

    #[test]
    fn dry_run_open_never_touches_usb() {
        let boards = Boards::open(UsbSettings::default(), true, 1, Duration::ZERO).unwrap();
        boards.send_packets(&packets(1), Side::Both).unwrap();
    }

    #[test]
    fn side_for_known_pids() {
        assert_eq!(side_for_pid(PID_RIGHT), Some("RIGHT"));
        assert_eq!(side_for_pid(PID_LEFT), Some("LEFT"));
        assert_eq!(side_for_pid(0x1234), None);
    }

    #[test]
    fn error_messages() {
        let e = DeviceError::NotFound {
            board: "LEFT".into(),
            pid: PID_LEFT,
        };
        assert_eq!(e.to_string(), "LEFT board not found (VID=0x044F PID=0x042A)");
        let e = DeviceError::ShortWrite {
            board: "RIGHT".into(),
            written: 4,
            expected: 8,
        };
        assert_eq!(e.to_string(), "RIGHT: short write (4/8 bytes)");
    }

    #[test]
    fn enumerate_boards_returns_vec() {
        // Must not panic with or without hardware attached.
        let _ = enumerate_boards();
    }
}
