//! Shared server state: address map, color store, effects and boards.
//!
//! One [`Engine`] is built at startup and shared (via `Arc`) by every session
//! thread and the streaming thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use log::debug;

use crate::address_map::AddressMap;
use crate::device::{self, Boards};
use crate::effect::EffectRegistry;
use crate::packet::SideBatches;
use crate::protocol::{DEFAULT_STREAM_IDLE_TIMEOUT_MS, MAX_ENTRIES_PER_PACKET};
use crate::state::StateStore;

/// Packing and streaming parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Entries per packet, clamped to `1..=15` when packing.
    pub max_entries: usize,
    /// Streaming tick; zero disables streaming.
    pub stream_interval: Duration,
    /// Streaming goes idle after this long without commands (and no
    /// effects). Zero disables idling.
    pub idle_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            max_entries: MAX_ENTRIES_PER_PACKET,
            stream_interval: Duration::ZERO,
            idle_timeout: Duration::from_millis(DEFAULT_STREAM_IDLE_TIMEOUT_MS),
        }
    }
}

pub struct Engine {
    map: Arc<AddressMap>,
    state: StateStore,
    effects: EffectRegistry,
    boards: Boards,
    settings: EngineSettings,
    epoch: Instant,
    /// Milliseconds since `epoch` of the last non-empty session. Starts at
    /// zero, so startup counts as the last command.
    last_rx_ms: AtomicU64,
}

impl Engine {
    pub fn new(map: Arc<AddressMap>, boards: Boards, settings: EngineSettings) -> Self {
        Engine {
            state: StateStore::new(map.names()),
            effects: EffectRegistry::new(Arc::clone(&map)),
            map,
            boards,
            settings,
            epoch: Instant::now(),
            last_rx_ms: AtomicU64::new(0),
        }
    }

    pub fn map(&self) -> &AddressMap {
        &self.map
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    pub fn effects(&self) -> &EffectRegistry {
        &self.effects
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn streaming_enabled(&self) -> bool {
        !self.settings.stream_interval.is_zero()
    }

    /// Record that a command batch arrived now.
    pub fn mark_received(&self) {
        self.mark_received_at(Instant::now());
    }

    pub fn mark_received_at(&self, at: Instant) {
        let ms = at.saturating_duration_since(self.epoch).as_millis() as u64;
        self.last_rx_ms.store(ms, Ordering::Relaxed);
    }

    /// Time since the last command batch (or since startup, before any).
    pub fn since_last_received(&self, now: Instant) -> Duration {
        let at = self.epoch + Duration::from_millis(self.last_rx_ms.load(Ordering::Relaxed));
        now.saturating_duration_since(at)
    }

    /// Pack and write every non-empty batch (both, then left, then right).
    ///
    /// Returns the number of packets written per board pass.
    pub fn transmit(&self, batches: &SideBatches) -> device::Result<usize> {
        let packed = batches.pack(self.settings.max_entries);
        let mut sent = 0;
        for (side, packets) in packed.iter() {
            for p in packets {
                debug!(
                    "[pack] {side} len={} header=[{}] entries={} hex={}",
                    p.len(),
                    crate::packet::hex_bytes(p.header()),
                    p.entry_count(),
                    p.hex()
                );
            }
            self.boards.send_packets(packets, side)?;
            sent += packets.len();
        }
        Ok(sent)
    }

    /// Release both boards.
    pub fn close(&self) {
        self.boards.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::command::Side;
    use crate::device::mock::mock_boards;
    use crate::packet::build_entry;

    fn engine(
        settings: EngineSettings,
    ) -> (Engine, device::mock::MockBoard, device::mock::MockBoard) {
        let (boards, left, right) = mock_boards(1);
        let map = Arc::new(AddressMap::builtin().unwrap());
        (Engine::new(map, boards, settings), left, right)
    }

    #[test]
    fn store_is_seeded_from_map() {
        let (e, _, _) = engine(EngineSettings::default());
        assert_eq!(e.state().len(), 2 * e.map().len());
    }

    #[test]
    fn last_received_starts_at_startup() {
        let (e, _, _) = engine(EngineSettings::default());
        let since = e.since_last_received(Instant::now() + Duration::from_secs(10));
        assert!(since >= Duration::from_secs(10) && since < Duration::from_secs(11));
    }

    #[test]
    fn last_received_tracks_marks() {
        let (e, _, _) = engine(EngineSettings::default());
        let t = Instant::now();
        e.mark_received_at(t);
        let later = t + Duration::from_millis(2500);
        let since = e.since_last_received(later);
        // Millisecond truncation of the stored mark.
        assert!(since >= Duration::from_millis(2500) && since < Duration::from_millis(2502));
    }

    #[test]
    fn streaming_flag_follows_interval() {
        let (e, _, _) = engine(EngineSettings::default());
        assert!(!e.streaming_enabled());
        let (e, _, _) = engine(EngineSettings {
            stream_interval: Duration::from_millis(20),
            ..Default::default()
        });
        assert!(e.streaming_enabled());
    }

    #[test]
    fn transmit_routes_batches() {
        let (e, left, right) = engine(EngineSettings::default());
        let mut batches = SideBatches::default();
        let entry = build_entry(e.map(), "LED1", Rgb::new(10, 20, 30)).unwrap();
        batches.push(Side::Both, entry);
        batches.push(Side::Left, entry);
        let sent = e.transmit(&batches).unwrap();
        assert_eq!(sent, 2);
        assert_eq!(left.writes().len(), 2);
        assert_eq!(right.writes().len(), 1);
    }

    #[test]
    fn transmit_empty_writes_nothing() {
        let (e, left, right) = engine(EngineSettings::default());
        assert_eq!(e.transmit(&SideBatches::default()).unwrap(), 0);
        assert!(left.writes().is_empty() && right.writes().is_empty());
    }
}
