//! Streaming loop: periodically push only the LEDs whose output changed.
//!
//! Each tick snapshots the color store, applies effects, diffs the result
//! against the previous frame and transmits the difference. With no recent
//! commands and no running effects the loop idles and forgets its previous
//! frame, so the first tick after idling resends everything.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::device;
use crate::engine::Engine;
use crate::packet::{SideBatches, build_entry};
use crate::state::Frame;

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Idle timeout elapsed with no effects running; nothing computed.
    Idle,
    /// Frame identical to the previous one.
    Unchanged,
    /// This many LED entries were transmitted.
    Sent(usize),
}

pub struct Streamer {
    engine: Arc<Engine>,
    interval: Duration,
    prev: Frame,
}

impl Streamer {
    pub fn new(engine: Arc<Engine>) -> Self {
        let interval = engine.settings().stream_interval;
        Streamer {
            engine,
            interval,
            prev: Frame::new(),
        }
    }

    fn is_idle(&self, now: Instant) -> bool {
        let idle_timeout = self.engine.settings().idle_timeout;
        if idle_timeout.is_zero() || self.engine.effects().has_active_effects() {
            return false;
        }
        self.engine.since_last_received(now) > idle_timeout
    }

    /// Run one streaming step at `now`.
    pub fn tick(&mut self, now: Instant) -> device::Result<TickOutcome> {
        if self.is_idle(now) {
            if !self.prev.is_empty() {
                debug!("[stream] idle, no effects running");
            }
            self.prev.clear();
            return Ok(TickOutcome::Idle);
        }

        let map = self.engine.map();
        let effects = self.engine.effects();
        let mut frame = Frame::new();
        let mut batches = SideBatches::default();
        for ((side, led), base) in self.engine.state().snapshot() {
            let color = effects.compute(side, &led, base, now);
            if self.prev.get(&(side, led.clone())) != Some(&color) {
                for name in map.expand(&led) {
                    // Store keys come from the map, so this only skips
                    // names that no longer resolve.
                    if let Ok(entry) = build_entry(map, &name, color) {
                        batches.push(side, entry);
                    }
                }
            }
            frame.insert((side, led), color);
        }
        // Persist before sending: a failed write is not retried next tick.
        self.prev = frame;

        if batches.is_empty() {
            return Ok(TickOutcome::Unchanged);
        }
        let entries = batches.len();
        self.engine.transmit(&batches)?;
        Ok(TickOutcome::Sent(entries))
    }

    /// Tick every interval until `stop` is set. Tick errors are logged.
    pub fn run(mut self, stop: &AtomicBool) {
        info!("Streaming every {}ms", self.interval.as_millis());
        while !stop.load(Ordering::SeqCst) {
            if let Err(e) = self.tick(Instant::now()) {
                warn!("Stream tick failed: {e}");
            }
            std::thread::sleep(self.interval);
        }
        debug!("[stream] stopped");
    }
}

/// Start the streaming thread, or return `None` when streaming is disabled.
pub fn spawn_streamer(engine: Arc<Engine>, stop: Arc<AtomicBool>) -> Option<JoinHandle<()>> {
    if !engine.streaming_enabled() {
        return None;
    }
    let streamer = Streamer::new(engine);
    Some(std::thread::spawn(move || streamer.run(&stop)))
}

/// Wait up to `timeout` for a thread to finish. Returns `false` (and detaches
/// the thread) if it is still running.
pub fn join_with_timeout(handle: JoinHandle<()>, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    let _ = handle.join();
    true
}
