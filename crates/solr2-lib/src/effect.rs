//! Time-based LED effects (blink, fade, rainbow).
//!
//! The registry holds at most one [`EffectDescriptor`] per concrete
//! `(side, LED)`. The streaming loop asks [`EffectRegistry::compute`] for the
//! color a LED should show at a given instant.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::debug;

use crate::address_map::AddressMap;
use crate::color::{Rgb, hsv_to_rgb};
use crate::command::{EffectMode, Side};

/// A running effect on one concrete LED.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectDescriptor {
    pub mode: EffectMode,
    /// Always at least 1.
    pub period_ms: u64,
    pub start: Instant,
    /// Color the effect modulates.
    pub color: Rgb,
    pub priority: u8,
}

impl EffectDescriptor {
    fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    /// Fraction of the current cycle elapsed at `t`, in `0.0..1.0`.
    fn phase(&self, t: Duration) -> f64 {
        let p = self.period().as_nanos();
        (t.as_nanos() % p) as f64 / p as f64
    }

    /// Output color at `now`.
    pub fn color_at(&self, now: Instant) -> Rgb {
        let t = now.saturating_duration_since(self.start);
        match self.mode {
            // On for one period, off for the next.
            EffectMode::Blink => {
                let half_cycles = t.as_nanos() / self.period().as_nanos();
                if half_cycles % 2 == 0 {
                    self.color
                } else {
                    Rgb::BLACK
                }
            }
            // Triangle wave 0 → 1 → 0 over one period.
            EffectMode::Fade => {
                let phase = self.phase(t);
                let k = if phase < 0.5 {
                    phase * 2.0
                } else {
                    (1.0 - phase) * 2.0
                };
                self.color.scale(k)
            }
            EffectMode::Rainbow => {
                let h = self.phase(t);
                let v = match self.color.max_channel() {
                    0 => 1.0,
                    m => m as f64 / 255.0,
                };
                let (r, g, b) = hsv_to_rgb(h, 1.0, v);
                Rgb::from_unit(r, g, b)
            }
        }
    }
}

pub struct EffectRegistry {
    map: Arc<AddressMap>,
    effects: Mutex<HashMap<(Side, String), EffectDescriptor>>,
}

impl EffectRegistry {
    pub fn new(map: Arc<AddressMap>) -> Self {
        EffectRegistry {
            map,
            effects: Mutex::new(HashMap::new()),
        }
    }

    /// Set or clear (`mode = None`) the effect on a LED, starting now.
    pub fn set_effect(
        &self,
        side: Side,
        led: &str,
        mode: Option<EffectMode>,
        period_ms: i64,
        color: Rgb,
        priority: u8,
    ) {
        self.set_effect_at(side, led, mode, period_ms, color, priority, Instant::now());
    }

    /// Like [`set_effect`](Self::set_effect) with an explicit start instant.
    ///
    /// Alias groups are expanded and `Both` covers each side. Clearing is
    /// unconditional; setting only replaces a slot whose priority is not
    /// higher than `priority`.
    #[allow(clippy::too_many_arguments)]
    pub fn set_effect_at(
        &self,
        side: Side,
        led: &str,
        mode: Option<EffectMode>,
        period_ms: i64,
        color: Rgb,
        priority: u8,
        start: Instant,
    ) {
        let members = self.map.expand(led);
        let mut effects = self.effects.lock().unwrap_or_else(|e| e.into_inner());
        for &s in side.concrete() {
            for name in &members {
                let key = (s, name.clone());
                let Some(mode) = mode else {
                    if effects.remove(&key).is_some() {
                        debug!("[fx] {s} {name} cleared");
                    }
                    continue;
                };
                if effects.get(&key).is_some_and(|cur| priority < cur.priority) {
                    continue;
                }
                let period_ms = period_ms.max(1) as u64;
                debug!("[fx] {s} {name} {mode} {period_ms}ms {color}");
                effects.insert(
                    key,
                    EffectDescriptor {
                        mode,
                        period_ms,
                        start,
                        color,
                        priority,
                    },
                );
            }
        }
    }

    /// Color a LED shows at `now`: `base` when no effect is set.
    pub fn compute(&self, side: Side, led: &str, base: Rgb, now: Instant) -> Rgb {
        match self.descriptor(side, led) {
            Some(d) => d.color_at(now),
            None => base,
        }
    }

    pub fn descriptor(&self, side: Side, led: &str) -> Option<EffectDescriptor> {
        let effects = self.effects.lock().unwrap_or_else(|e| e.into_inner());
        effects.get(&(side, led.to_uppercase())).copied()
    }

    pub fn has_active_effects(&self) -> bool {
        self.active_count() > 0
    }

    pub fn active_count(&self) -> usize {
        self.effects.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
