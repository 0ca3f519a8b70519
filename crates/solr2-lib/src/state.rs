//! Priority-aware LED color store.
//!
//! One `(color, priority)` slot per `(Left|Right, LED)`. A write lands only
//! when its priority is at least the stored one. An accepted write with a
//! non-zero priority and a black color stores priority 0 instead, handing the
//! LED back to lower tiers.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::color::Rgb;
use crate::command::Side;
use crate::protocol::PRIORITY_UNCLAIMED;

/// Colors keyed by concrete side and LED name, in deterministic order.
pub type Frame = BTreeMap<(Side, String), Rgb>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedState {
    pub color: Rgb,
    pub priority: u8,
}

impl LedState {
    const OFF: LedState = LedState {
        color: Rgb::BLACK,
        priority: PRIORITY_UNCLAIMED,
    };
}

#[derive(Debug, Default)]
pub struct StateStore {
    slots: Mutex<BTreeMap<(Side, String), LedState>>,
}

impl StateStore {
    /// Seed every name on both sides as black, unclaimed.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut slots = BTreeMap::new();
        for name in names {
            let name = name.as_ref().to_uppercase();
            slots.insert((Side::Left, name.clone()), LedState::OFF);
            slots.insert((Side::Right, name), LedState::OFF);
        }
        StateStore {
            slots: Mutex::new(slots),
        }
    }

    /// Apply a write to every concrete side of `side`.
    ///
    /// Returns `true` if at least one side accepted it.
    pub fn set(&self, side: Side, led: &str, color: Rgb, priority: u8) -> bool {
        let led = led.to_uppercase();
        let stored_priority = if priority > PRIORITY_UNCLAIMED && color.is_black() {
            PRIORITY_UNCLAIMED
        } else {
            priority
        };

        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let mut accepted = false;
        for &s in side.concrete() {
            let slot = slots.entry((s, led.clone())).or_insert(LedState::OFF);
            if priority < slot.priority {
                continue;
            }
            *slot = LedState {
                color,
                priority: stored_priority,
            };
            accepted = true;
        }
        accepted
    }

    /// Stored state for a concrete side. `Both` always yields `None`.
    pub fn get(&self, side: Side, led: &str) -> Option<LedState> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.get(&(side, led.to_uppercase())).copied()
    }

    /// Copy of every stored color.
    pub fn snapshot(&self) -> Frame {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.iter().map(|(k, v)| (k.clone(), v.color)).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{PRIORITY_EFFECT, PRIORITY_STATIC};

    const RED: Rgb = Rgb::new(255, 0, 0);
    const BLUE: Rgb = Rgb::new(0, 0, 255);

    fn store() -> StateStore {
        StateStore::new(["LED1", "LED2"])
    }

    #[test]
    fn seeded_black_on_both_sides() {
        let s = store();
        assert_eq!(s.len(), 4);
        assert_eq!(s.get(Side::Left, "led1"), Some(LedState::OFF));
        assert_eq!(s.get(Side::Right, "LED2"), Some(LedState::OFF));
        assert_eq!(s.get(Side::Both, "LED1"), None);
    }

    #[test]
    fn both_writes_each_side() {
        let s = store();
        assert!(s.set(Side::Both, "LED1", RED, PRIORITY_STATIC));
        assert_eq!(s.get(Side::Left, "LED1").unwrap().color, RED);
        assert_eq!(s.get(Side::Right, "LED1").unwrap().color, RED);
    }

    #[test]
    fn single_side_leaves_other_untouched() {
        let s = store();
        s.set(Side::Left, "LED1", RED, PRIORITY_STATIC);
        assert_eq!(s.get(Side::Right, "LED1"), Some(LedState::OFF));
    }

    #[test]
    fn lower_priority_is_dropped() {
        let s = store();
        s.set(Side::Both, "LED1", RED, PRIORITY_STATIC);
        assert!(!s.set(Side::Both, "LED1", BLUE, PRIORITY_EFFECT));
        let st = s.get(Side::Left, "LED1").unwrap();
        assert_eq!(st.color, RED);
        assert_eq!(st.priority, PRIORITY_STATIC);
    }

    #[test]
    fn equal_priority_overwrites() {
        let s = store();
        s.set(Side::Both, "LED1", RED, PRIORITY_EFFECT);
        assert!(s.set(Side::Both, "LED1", BLUE, PRIORITY_EFFECT));
        assert_eq!(s.get(Side::Left, "LED1").unwrap().color, BLUE);
    }

    #[test]
    fn black_releases_ownership() {
        let s = store();
        s.set(Side::Both, "LED1", RED, PRIORITY_STATIC);
        assert!(s.set(Side::Both, "LED1", Rgb::BLACK, PRIORITY_STATIC));
        assert_eq!(s.get(Side::Left, "LED1"), Some(LedState::OFF));
        // Released LED accepts lower tiers again.
        assert!(s.set(Side::Both, "LED1", BLUE, PRIORITY_EFFECT));
    }

    #[test]
    fn partial_accept_reports_true() {
        let s = store();
        s.set(Side::Left, "LED1", RED, PRIORITY_STATIC);
        assert!(s.set(Side::Both, "LED1", BLUE, PRIORITY_EFFECT));
        assert_eq!(s.get(Side::Left, "LED1").unwrap().color, RED);
        assert_eq!(s.get(Side::Right, "LED1").unwrap().color, BLUE);
    }

    #[test]
    fn snapshot_is_ordered_copy() {
        let s = store();
        s.set(Side::Right, "LED2", BLUE, PRIORITY_STATIC);
        let snap = s.snapshot();
        let keys: Vec<_> = snap.keys().cloned().collect();
        assert_eq!(
            keys,
            vec![
                (Side::Left, "LED1".to_string()),
                (Side::Left, "LED2".to_string()),
                (Side::Right, "LED1".to_string()),
                (Side::Right, "LED2".to_string()),
            ]
        );
        assert_eq!(snap[&(Side::Right, "LED2".to_string())], BLUE);
        // Later writes don't leak into an earlier snapshot.
        s.set(Side::Right, "LED2", RED, PRIORITY_STATIC);
        assert_eq!(snap[&(Side::Right, "LED2".to_string())], BLUE);
    }
}
