//! USB packet construction.
//!
//! Entries sharing a bank header are grouped and chunked so that no packet
//! exceeds [`USB_REPORT_SIZE`](crate::protocol::USB_REPORT_SIZE).

use std::fmt::Write as _;

use crate::address_map::{AddressError, AddressMap};
use crate::color::Rgb;
use crate::command::Side;
use crate::protocol::{ENTRY_LEN, HEADER_LEN, MAX_ENTRIES_PER_PACKET};

/// 4-byte bank header.
pub type Header = [u8; HEADER_LEN];

/// One LED update: its bank header plus `[addr, r, g, b]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub header: Header,
    pub data: [u8; ENTRY_LEN],
}

/// Resolve `led` and encode it with `color`.
pub fn build_entry(map: &AddressMap, led: &str, color: Rgb) -> Result<Entry, AddressError> {
    let addr = map.resolve(led)?;
    Ok(Entry {
        header: addr.header,
        data: [addr.address, color.r, color.g, color.b],
    })
}

/// A ready-to-write report: `header || entries`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet(Vec<u8>);

impl Packet {
    pub fn header(&self) -> &[u8] {
        &self.0[..HEADER_LEN]
    }

    pub fn entry_count(&self) -> usize {
        (self.0.len() - HEADER_LEN) / ENTRY_LEN
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false: a packet carries at least its header.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Upper-case, space-separated hex dump.
    pub fn hex(&self) -> String {
        hex_bytes(&self.0)
    }
}

/// Format bytes as `"01 08 05 FF"`.
pub fn hex_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{b:02X}");
    }
    out
}

/// Group entries by header (first-seen order) and chunk each group.
///
/// `max_entries` is clamped to `1..=15`, so every packet fits a 64-byte
/// report. Entry order within a group is preserved.
pub fn pack_by_header(entries: &[Entry], max_entries: usize) -> Vec<Packet> {
    let max_entries = max_entries.clamp(1, MAX_ENTRIES_PER_PACKET);

    let mut groups: Vec<(Header, Vec<[u8; ENTRY_LEN]>)> = Vec::new();
    for e in entries {
        match groups.iter_mut().find(|(h, _)| *h == e.header) {
            Some((_, list)) => list.push(e.data),
            None => groups.push((e.header, vec![e.data])),
        }
    }

    let mut packets = Vec::new();
    for (header, list) in &groups {
        for chunk in list.chunks(max_entries) {
            let mut buf = Vec::with_capacity(HEADER_LEN + chunk.len() * ENTRY_LEN);
            buf.extend_from_slice(header);
            for data in chunk {
                buf.extend_from_slice(data);
            }
            packets.push(Packet(buf));
        }
    }
    packets
}

/// Entries collected per target side before packing.
#[derive(Debug, Default, Clone)]
pub struct SideBatches {
    pub both: Vec<Entry>,
    pub left: Vec<Entry>,
    pub right: Vec<Entry>,
}

/// Packets ready to transmit, per target side.
#[derive(Debug, Default, Clone)]
pub struct SidePackets {
    pub both: Vec<Packet>,
    pub left: Vec<Packet>,
    pub right: Vec<Packet>,
}

impl SidePackets {
    /// Non-empty packet lists in transmit order (both, left, right).
    pub fn iter(&self) -> impl Iterator<Item = (Side, &[Packet])> {
        [
            (Side::Both, self.both.as_slice()),
            (Side::Left, self.left.as_slice()),
            (Side::Right, self.right.as_slice()),
        ]
        .into_iter()
        .filter(|(_, p)| !p.is_empty())
    }
}

impl SideBatches {
    pub fn push(&mut self, side: Side, entry: Entry) {
        match side {
            Side::Both => self.both.push(entry),
            Side::Left => self.left.push(entry),
            Side::Right => self.right.push(entry),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.both.is_empty() && self.left.is_empty() && self.right.is_empty()
    }

    /// Total entry count across sides.
    pub fn len(&self) -> usize {
        self.both.len() + self.left.len() + self.right.len()
    }

    pub fn pack(&self, max_entries: usize) -> SidePackets {
        SidePackets {
            both: pack_by_header(&self.both, max_entries),
            left: pack_by_header(&self.left, max_entries),
            right: pack_by_header(&self.right, max_entries),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::USB_REPORT_SIZE;

    const BANK_A: Header = [0x01, 0x08, 0x05, 0xFF];
    const BANK_B: Header = [0x01, 0x88, 0x01, 0xFF];

    fn entry(header: Header, addr: u8) -> Entry {
        Entry {
            header,
            data: [addr, 1, 2, 3],
        }
    }

    #[test]
    fn build_entry_encodes_address_and_color() {
        let map = AddressMap::builtin().unwrap();
        let e = build_entry(&map, "LED1", Rgb::new(10, 20, 30)).unwrap();
        assert_eq!(e.header, BANK_A);
        assert_eq!(e.data, [0x11, 10, 20, 30]);
    }

    #[test]
    fn build_entry_unknown_led() {
        let map = AddressMap::builtin().unwrap();
        assert!(build_entry(&map, "LED9", Rgb::BLACK).is_err());
    }

    #[test]
    fn empty_input_yields_no_packets() {
        assert!(pack_by_header(&[], 15).is_empty());
    }

    #[test]
    fn single_entry_packet_bytes() {
        let p = pack_by_header(
            &[Entry {
                header: BANK_A,
                data: [0x11, 0x0A, 0x14, 0x1E],
            }],
            15,
        );
        assert_eq!(p.len(), 1);
        assert_eq!(p[0].as_bytes(), &[0x01, 0x08, 0x05, 0xFF, 0x11, 0x0A, 0x14, 0x1E]);
        assert_eq!(p[0].hex(), "01 08 05 FF 11 0A 14 1E");
        assert_eq!(p[0].entry_count(), 1);
        assert_eq!(p[0].header(), &BANK_A);
    }

    #[test]
    fn groups_by_header_in_first_seen_order() {
        let entries = [entry(BANK_B, 0), entry(BANK_A, 1), entry(BANK_B, 2), entry(BANK_A, 3)];
        let p = pack_by_header(&entries, 15);
        assert_eq!(p.len(), 2);
        assert_eq!(p[0].header(), &BANK_B);
        assert_eq!(p[0].as_bytes()[4], 0);
        assert_eq!(p[0].as_bytes()[8], 2);
        assert_eq!(p[1].header(), &BANK_A);
        assert_eq!(p[1].entry_count(), 2);
    }

    #[test]
    fn chunks_respect_max_entries() {
        let entries: Vec<Entry> = (0..20).map(|i| entry(BANK_A, i)).collect();
        let p = pack_by_header(&entries, 8);
        let counts: Vec<usize> = p.iter().map(Packet::entry_count).collect();
        assert_eq!(counts, vec![8, 8, 4]);
        // Partition: every entry appears exactly once, in order.
        let addrs: Vec<u8> = p
            .iter()
            .flat_map(|pk| pk.as_bytes()[HEADER_LEN..].chunks(ENTRY_LEN).map(|c| c[0]))
            .collect();
        assert_eq!(addrs, (0..20).collect::<Vec<u8>>());
    }

    #[test]
    fn max_entries_is_clamped() {
        let entries: Vec<Entry> = (0..40).map(|i| entry(BANK_A, i)).collect();
        for p in pack_by_header(&entries, 100) {
            assert!(p.len() <= USB_REPORT_SIZE);
            assert!(p.entry_count() <= MAX_ENTRIES_PER_PACKET);
        }
        assert_eq!(pack_by_header(&entries[..3], 0).len(), 3);
    }

    #[test]
    fn side_batches_route_and_pack() {
        let mut b = SideBatches::default();
        assert!(b.is_empty());
        b.push(Side::Left, entry(BANK_A, 1));
        b.push(Side::Left, entry(BANK_A, 2));
        b.push(Side::Both, entry(BANK_B, 0));
        assert_eq!(b.len(), 3);
        let packed = b.pack(15);
        let order: Vec<Side> = packed.iter().map(|(s, _)| s).collect();
        assert_eq!(order, vec![Side::Both, Side::Left]);
        assert_eq!(packed.left[0].entry_count(), 2);
    }

    #[test]
    fn hex_bytes_format() {
        assert_eq!(hex_bytes(&[]), "");
        assert_eq!(hex_bytes(&[0x0a, 0xff]), "0A FF");
    }
}
