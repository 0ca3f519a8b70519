//! LED address map: canonical LED names to board address + bank header.
//!
//! The map is built once at startup from a static table and is immutable
//! afterwards. Two names (`LED9`, `LED10`) are alias groups that stand for
//! several physical LEDs; [`AddressMap::expand`] turns them into their members.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::packet::Header;
use crate::protocol::HEADER_LEN;

/// Built-in table: `(name, address hex, header hex)`.
pub const BUILTIN_TABLE: &[(&str, &str, &str)] = &[
    ("LED1", "11", "01 08 05 FF"),
    ("LED2", "10", "01 08 05 FF"),
    ("LED3", "12", "01 08 05 FF"),
    ("LED4", "13", "01 08 05 FF"),
    ("LED5", "08", "01 08 05 FF"),
    ("LED6", "07", "01 08 05 FF"),
    ("LED7", "09", "01 08 05 FF"),
    ("LED8", "0A", "01 08 05 FF"),
    ("LED9A", "04", "01 08 05 FF"),
    ("LED9B", "05", "01 08 05 FF"),
    ("LED9C", "06", "01 08 05 FF"),
    ("LED9D", "0B", "01 08 05 FF"),
    ("LED9E", "0C", "01 08 05 FF"),
    ("LED9F", "0D", "01 08 05 FF"),
    ("LED9G", "0E", "01 08 05 FF"),
    ("LED9H", "0F", "01 08 05 FF"),
    ("LED10A", "01", "01 08 05 FF"),
    ("LED10B", "02", "01 08 05 FF"),
    ("LED10C", "03", "01 08 05 FF"),
    ("LED11", "00", "01 88 01 FF"),
];

/// Built-in alias groups, members in declaration order.
pub const BUILTIN_ALIASES: &[(&str, &[&str])] = &[
    (
        "LED9",
        &[
            "LED9A", "LED9B", "LED9C", "LED9D", "LED9E", "LED9F", "LED9G", "LED9H",
        ],
    ),
    ("LED10", &["LED10A", "LED10B", "LED10C"]),
];

// ── Error type ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// The name is neither a physical LED nor an alias group.
    NotFound(String),
    /// A table entry could not be parsed.
    Malformed { name: String, reason: String },
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressError::NotFound(name) => write!(f, "LED not defined: {name}"),
            AddressError::Malformed { name, reason } => {
                write!(f, "Malformed address map entry {name}: {reason}")
            }
        }
    }
}

impl std::error::Error for AddressError {}

// ── Map ──

/// Physical location of one LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedAddress {
    /// Address byte on the board.
    pub address: u8,
    /// Bank header prefixed to every packet carrying this LED.
    pub header: Header,
}

impl fmt::Display for LedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "addr=0x{:02X} header=[{}]",
            self.address,
            crate::packet::hex_bytes(&self.header)
        )
    }
}

#[derive(Debug, Clone)]
pub struct AddressMap {
    entries: Vec<(String, LedAddress)>,
    index: HashMap<String, usize>,
    aliases: Vec<(String, Vec<String>)>,
}

fn parse_hex_byte(name: &str, token: &str) -> Result<u8, AddressError> {
    u8::from_str_radix(token, 16).map_err(|_| AddressError::Malformed {
        name: name.to_string(),
        reason: format!("'{token}' is not a hex byte"),
    })
}

fn parse_header(name: &str, text: &str) -> Result<Header, AddressError> {
    let bytes = text
        .split_whitespace()
        .map(|t| parse_hex_byte(name, t))
        .collect::<Result<Vec<u8>, _>>()?;
    bytes.as_slice().try_into().map_err(|_| AddressError::Malformed {
        name: name.to_string(),
        reason: format!("header must be {HEADER_LEN} bytes, got {}", bytes.len()),
    })
}

impl AddressMap {
    /// Build a map from a raw table and alias list.
    ///
    /// Fails if any header is not exactly 4 hex bytes, any address is not a
    /// hex byte, a name is duplicated, or an alias member does not resolve.
    pub fn from_table(
        table: &[(&str, &str, &str)],
        aliases: &[(&str, &[&str])],
    ) -> Result<Self, AddressError> {
        let mut entries = Vec::with_capacity(table.len());
        let mut index = HashMap::with_capacity(table.len());
        for &(name, addr_hex, header_hex) in table {
            let key = name.trim().to_uppercase();
            let address = parse_hex_byte(&key, addr_hex.trim())?;
            let header = parse_header(&key, header_hex)?;
            if index.insert(key.clone(), entries.len()).is_some() {
                return Err(AddressError::Malformed {
                    name: key,
                    reason: "duplicate entry".into(),
                });
            }
            entries.push((key, LedAddress { address, header }));
        }

        let mut groups = Vec::with_capacity(aliases.len());
        for &(alias, members) in aliases {
            let alias = alias.trim().to_uppercase();
            let mut resolved = Vec::with_capacity(members.len());
            for m in members {
                let m = m.trim().to_uppercase();
                if !index.contains_key(&m) {
                    return Err(AddressError::Malformed {
                        name: alias,
                        reason: format!("alias member {m} is not in the table"),
                    });
                }
                resolved.push(m);
            }
            groups.push((alias, resolved));
        }

        Ok(AddressMap {
            entries,
            index,
            aliases: groups,
        })
    }

    /// The embedded SOL-R2 map.
    pub fn builtin() -> Result<Self, AddressError> {
        Self::from_table(BUILTIN_TABLE, BUILTIN_ALIASES)
    }

    /// Look up the physical address of a LED (case-insensitive).
    pub fn resolve(&self, name: &str) -> Result<LedAddress, AddressError> {
        let key = name.trim().to_uppercase();
        self.index
            .get(&key)
            .map(|&i| self.entries[i].1)
            .ok_or(AddressError::NotFound(key))
    }

    /// Expand an alias group into its members; any other name maps to itself.
    pub fn expand(&self, name: &str) -> Vec<String> {
        let key = name.trim().to_uppercase();
        match self.aliases.iter().find(|(alias, _)| *alias == key) {
            Some((_, members)) => members.clone(),
            None => vec![key],
        }
    }

    pub fn is_alias(&self, name: &str) -> bool {
        let key = name.trim().to_uppercase();
        self.aliases.iter().any(|(alias, _)| *alias == key)
    }

    /// Whether `name` is a physical LED or an alias group.
    pub fn is_known(&self, name: &str) -> bool {
        self.resolve(name).is_ok() || self.is_alias(name)
    }

    /// Physical LED names in table order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn entries(&self) -> &[(String, LedAddress)] {
        &self.entries
    }

    pub fn aliases(&self) -> &[(String, Vec<String>)] {
        &self.aliases
    }

    /// Number of physical LEDs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry of the table, for the startup banner.
    pub fn example(&self) -> Option<(&str, LedAddress)> {
        self.entries.first().map(|(n, a)| (n.as_str(), *a))
    }
}
