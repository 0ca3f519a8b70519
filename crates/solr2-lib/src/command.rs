//! Text command parsing for the TCP line protocol.
//!
//! A command line looks like:
//!
//! ```text
//! [left:|right:]LEDx R G B [BLINK|FADE|RAINBOW period_ms]
//! ```
//!
//! Commas count as whitespace, and a line wrapped in double quotes is
//! unwrapped first. [`strip_effect_suffix`] peels off the optional effect,
//! then [`parse_command`] handles the rest.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::color::Rgb;
use crate::protocol::EFFECT_KEYWORDS;

// ── Side ──

/// Which board(s) a command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Both,
    Left,
    Right,
}

impl Side {
    /// The concrete sides a target stands for. `Both` is never stored itself.
    pub fn concrete(self) -> &'static [Side] {
        match self {
            Side::Both => &[Side::Left, Side::Right],
            Side::Left => &[Side::Left],
            Side::Right => &[Side::Right],
        }
    }

    /// Upper-case label used in log lines.
    pub fn label(self) -> &'static str {
        match self {
            Side::Both => "BOTH",
            Side::Left => "LEFT",
            Side::Right => "RIGHT",
        }
    }

    /// Line prefix understood by [`parse_command`] (empty for `Both`).
    pub fn prefix(self) -> &'static str {
        match self {
            Side::Both => "",
            Side::Left => "left:",
            Side::Right => "right:",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "both" => Ok(Side::Both),
            "left" => Ok(Side::Left),
            "right" => Ok(Side::Right),
            other => Err(format!("unknown side '{other}' (use both, left or right)")),
        }
    }
}

// ── Effect mode ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EffectMode {
    Blink,
    Fade,
    Rainbow,
}

impl EffectMode {
    /// Wire keyword (`BLINK`, `FADE`, `RAINBOW`).
    pub fn as_str(self) -> &'static str {
        match self {
            EffectMode::Blink => EFFECT_KEYWORDS[0],
            EffectMode::Fade => EFFECT_KEYWORDS[1],
            EffectMode::Rainbow => EFFECT_KEYWORDS[2],
        }
    }
}

impl fmt::Display for EffectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EffectMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BLINK" => Ok(EffectMode::Blink),
            "FADE" => Ok(EffectMode::Fade),
            "RAINBOW" => Ok(EffectMode::Rainbow),
            other => Err(format!("unknown effect '{other}'")),
        }
    }
}

// ── Parsing ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Blank line.
    Empty,
    /// Wrong number of tokens.
    Format,
    /// A color component is not an integer.
    InvalidNumber(String),
    /// A color component is outside `0..=255`.
    OutOfRange(i64),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Empty => write!(f, "Empty line"),
            ParseError::Format => write!(f, "Format: [left:|right:]LEDx R G B"),
            ParseError::InvalidNumber(tok) => write!(f, "Invalid number: '{tok}'"),
            ParseError::OutOfRange(v) => write!(f, "R,G,B must be within 0..255 (got {v})"),
        }
    }
}

impl std::error::Error for ParseError {}

/// A parsed static command: target side, upper-cased LED name, color.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub side: Side,
    pub led: String,
    pub color: Rgb,
}

fn unquote(s: &str) -> &str {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn tokens(s: &str) -> Vec<&str> {
    s.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Split a trailing `EFFECT period_ms` pair off a command line.
///
/// Only recognized when the line has at least six tokens and the
/// second-to-last is an effect keyword. A period that does not parse becomes
/// `0`. Without a suffix the input comes back unchanged.
pub fn strip_effect_suffix(line: &str) -> (String, Option<EffectMode>, i64) {
    let toks = tokens(unquote(line.trim()));
    if toks.len() >= 6
        && let Ok(mode) = toks[toks.len() - 2].parse::<EffectMode>()
    {
        let period = toks[toks.len() - 1].parse::<i64>().unwrap_or(0);
        return (toks[..toks.len() - 2].join(" "), Some(mode), period);
    }
    (line.to_string(), None, 0)
}

fn parse_component(tok: &str) -> Result<u8, ParseError> {
    let v: i64 = tok
        .parse()
        .map_err(|_| ParseError::InvalidNumber(tok.to_string()))?;
    u8::try_from(v).map_err(|_| ParseError::OutOfRange(v))
}

/// Parse `[left:|right:]LEDx R G B` (effect suffix already removed).
pub fn parse_command(line: &str) -> Result<ParsedCommand, ParseError> {
    let raw = unquote(line.trim_end_matches(['\r', '\n'])).trim();
    if raw.is_empty() {
        return Err(ParseError::Empty);
    }

    let lower = raw.to_lowercase();
    let (side, rest) = if lower.starts_with("left:") {
        (Side::Left, &raw[5..])
    } else if lower.starts_with("right:") {
        (Side::Right, &raw[6..])
    } else {
        (Side::Both, raw)
    };

    let parts = tokens(rest);
    let [led, r, g, b] = parts.as_slice() else {
        return Err(ParseError::Format);
    };
    let color = Rgb::new(parse_component(r)?, parse_component(g)?, parse_component(b)?);
    Ok(ParsedCommand {
        side,
        led: led.to_uppercase(),
        color,
    })
}
