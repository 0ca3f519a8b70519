//! Client side of the line protocol: line building, LED expressions, sending.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::debug;

use crate::address_map::AddressMap;
use crate::color::Rgb;
use crate::command::{EffectMode, Side};
use crate::error::{Result, Solr2Error};
use crate::session::Response;

/// Build one command line, e.g. `left:LED3 255 0 0 BLINK 500`.
///
/// `effect = None` is a static command and adds no suffix.
pub fn build_line(
    side: Side,
    led: &str,
    color: Rgb,
    effect: Option<(EffectMode, i64)>,
) -> String {
    let mut line = format!(
        "{}{} {} {} {}",
        side.prefix(),
        led.trim().to_uppercase(),
        color.r,
        color.g,
        color.b
    );
    if let Some((mode, period_ms)) = effect {
        line.push_str(&format!(" {mode} {period_ms}"));
    }
    line
}

/// Number of a plain `LEDn` name. Only ASCII digits are accepted after `LED`.
fn led_number(name: &str) -> Option<u32> {
    let digits = name.strip_prefix("LED")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Highest `n` among known `LEDn` names, physical or alias.
fn max_led_number(map: &AddressMap) -> u32 {
    map.names()
        .chain(map.aliases().iter().map(|(name, _)| name.as_str()))
        .filter_map(led_number)
        .max()
        .unwrap_or(0)
}

/// Expand a LED expression into known LED names.
///
/// Tokens are separated by commas, whitespace or `;`. `LEDa/LEDb` expands to
/// every known `LEDn` between the two numbers (either order), clipped to the
/// highest number the map knows. Unknown names
/// are dropped and duplicates removed, keeping first-seen order. If nothing
/// survives, the result is `[default]` when it is known, else `["LED1"]`.
pub fn expand_leds_expr(map: &AddressMap, expr: &str, default: &str) -> Vec<String> {
    let max = max_led_number(map);
    let mut leds: Vec<String> = Vec::new();
    let mut add = |name: String| {
        if map.is_known(&name) && !leds.contains(&name) {
            leds.push(name);
        }
    };

    for tok in expr
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        let tok = tok.to_uppercase();
        match tok.split_once('/') {
            Some((a, b)) => {
                let (Some(a), Some(b)) = (led_number(a.trim()), led_number(b.trim())) else {
                    continue;
                };
                for n in a.min(b)..=a.max(b).min(max) {
                    add(format!("LED{n}"));
                }
            }
            None => add(tok),
        }
    }

    if leds.is_empty() {
        let default = default.trim().to_uppercase();
        if map.is_known(&default) {
            return vec![default];
        }
        return vec!["LED1".to_string()];
    }
    leds
}

/// Send `lines` over one connection and return the server's response.
///
/// The batch is terminated with a blank line. `timeout` bounds the connect
/// and each socket read or write.
pub fn send_lines(
    addr: impl ToSocketAddrs,
    lines: &[String],
    timeout: Duration,
) -> Result<Response> {
    let mut last_err = None;
    let mut stream = None;
    for sa in addr.to_socket_addrs()? {
        match TcpStream::connect_timeout(&sa, timeout) {
            Ok(s) => {
                stream = Some(s);
                break;
            }
            Err(e) => last_err = Some(e),
        }
    }
    let stream = match (stream, last_err) {
        (Some(s), _) => s,
        (None, Some(e)) => return Err(e.into()),
        (None, None) => {
            return Err(Solr2Error::Protocol("address resolved to nothing".into()));
        }
    };
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;

    let mut payload = String::new();
    for line in lines {
        debug!("[tx] {line}");
        payload.push_str(line);
        payload.push('\n');
    }
    payload.push('\n');
    (&stream).write_all(payload.as_bytes())?;
    (&stream).flush()?;

    let mut reply = String::new();
    BufReader::new(&stream).read_line(&mut reply)?;
    let reply = reply.trim();
    if reply.is_empty() {
        return Err(Solr2Error::Protocol("server closed the connection without a reply".into()));
    }
    serde_json::from_str(reply)
        .map_err(|e| Solr2Error::Protocol(format!("invalid reply '{reply}': {e}")))
}
