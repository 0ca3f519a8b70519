//! CLI subcommands: server, client, address map, devices, config.

mod config_cmd;
mod devices;
mod map;
mod send;
mod serve;

use std::path::{Path, PathBuf};

use clap::Subcommand;
use serde::Serialize;

pub(super) use crate::RUNNING;
pub(super) use solr2_lib::address_map::AddressMap;
pub(super) use solr2_lib::config::ServerConfig;
pub(super) use solr2_lib::device::DiscoveredBoard;
pub(super) use solr2_lib::error::{Result, Solr2Error};
pub(super) use solr2_lib::session::Response;

pub use send::SendArgs;
pub use serve::ServeArgs;

const PADDING: usize = 2;

/// Options shared by every subcommand.
pub struct GlobalOpts {
    pub json: bool,
    pub config: Option<PathBuf>,
}

/// Compute alignment width for a command's key-value output.
/// Ensures at least PADDING spaces after the longest key in either level,
/// with top-level and indent values aligned to the same column.
pub(super) fn kv_width(top: &[&str], indent: &[&str]) -> usize {
    let top_max = top.iter().map(|k| k.len()).max().unwrap_or(0);
    let indent_max = indent.iter().map(|k| k.len()).max().unwrap_or(0);
    let top_need = if top.is_empty() { 0 } else { top_max + PADDING };
    // Indent keys lose 2 chars of inner width to the "  " prefix
    let indent_need = if indent.is_empty() {
        0
    } else {
        indent_max + PADDING + 2
    };
    top_need.max(indent_need)
}

pub(super) fn format_kv(key: &str, value: impl std::fmt::Display, w: usize) -> String {
    format!("{key:<width$}{value}", width = w)
}

pub(super) fn kv(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("{}", format_kv(key, value, w));
}

pub(super) fn kv_indent(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("  {key:<width$}{value}", width = w.saturating_sub(2));
}

pub(super) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| Solr2Error::Io(std::io::Error::other(e)))?;
    println!("{text}");
    Ok(())
}

// ── Config loading ──

/// `--config` if given, else the platform default path.
pub(super) fn config_path(custom: Option<&Path>) -> Option<PathBuf> {
    custom.map(Path::to_path_buf).or_else(ServerConfig::path)
}

/// Load the config, logging parse problems. Missing files yield defaults.
pub(super) fn load_config(custom: Option<&Path>) -> ServerConfig {
    let Some(path) = config_path(custom) else {
        return ServerConfig::default();
    };
    let (config, warnings) = ServerConfig::load_from(&path);
    for w in &warnings {
        log::warn!("{w}");
    }
    config
}

/// Whether debug logging was requested before the logger exists.
pub fn wants_debug(cmd: &Command, custom: Option<&Path>) -> bool {
    match cmd {
        Command::Serve(args) => {
            args.debug
                || config_path(custom).is_some_and(|p| ServerConfig::load_from(&p).0.debug)
        }
        _ => false,
    }
}

// ── JSON output structs ──

#[derive(Serialize)]
pub(super) struct MapOutput {
    pub count: usize,
    pub leds: Vec<MapEntryJson>,
    pub aliases: Vec<AliasJson>,
}

#[derive(Serialize)]
pub(super) struct MapEntryJson {
    pub name: String,
    pub address: String,
    pub header: String,
}

#[derive(Serialize)]
pub(super) struct AliasJson {
    pub name: String,
    pub members: Vec<String>,
}

#[derive(Serialize)]
pub(super) struct ConfigOutput {
    pub config_file: Option<String>,
    pub config_file_exists: bool,
    pub settings: ServerConfig,
    pub problems: Vec<String>,
}

#[derive(Serialize)]
pub(super) struct DevicesOutput {
    pub count: usize,
    pub devices: Vec<DiscoveredBoard>,
}

#[derive(Serialize)]
pub(super) struct SendOutput {
    pub target: String,
    pub batches: Vec<SendBatchJson>,
}

#[derive(Serialize)]
pub(super) struct SendBatchJson {
    pub leds: Vec<String>,
    pub response: Response,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the LED server (TCP listener, USB boards, streaming loop)
    Serve(ServeArgs),

    /// Send LED commands to a running server
    Send(SendArgs),

    /// Print the LED address map and alias groups
    Map,

    /// List attached SOL-R2 boards
    Devices,

    /// Show effective configuration and file path
    Config,
}

/// Warn if `--json` was passed to a command that doesn't support it.
fn warn_json_unsupported(cmd_name: &str) {
    log::warn!("--json is not supported for `{cmd_name}` (ignored)");
}

pub fn run(cmd: Command, opts: &GlobalOpts) -> Result<()> {
    match cmd {
        Command::Serve(args) => {
            if opts.json {
                warn_json_unsupported("serve");
            }
            serve::cmd_serve(args, opts.config.as_deref())
        }
        Command::Send(args) => send::cmd_send(args, opts),
        Command::Map => map::cmd_map(opts.json),
        Command::Devices => devices::cmd_devices(opts.json),
        Command::Config => config_cmd::cmd_config(opts.json, opts.config.as_deref()),
    }
}

#[cfg(test)]
mod format_tests {
    use super::*;

    #[test]
    fn kv_width_top_only() {
        let w = kv_width(&["Short:", "Longer key:"], &[]);
        assert_eq!(w, 13);
    }

    #[test]
    fn kv_width_indent_drives_width() {
        let w = kv_width(&["A:"], &["stream_idle_timeout_ms:"]);
        // 23 + PADDING + 2
        assert_eq!(w, 27);
    }

    #[test]
    fn values_align_across_levels() {
        let w = kv_width(&["Config file:"], &["port:"]);
        let top = format_kv("Config file:", "V", w);
        let indent = format!("  {:<width$}{}", "port:", "V", width = w - 2);
        assert_eq!(top.find('V'), indent.find('V'));
    }

    #[test]
    fn format_kv_long_key_is_not_padded() {
        assert_eq!(format_kv("ExactWidth:", "val", 10), "ExactWidth:val");
    }

    #[test]
    fn kv_width_empty_both() {
        assert_eq!(kv_width(&[], &[]), 0);
    }
}


#[cfg(test)]
mod json_output_tests {
    use super::*;

    #[test]
    fn devices_output_empty() {
        let output = DevicesOutput {
            count: 0,
            devices: vec![],
        };
        let parsed = serde_json::to_value(&output).unwrap();
        assert_eq!(parsed["count"], 0);
        assert!(parsed["devices"].as_array().unwrap().is_empty());
    }

    #[test]
    fn devices_output_with_board() {
        let output = DevicesOutput {
            count: 1,
            devices: vec![DiscoveredBoard {
                side: "LEFT",
                path: "usb:001/004".into(),
                vendor_id: 0x044F,
                product_id: 0x042A,
                product: None,
                serial: Some("S1".into()),
            }],
        };
        let parsed = serde_json::to_value(&output).unwrap();
        assert_eq!(parsed["devices"][0]["side"], "LEFT");
        assert_eq!(parsed["devices"][0]["serial"], "S1");
        assert!(parsed["devices"][0]["product"].is_null());
    }

    #[test]
    fn config_output_complete() {
        let output = ConfigOutput {
            config_file: Some("/home/user/.config/solr2/config.toml".into()),
            config_file_exists: false,
            settings: ServerConfig::default(),
            problems: vec![],
        };
        let parsed = serde_json::to_value(&output).unwrap();
        assert!(parsed["config_file"].is_string());
        assert_eq!(parsed["config_file_exists"], false);
        assert_eq!(parsed["settings"]["port"], 8766);
        assert_eq!(parsed["settings"]["max_entries"], 15);
        assert!(parsed["problems"].as_array().unwrap().is_empty());
    }

    #[test]
    fn send_output_omits_empty_skipped() {
        let output = SendOutput {
            target: "127.0.0.1:8766".into(),
            batches: vec![SendBatchJson {
                leds: vec!["LED1".into()],
                response: Response::success(vec![]),
            }],
        };
        let parsed = serde_json::to_value(&output).unwrap();
        assert_eq!(parsed["batches"][0]["response"]["ok"], true);
        assert!(parsed["batches"][0]["response"].get("skipped").is_none());
    }
}
