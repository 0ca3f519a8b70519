//! `serve` subcommand: run the LED server until Ctrl+C.

use std::path::Path;
use std::sync::Arc;

use clap::Args;
use log::info;
use solr2_lib::config::parse_endpoint;
use solr2_lib::device::Boards;
use solr2_lib::engine::Engine;
use solr2_lib::server::Server;

use super::{AddressMap, RUNNING, Result, ServerConfig, Solr2Error, load_config};

/// Overrides for the config file. Unset flags keep the file's value.
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Listen address
    #[arg(long)]
    pub host: Option<String>,
    /// Listen port
    #[arg(long)]
    pub port: Option<u16>,
    /// USB interface number
    #[arg(long)]
    pub iface: Option<u8>,
    /// Interrupt OUT endpoint (e.g. 0x02)
    #[arg(long, value_parser = parse_endpoint)]
    pub ep: Option<u8>,
    /// Bound on a single USB write
    #[arg(long)]
    pub usb_timeout_ms: Option<u64>,
    /// Delay after each packet
    #[arg(long)]
    pub tx_delay_ms: Option<u64>,
    /// Write each packet N times
    #[arg(long)]
    pub repeat: Option<u32>,
    /// Max (ADDR, R, G, B) entries per packet (1-15)
    #[arg(long)]
    pub max_entries: Option<usize>,
    /// Log packets instead of writing to USB
    #[arg(long)]
    pub dry_run: bool,
    /// Debug logging
    #[arg(long)]
    pub debug: bool,
    /// Streaming tick in ms (0 disables streaming)
    #[arg(long)]
    pub stream_interval_ms: Option<u64>,
    /// Stop streaming after this long without commands, unless an effect runs (0 = never)
    #[arg(long)]
    pub stream_idle_timeout_ms: Option<u64>,
}

impl ServeArgs {
    pub(super) fn apply(&self, config: &mut ServerConfig) {
        if let Some(ref host) = self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(iface) = self.iface {
            config.usb_interface = iface;
        }
        if let Some(ep) = self.ep {
            config.usb_endpoint = ep;
        }
        if let Some(ms) = self.usb_timeout_ms {
            config.usb_timeout_ms = ms;
        }
        if let Some(ms) = self.tx_delay_ms {
            config.tx_delay_ms = ms;
        }
        if let Some(n) = self.repeat {
            config.repeat = n;
        }
        if let Some(n) = self.max_entries {
            config.max_entries = n;
        }
        if let Some(ms) = self.stream_interval_ms {
            config.stream_interval_ms = ms;
        }
        if let Some(ms) = self.stream_idle_timeout_ms {
            config.stream_idle_timeout_ms = ms;
        }
        config.dry_run |= self.dry_run;
        config.debug |= self.debug;
    }
}

fn validated(config: &ServerConfig) -> Result<()> {
    config.validate().map_err(|errors| {
        let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        Solr2Error::Config(msgs.join("; "))
    })
}

pub(super) fn cmd_serve(args: ServeArgs, custom_path: Option<&Path>) -> Result<()> {
    let mut config = load_config(custom_path);
    args.apply(&mut config);
    validated(&config)?;

    let map = Arc::new(AddressMap::builtin()?);
    info!(
        "Address map: {} LEDs, {} alias groups",
        map.len(),
        map.aliases().len()
    );
    if let Some((name, addr)) = map.example() {
        info!("  e.g. {name}: {addr}");
    }
    info!(
        "USB: iface={} ep=0x{:02X} timeout={}ms tx_delay={}ms repeat={} max_entries={} dry_run={}",
        config.usb_interface,
        config.usb_endpoint,
        config.usb_timeout_ms,
        config.tx_delay_ms,
        config.repeat,
        config.max_entries,
        config.dry_run
    );
    info!(
        "Streaming: interval={}ms idle_timeout={}ms",
        config.stream_interval_ms, config.stream_idle_timeout_ms
    );

    let boards = Boards::open(
        config.usb_settings(),
        config.dry_run,
        config.repeat,
        config.tx_delay(),
    )?;
    let engine = Arc::new(Engine::new(map, boards, config.engine_settings()));

    let mut server = match Server::bind(Arc::clone(&engine), config.listen_addr()) {
        Ok(s) => s,
        Err(e) => {
            engine.close();
            return Err(e);
        }
    };
    server.start_streaming();
    let result = server.serve(&RUNNING);
    server.shutdown();
    result
}
