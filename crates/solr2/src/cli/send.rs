//! `send` subcommand: client for a running server.

use std::time::Duration;

use clap::{Args, ValueEnum};
use solr2_lib::client::{build_line, expand_leds_expr, send_lines};
use solr2_lib::color::{Rgb, format_color, parse_color};
use solr2_lib::command::{EffectMode, Side};
use solr2_lib::protocol::DEFAULT_CLIENT_HOST;

use super::{
    AddressMap, GlobalOpts, RUNNING, Response, Result, SendBatchJson, SendOutput, Solr2Error,
    load_config, print_json,
};

/// Connect and per-read bound for each exchange.
const SEND_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum EffectArg {
    #[default]
    Static,
    Blink,
    Fade,
    Rainbow,
}

impl EffectArg {
    fn mode(self) -> Option<EffectMode> {
        match self {
            EffectArg::Static => None,
            EffectArg::Blink => Some(EffectMode::Blink),
            EffectArg::Fade => Some(EffectMode::Fade),
            EffectArg::Rainbow => Some(EffectMode::Rainbow),
        }
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Server address
    #[arg(long, default_value = DEFAULT_CLIENT_HOST)]
    pub host: String,
    /// Server port (default: from config)
    #[arg(long)]
    pub port: Option<u16>,
    /// Target board(s): both, left, right
    #[arg(long, default_value = "both")]
    pub side: Side,
    /// LEDs, e.g. "LED1,LED3", "LED1/LED8", "LED9A LED9B"
    #[arg(long)]
    pub leds: String,
    /// Color: name, #RRGGBB or R,G,B
    #[arg(long)]
    pub color: String,
    /// Effect to run on the LEDs
    #[arg(long, value_enum, default_value_t = EffectArg::Static)]
    pub effect: EffectArg,
    /// Effect period
    #[arg(long, default_value_t = 500)]
    pub period_ms: i64,
    /// One connection per LED instead of a single batch
    #[arg(long)]
    pub sequential: bool,
    /// Pause between LEDs in sequential mode
    #[arg(long, default_value_t = 0)]
    pub delay_ms: u64,
}

/// Build the protocol lines for `leds`.
fn lines_for(args: &SendArgs, leds: &[String], color: Rgb) -> Vec<String> {
    let effect = args.effect.mode().map(|m| (m, args.period_ms));
    leds.iter()
        .map(|led| build_line(args.side, led, color, effect))
        .collect()
}

pub(super) fn cmd_send(args: SendArgs, opts: &GlobalOpts) -> Result<()> {
    let port = match args.port {
        Some(p) => p,
        None => load_config(opts.config.as_deref()).port,
    };
    let target = format!("{}:{port}", args.host);
    let color = parse_color(&args.color)?;
    let map = AddressMap::builtin()?;
    let leds = expand_leds_expr(&map, &args.leds, "LED1");
    log::debug!(
        "send {} {} {} to {target} ({})",
        leds.join(","),
        format_color(color),
        args.side,
        if args.sequential { "sequential" } else { "batch" }
    );

    let mut batches = Vec::new();
    if args.sequential {
        for (i, led) in leds.iter().enumerate() {
            if !RUNNING.load(std::sync::atomic::Ordering::SeqCst) {
                break;
            }
            let lines = lines_for(&args, std::slice::from_ref(led), color);
            let response = send_lines(target.as_str(), &lines, SEND_TIMEOUT)?;
            batches.push(SendBatchJson {
                leds: vec![led.clone()],
                response,
            });
            if i + 1 < leds.len() && args.delay_ms > 0 {
                std::thread::sleep(Duration::from_millis(args.delay_ms));
            }
        }
    } else {
        let lines = lines_for(&args, &leds, color);
        let response = send_lines(target.as_str(), &lines, SEND_TIMEOUT)?;
        batches.push(SendBatchJson { leds, response });
    }

    let failure = batches
        .iter()
        .find_map(|b| b.response.error.clone().filter(|_| !b.response.ok));

    if opts.json {
        print_json(&SendOutput { target, batches })?;
    } else {
        for batch in &batches {
            print_batch(&batch.leds, &batch.response);
        }
    }

    match failure {
        Some(error) => Err(Solr2Error::Protocol(format!("server error: {error}"))),
        None => Ok(()),
    }
}

fn print_batch(leds: &[String], response: &Response) {
    let status = if response.ok { "ok" } else { "failed" };
    println!("{}: {status}", leds.join(", "));
    for skipped in &response.skipped {
        println!("  skipped: {skipped}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(effect: EffectArg) -> SendArgs {
        SendArgs {
            host: DEFAULT_CLIENT_HOST.into(),
            port: Some(1),
            side: Side::Left,
            leds: "LED1/LED2".into(),
            color: "red".into(),
            effect,
            period_ms: 250,
            sequential: false,
            delay_ms: 0,
        }
    }

    #[test]
    fn static_effect_has_no_suffix() {
        let lines = lines_for(
            &args(EffectArg::Static),
            &["LED1".into(), "LED2".into()],
            Rgb::new(255, 0, 0),
        );
        assert_eq!(lines, vec!["left:LED1 255 0 0", "left:LED2 255 0 0"]);
    }

    #[test]
    fn effect_carries_period() {
        let lines = lines_for(&args(EffectArg::Fade), &["LED9".into()], Rgb::new(1, 2, 3));
        assert_eq!(lines, vec!["left:LED9 1 2 3 FADE 250"]);
    }

    #[test]
    fn bad_color_fails_before_connecting() {
        let mut a = args(EffectArg::Static);
        a.color = "not-a-color".into();
        let opts = GlobalOpts {
            json: false,
            config: None,
        };
        assert!(matches!(cmd_send(a, &opts), Err(Solr2Error::Color(_))));
    }
}
