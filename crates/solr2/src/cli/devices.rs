//! `devices` subcommand: list attached SOL-R2 boards.

use solr2_lib::device;

use super::{DevicesOutput, Result, print_json};

pub(super) fn cmd_devices(json: bool) -> Result<()> {
    let devices = device::enumerate_boards();

    if json {
        return print_json(&DevicesOutput {
            count: devices.len(),
            devices,
        });
    }

    if devices.is_empty() {
        println!("No SOL-R2 boards found.");
        return Ok(());
    }

    println!(
        "Found {} SOL-R2 board{}:",
        devices.len(),
        if devices.len() == 1 { "" } else { "s" }
    );
    println!();

    for (i, dev) in devices.iter().enumerate() {
        println!(
            "  [{}] {:<6}{} ({:04X}:{:04X})",
            i + 1,
            dev.side,
            dev.path,
            dev.vendor_id,
            dev.product_id
        );
        if let Some(ref product) = dev.product {
            println!("      Product: {product}");
        }
        if let Some(ref serial) = dev.serial {
            println!("      Serial: {serial}");
        }
    }

    Ok(())
}
