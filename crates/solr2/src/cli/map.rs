//! `map` subcommand: print the LED address map.

use solr2_lib::packet::hex_bytes;

use super::{
    AddressMap, AliasJson, MapEntryJson, MapOutput, Result, kv_indent, kv_width, print_json,
};

fn map_output(map: &AddressMap) -> MapOutput {
    MapOutput {
        count: map.len(),
        leds: map
            .entries()
            .iter()
            .map(|(name, addr)| MapEntryJson {
                name: name.clone(),
                address: format!("0x{:02X}", addr.address),
                header: hex_bytes(&addr.header),
            })
            .collect(),
        aliases: map
            .aliases()
            .iter()
            .map(|(name, members)| AliasJson {
                name: name.clone(),
                members: members.clone(),
            })
            .collect(),
    }
}

pub(super) fn cmd_map(json: bool) -> Result<()> {
    let map = AddressMap::builtin()?;

    if json {
        return print_json(&map_output(&map));
    }

    let keys: Vec<String> = map
        .entries()
        .iter()
        .map(|(n, _)| format!("{n}:"))
        .chain(map.aliases().iter().map(|(n, _)| format!("{n}:")))
        .collect();
    let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
    let w = kv_width(&[], &key_refs);

    println!("Address map ({} LEDs):", map.len());
    for (name, addr) in map.entries() {
        kv_indent(&format!("{name}:"), addr, w);
    }
    println!();

    println!("Alias groups:");
    for (name, members) in map.aliases() {
        kv_indent(&format!("{name}:"), members.join(" "), w);
    }
    Ok(())
}
