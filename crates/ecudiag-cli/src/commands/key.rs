//! Key command - offline seed-to-key derivation

use anyhow::{Context, Result};
use ecudiag_uds::security::compute_key;

use crate::config::parse_hex_u32;
use crate::output::OutputContext;

/// Compute the key an ECU expects for `seed` at send-key sub-function `level`
pub fn key(level: u8, seed: &str, constant: u32, ctx: &OutputContext) -> Result<bool> {
    let seed = parse_hex_u32(seed).context("Invalid seed")?;
    let key = compute_key(level, seed, constant)?;

    ctx.print_kv(&[
        ("level", format!("0x{:02X}", level)),
        ("seed", format!("{:08X}", seed)),
        ("constant", format!("{:08X}", constant)),
        ("key", hex::encode_upper(key.to_be_bytes())),
    ]);
    Ok(true)
}
