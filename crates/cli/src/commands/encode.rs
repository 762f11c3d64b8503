//! `encode` command implementation.

use anyhow::{Context, Result};
use contracts::ShowState;
use serde::Serialize;

use crate::cli::EncodeArgs;

/// Packet view for JSON output
#[derive(Serialize)]
struct EncodeOutput {
    identifier: String,
    bytes: Vec<u8>,
    /// What a device reads back, to byte precision
    decoded: ShowState,
}

/// Execute the `encode` command
pub fn run_encode(args: &EncodeArgs) -> Result<()> {
    let output = encode_state(&show_state(args));

    if args.json {
        let json =
            serde_json::to_string_pretty(&output).context("Failed to serialize packet")?;
        println!("{}", json);
    } else {
        print_packet(&output);
    }

    Ok(())
}

fn show_state(args: &EncodeArgs) -> ShowState {
    ShowState {
        start_time: args.start_time,
        bpm: args.bpm,
        gradient: args.gradient,
        energy: args.energy,
        attack: args.attack,
        release: args.release,
        program: args.program,
    }
}

fn encode_state(state: &ShowState) -> EncodeOutput {
    let packet = packet_codec::encode(state);
    EncodeOutput {
        identifier: packet_codec::to_identifier(&packet),
        bytes: packet.as_bytes().to_vec(),
        decoded: packet_codec::decode(&packet),
    }
}

fn print_packet(output: &EncodeOutput) {
    let decoded = &output.decoded;
    println!("Identifier: {}", output.identifier);
    println!("Bytes:      {:?}", output.bytes);
    println!("\nDecoded:");
    println!("  start_time: {}", decoded.start_time);
    println!("  bpm:        {}", decoded.bpm);
    println!("  gradient:   {}", decoded.gradient);
    println!("  energy:     {:.1}", decoded.energy);
    println!("  attack:     {:.1}", decoded.attack);
    println!("  release:    {:.1}", decoded.release);
    println!("  program:    {}", decoded.program);
}
