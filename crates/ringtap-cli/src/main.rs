//! ringtap CLI
//!
//! Offline inspector for `PACKET_MMAP` receive rings. Decodes a byte-for-byte
//! snapshot of a mapped ring and prints every packet the kernel had handed to
//! userspace.

mod config;

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use config::Config;
use ringtap_core::{
    CaptureInfo, CaptureOptions, CaptureStatsSnapshot, OwnedRegion, PacketHeader, Ring,
    RingLayout, TpacketVersion,
};

/// ringtap - PACKET_MMAP ring inspector
#[derive(Parser)]
#[command(name = "ringtap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug output (implies --verbose)
    #[arg(short, long)]
    debug: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a ring snapshot and print its packets
    Inspect {
        /// Snapshot file (raw copy of the mapped ring)
        #[arg(required = true)]
        snapshot: PathBuf,

        /// Header generation the ring was configured with
        #[arg(long, value_enum)]
        tpacket_version: Option<VersionArg>,

        /// Bytes per frame (V1/V2) or block (V3)
        #[arg(long)]
        slot_size: Option<usize>,

        /// Number of slots (defaults to snapshot size / slot size)
        #[arg(long)]
        slot_count: Option<usize>,

        /// Reinsert stripped VLAN tags into payloads
        #[arg(long)]
        add_vlan_header: bool,

        /// Print one JSON object per packet
        #[arg(long)]
        json: bool,

        /// Dump the first N payload bytes as hex
        #[arg(long, value_name = "N")]
        hex: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum VersionArg {
    V1,
    V2,
    V3,
}

impl From<VersionArg> for TpacketVersion {
    fn from(v: VersionArg) -> Self {
        match v {
            VersionArg::V1 => TpacketVersion::V1,
            VersionArg::V2 => TpacketVersion::V2,
            VersionArg::V3 => TpacketVersion::V3,
        }
    }
}

/// Effective settings after merging the config file and flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InspectSettings {
    options: CaptureOptions,
    slot_size: usize,
    slot_count: Option<usize>,
    json: bool,
    hex: Option<usize>,
}

/// One printed packet.
#[derive(Serialize)]
struct PacketRecord {
    slot: usize,
    index: u32,
    #[serde(flatten)]
    info: CaptureInfo,
    status: String,
    truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    hex: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Inspect {
            snapshot,
            tpacket_version,
            slot_size,
            slot_count,
            add_vlan_header,
            json,
            hex,
        } => {
            let version = tpacket_version
                .map(TpacketVersion::from)
                .unwrap_or(config.capture.version);
            let settings = InspectSettings {
                options: CaptureOptions::new(version)
                    .with_vlan_header(add_vlan_header || config.capture.add_vlan_header),
                slot_size: slot_size
                    .or(config.ring.slot_size)
                    .unwrap_or(RingLayout::default().slot_size),
                slot_count: slot_count.or(config.ring.slot_count),
                json,
                hex,
            };

            let bytes = std::fs::read(&snapshot)
                .with_context(|| format!("failed to read snapshot {}", snapshot.display()))?;

            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            let stats = inspect(&bytes, &settings, &mut out)?;
            out.flush()?;

            tracing::info!(
                packets = stats.packets,
                bytes = stats.bytes,
                truncated = stats.truncated,
                vlan_tagged = stats.vlan_tagged,
                slots_released = stats.slots_released,
                malformed_slots = stats.malformed_slots,
                "Snapshot decoded"
            );
        }
    }

    Ok(())
}

/// Walk every user-owned slot of `bytes` and write one record per packet.
fn inspect<W: Write>(
    bytes: &[u8],
    settings: &InspectSettings,
    out: &mut W,
) -> Result<CaptureStatsSnapshot> {
    let version = settings.options.version;
    let slot_count = settings
        .slot_count
        .unwrap_or(bytes.len() / settings.slot_size.max(1));
    let layout = RingLayout::new(settings.slot_size, slot_count);

    let mut owned = OwnedRegion::from_bytes(bytes);
    let mut ring = Ring::new(owned.region(), version, layout)
        .with_context(|| format!("snapshot does not hold a {version} ring of {layout:?}"))?;

    tracing::debug!(
        version = %version,
        slot_size = layout.slot_size,
        slot_count = layout.slot_count,
        "Inspecting snapshot"
    );

    for idx in 0..layout.slot_count {
        ring.seek(idx);
        let Some(mut header) = ring.next_ready() else {
            continue;
        };
        // Malformed slots may have been skipped on the way.
        let slot = (ring.position() + layout.slot_count - 1) % layout.slot_count;

        let mut index = 0u32;
        loop {
            ring.stats().observe(&header);
            write_packet(out, settings, slot, index, &header)?;
            index += 1;
            if !header.advance() {
                break;
            }
        }
        ring.release(header);
    }

    let stats = ring.stats().snapshot();
    if !settings.json {
        writeln!(
            out,
            "{} packets, {} bytes, {} truncated, {} vlan, {} malformed slots",
            stats.packets, stats.bytes, stats.truncated, stats.vlan_tagged, stats.malformed_slots
        )?;
    }
    Ok(stats)
}

fn write_packet<W: Write, H: PacketHeader>(
    out: &mut W,
    settings: &InspectSettings,
    slot: usize,
    index: u32,
    header: &H,
) -> Result<()> {
    let info = header.capture_info(&settings.options);
    let hex = settings.hex.map(|n| {
        let payload = header.payload(&settings.options);
        hex::encode(&payload[..n.min(payload.len())])
    });

    if settings.json {
        let record = PacketRecord {
            slot,
            index,
            info,
            status: header.status().to_string(),
            truncated: header.is_truncated(),
            hex,
        };
        serde_json::to_writer(&mut *out, &record)?;
        writeln!(out)?;
        return Ok(());
    }

    let ts = info.timestamp.duration_since(UNIX_EPOCH).unwrap_or_default();
    let vlan = info
        .vlan_id
        .map_or_else(|| "-".to_string(), |id| id.to_string());
    write!(
        out,
        "{slot:>5}.{index:<3} {}.{:09} ifindex={} len={}/{} vlan={}",
        ts.as_secs(),
        ts.subsec_nanos(),
        info.interface_index,
        info.capture_len,
        info.wire_len,
        vlan
    )?;
    if let Some(hex) = hex {
        write!(out, " {hex}")?;
    }
    writeln!(out)?;
    Ok(())
}
