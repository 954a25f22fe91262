use layercodec::dump::results_to_dump;
use layercodec::{Codec, CodecConfig, DecodeResult, EncodeInput, HeaderRegistry};
use pcap_parser::pcapng::Block as PcapNgBlock;
use pcap_parser::traits::{PcapNGPacketBlock, PcapReaderIterator};
use pcap_parser::{Linktype, PcapBlockOwned, PcapError};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const USAGE: &str =
    "usage: decode_pcap [--verbose|-v] [--dump[=FILE]] [--frame=N] [--verify] [--config=FILE] FILE.pcap";

#[derive(Default)]
struct Stats {
    packets: u64,
    decoded: u64,
    skipped_linktype: u64,
    failed: u64,
    errors: u64,
    verified: u64,
    mismatches: u64,
    headers: BTreeMap<String, u64>,
}

struct Options {
    verify: bool,
    frame_filter: Option<u64>,
}

fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn take_flag(args: &mut Vec<String>, names: &[&str]) -> bool {
    match args.iter().position(|a| names.contains(&a.as_str())) {
        Some(pos) => {
            args.remove(pos);
            true
        }
        None => false,
    }
}

fn take_value(args: &mut Vec<String>, prefix: &str) -> Option<String> {
    let pos = args.iter().position(|a| a.starts_with(prefix))?;
    let arg = args.remove(pos);
    arg.strip_prefix(prefix).map(str::to_string)
}

fn main() -> anyhow::Result<()> {
    let mut raw_args: Vec<String> = std::env::args().skip(1).collect();
    let verbose = take_flag(&mut raw_args, &["--verbose", "-v"]);
    let verify = take_flag(&mut raw_args, &["--verify"]);
    let dump_path: Option<PathBuf> = if take_flag(&mut raw_args, &["--dump"]) {
        Some(PathBuf::from("-"))
    } else {
        take_value(&mut raw_args, "--dump=").map(PathBuf::from)
    };
    let frame_filter: Option<u64> = take_value(&mut raw_args, "--frame=").and_then(|s| s.parse().ok());
    let config_path = take_value(&mut raw_args, "--config=");
    init_logging(verbose);

    let Some(pcap_path) = raw_args.into_iter().next().map(PathBuf::from) else {
        anyhow::bail!(USAGE);
    };
    let config = match config_path {
        Some(p) => CodecConfig::from_file(p)?,
        None => CodecConfig::default(),
    };
    let codec = Codec::with_config(HeaderRegistry::with_defaults(), config)?;
    let options = Options { verify, frame_filter };

    let mut dump_writer: Option<Box<dyn Write>> = match &dump_path {
        Some(p) if p.as_os_str() == "-" => Some(Box::new(std::io::stdout())),
        Some(p) => Some(Box::new(File::create(p)?)),
        None => None,
    };

    // pcap vs pcapng by magic.
    let mut magic = [0u8; 4];
    {
        let mut f = File::open(&pcap_path)?;
        f.read_exact(&mut magic)?;
    }
    let mut stats = Stats::default();
    let file = File::open(&pcap_path)?;
    if magic == [0x0a, 0x0d, 0x0d, 0x0a] {
        run_pcapng(file, &codec, &options, &mut dump_writer, &mut stats)?;
    } else {
        run_legacy_pcap(file, &codec, &options, &mut dump_writer, &mut stats)?;
    }
    if let Some(w) = dump_writer.as_mut() {
        w.flush()?;
    }

    info!(path = %pcap_path.display(), packets = stats.packets, "capture processed");
    eprintln!("pcap: {}", pcap_path.display());
    eprintln!("packets: {}", stats.packets);
    eprintln!("decoded: {}", stats.decoded);
    eprintln!("skipped (unsupported linktype): {}", stats.skipped_linktype);
    eprintln!("failed (no codec): {}", stats.failed);
    eprintln!("header errors: {}", stats.errors);
    if verify {
        eprintln!("round-trip verified: {}, mismatches: {}", stats.verified, stats.mismatches);
    }
    if !stats.headers.is_empty() {
        eprintln!("headers:");
        for (id, n) in &stats.headers {
            eprintln!("  {}: {}", id, n);
        }
    }
    Ok(())
}

fn run_legacy_pcap<R: Read>(
    file: R,
    codec: &Codec,
    options: &Options,
    dump: &mut Option<Box<dyn Write>>,
    stats: &mut Stats,
) -> anyhow::Result<()> {
    let mut reader = pcap_parser::pcap::LegacyPcapReader::new(1 << 20, file)?;
    let mut linktype: Option<Linktype> = None;
    loop {
        match reader.next() {
            Ok((offset, block)) => {
                match block {
                    PcapBlockOwned::LegacyHeader(h) => linktype = Some(h.network),
                    PcapBlockOwned::Legacy(b) => {
                        stats.packets += 1;
                        let lt = linktype.unwrap_or(Linktype(1));
                        process_frame(codec, lt, b.data, stats.packets, options, dump, stats)?;
                    }
                    PcapBlockOwned::NG(_) => {}
                }
                reader.consume(offset);
            }
            Err(PcapError::Eof) => break,
            Err(PcapError::Incomplete(_)) => {
                reader
                    .refill()
                    .map_err(|e| anyhow::anyhow!("pcap refill error: {:?}", e))?;
            }
            Err(e) => return Err(anyhow::anyhow!("pcap read error: {:?}", e)),
        }
    }
    Ok(())
}

fn run_pcapng<R: Read>(
    file: R,
    codec: &Codec,
    options: &Options,
    dump: &mut Option<Box<dyn Write>>,
    stats: &mut Stats,
) -> anyhow::Result<()> {
    let mut reader = pcap_parser::pcapng::PcapNGReader::new(1 << 20, file)?;
    let mut if_linktypes: Vec<Linktype> = Vec::new();
    loop {
        match reader.next() {
            Ok((offset, block)) => {
                if let PcapBlockOwned::NG(b) = block {
                    match &b {
                        PcapNgBlock::InterfaceDescription(idb) => if_linktypes.push(idb.linktype),
                        PcapNgBlock::EnhancedPacket(epb) => {
                            stats.packets += 1;
                            let lt = if_linktypes.get(epb.if_id as usize).copied().unwrap_or(Linktype(1));
                            process_frame(codec, lt, epb.packet_data(), stats.packets, options, dump, stats)?;
                        }
                        PcapNgBlock::SimplePacket(spb) => {
                            stats.packets += 1;
                            let lt = if_linktypes.first().copied().unwrap_or(Linktype(1));
                            process_frame(codec, lt, spb.packet_data(), stats.packets, options, dump, stats)?;
                        }
                        _ => {}
                    }
                }
                reader.consume(offset);
            }
            Err(PcapError::Eof) => break,
            Err(PcapError::Incomplete(_)) => {
                reader
                    .refill()
                    .map_err(|e| anyhow::anyhow!("pcapng refill error: {:?}", e))?;
            }
            Err(e) => return Err(anyhow::anyhow!("pcapng read error: {:?}", e)),
        }
    }
    Ok(())
}

/// Decode one Ethernet frame; optionally dump it and check that it re-encodes to the same bytes.
fn process_frame(
    codec: &Codec,
    linktype: Linktype,
    frame: &[u8],
    packet_index: u64,
    options: &Options,
    dump: &mut Option<Box<dyn Write>>,
    stats: &mut Stats,
) -> anyhow::Result<()> {
    if linktype.0 != 1 {
        stats.skipped_linktype += 1;
        return Ok(());
    }
    let results = match codec.decode(frame) {
        Ok(r) => r,
        Err(e) => {
            warn!(packet = packet_index, error = %e, "frame not decoded");
            stats.failed += 1;
            return Ok(());
        }
    };
    stats.decoded += 1;
    for r in &results {
        *stats.headers.entry(r.id.clone()).or_insert(0) += 1;
        stats.errors += r.errors.len() as u64;
    }
    if options.verify {
        verify_round_trip(codec, frame, &results, packet_index, stats)?;
    }
    if let Some(w) = dump.as_mut() {
        if options.frame_filter.map_or(true, |f| f == packet_index) {
            writeln!(w, "=== packet {}  len {} ===", packet_index, frame.len())?;
            write!(w, "{}", results_to_dump(&results))?;
        }
    }
    Ok(())
}

fn verify_round_trip(
    codec: &Codec,
    frame: &[u8],
    results: &[DecodeResult],
    packet_index: u64,
    stats: &mut Stats,
) -> anyhow::Result<()> {
    // Frames that decoded with errors are not expected to round-trip.
    if results.iter().any(|r| !r.errors.is_empty()) {
        return Ok(());
    }
    let inputs: Vec<EncodeInput> = results.iter().map(EncodeInput::from).collect();
    let encoded = codec.encode(&inputs)?;
    stats.verified += 1;
    if encoded.packet != frame {
        stats.mismatches += 1;
        let at = encoded
            .packet
            .iter()
            .zip(frame)
            .position(|(a, b)| a != b)
            .unwrap_or_else(|| encoded.packet.len().min(frame.len()));
        warn!(packet = packet_index, first_difference = at, "round-trip mismatch");
    } else {
        debug!(packet = packet_index, "round-trip ok");
    }
    Ok(())
}
