mod cli;

use frameseek::{
    config::{self, Config},
    media,
    report::{AnalysisReport, FrameReport, IndexReport, SeekReport, StreamReport},
    simulate::{self, Simulation},
};
use frameseek_core::{Completion, FrameIndex, ReliabilityRecord, SeekEngine, SeekOutcome};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use serde::Serialize;
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "frameseek=trace,frameseek_core=trace,frameseek_av=trace".to_string()
        } else {
            "frameseek=info,frameseek_core=info,frameseek_av=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Analyze { file, track, json } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            analyze_file(&file, track, &config, json)
        }
        Commands::Index { file, track, json } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            index_file(&file, track, &config, json)
        }
        Commands::Seek {
            file,
            frame,
            track,
            count,
            json,
        } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            seek_file(&file, frame, track, count, &config, json)
        }
        Commands::InspectIndex { file, rows, json } => inspect_index(&file, rows, json),
        Commands::InspectRecord { file, json } => inspect_record(&file, json),
        Commands::Simulate {
            frames,
            steps,
            gop,
            lag,
            no_timestamps,
            index,
            targets,
            cache_dir,
            json,
        } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let sim = Simulation {
                frames,
                steps,
                gop,
                lag,
                timestamps: !no_timestamps,
                build_index: index,
                targets,
                cache_dir,
            };
            simulate_seeks(&sim, &config, json)
        }
        Commands::Probe { file, track, json } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            probe_file(&file, track, &config, json)
        }
        Commands::CheckTools => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            check_tools(&config)
        }
        Commands::Version => {
            println!("frameseek {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json_str = serde_json::to_string_pretty(value)?;
    println!("{}", json_str);
    Ok(())
}

fn engine(config: &Config) -> Result<SeekEngine> {
    SeekEngine::new(config.engine.clone(), config.cache.clone()).context("Invalid engine settings")
}

fn require_file(file: &Path) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }
    Ok(())
}

fn analyze_file(file: &Path, track: Option<u32>, config: &Config, json: bool) -> Result<()> {
    require_file(file)?;
    let mut engine = engine(config)?;
    let mut handle = engine.open(media::open_source(file, track)?)?;

    let record = match engine.analyze(&mut handle)? {
        Completion::Done(record) => record,
        Completion::Cancelled => anyhow::bail!("Analysis was cancelled"),
    };
    let report = AnalysisReport {
        reliability: engine.reliability(&handle),
        record,
    };

    if json {
        return print_json(&report);
    }
    let record = &report.record;
    println!("File: {}", file.display());
    println!("Reliability: {:?}", report.reliability);
    println!("Native seeking: {}", yes_no(record.native_seek_reliable));
    println!(
        "Frames: {}{}",
        record.total_frames,
        if record.all_frames_counted { "" } else { " (probed)" }
    );
    if let Some(eof) = record.eof_timecode {
        println!("Last timestamp: {}", eof);
    }
    println!("Pre-roll: {} frames", record.seek_pre_roll_size);
    println!(
        "Timestamps: {:?}, step pattern {:?}",
        record.profile.timing, record.profile.step_pattern
    );
    Ok(())
}

fn index_file(file: &Path, track: Option<u32>, config: &Config, json: bool) -> Result<()> {
    require_file(file)?;
    let mut engine = engine(config)?;
    let mut handle = engine.open(media::open_source(file, track)?)?;

    let mut next_report = 0.1;
    let outcome = engine.build_index(&mut handle, |p| {
        if let Some(fraction) = p.fraction() {
            if fraction >= next_report {
                tracing::info!("Indexed {:.0}% ({} frames)", fraction * 100.0, p.done);
                next_report += 0.1;
            }
        }
    })?;
    if outcome == Completion::Cancelled {
        anyhow::bail!("Index build was cancelled");
    }

    let index = handle
        .index()
        .context("Index build produced no index")?;
    let report = IndexReport::new(index, 0);
    if json {
        return print_json(&report);
    }
    print_index(file, &report);
    Ok(())
}

fn seek_file(
    file: &Path,
    frame: u32,
    track: Option<u32>,
    count: u32,
    config: &Config,
    json: bool,
) -> Result<()> {
    require_file(file)?;
    let mut engine = engine(config)?;
    let mut handle = engine.open(media::open_source(file, track)?)?;

    let outcome = engine
        .seek(&mut handle, frame)
        .with_context(|| format!("Seek to frame {} failed", frame))?;
    let mut frames = Vec::new();
    if outcome == SeekOutcome::Positioned {
        for _ in 0..count {
            match handle.read_frame()? {
                Some(decoded) => frames.push(FrameReport::new(handle.current_frame(), &decoded)),
                None => break,
            }
        }
    }
    let report = SeekReport {
        target: frame,
        outcome,
        strategy: handle.last_strategy(),
        reliability: engine.reliability(&handle),
        frames,
    };

    if json {
        return print_json(&report);
    }
    println!("Seek to frame {}: {:?}", frame, report.outcome);
    if let Some(strategy) = report.strategy {
        println!("Strategy: {:?} (reliability {:?})", strategy, report.reliability);
    }
    for f in &report.frames {
        print!("  #{}", f.number);
        if let Some(ts) = f.timestamp {
            print!(" ts={}", ts);
        }
        if let Some(offset) = f.byte_offset {
            print!(" pos={}", offset);
        }
        print!(" size={} fingerprint={:04x}", f.packet_size, f.fingerprint);
        if f.keyframe {
            print!(" [key]");
        }
        println!();
    }
    Ok(())
}

fn inspect_index(file: &Path, rows: usize, json: bool) -> Result<()> {
    let data = std::fs::read(file).with_context(|| format!("Failed to read {:?}", file))?;
    let index = FrameIndex::decode(file, &data)?;
    let report = IndexReport::new(&index, rows);

    if json {
        return print_json(&report);
    }
    print_index(file, &report);
    if !report.rows.is_empty() {
        println!("\n  {:>8}  {:>12}  {:>6}  {:>5}  timecode", "frame", "offset", "length", "sum");
        for row in &report.rows {
            let timecode = row
                .timecode
                .map(|tc| tc.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {:>8}  {:>12}  {:>6}  {:04x}  {}",
                row.seek_nr, row.byte_offset, row.frame_length, row.checksum, timecode
            );
        }
    }
    Ok(())
}

fn print_index(file: &Path, report: &IndexReport) {
    println!("Index: {}", file.display());
    println!("Track: {} ({})", report.track, report.decoder);
    println!("Entries: {} (every ~{} frames)", report.entries, report.step_size);
    if report.complete {
        println!("Frames: {}", report.total_frames);
    } else {
        println!("Frames: unknown (incomplete scan)");
    }
    println!("Timecodes usable: {}", yes_no(report.timecodes_usable));
}

fn inspect_record(file: &Path, json: bool) -> Result<()> {
    let record = ReliabilityRecord::load(file)?
        .with_context(|| format!("No reliability record at {:?}", file))?;

    if json {
        return print_json(&record);
    }
    print!("{}", record.to_toml()?);
    Ok(())
}

fn simulate_seeks(sim: &Simulation, config: &Config, json: bool) -> Result<()> {
    let report = simulate::run(sim, &config.engine)?;

    if json {
        print_json(&report)?;
    } else {
        println!(
            "Simulated {} frames, reliability {:?}{}",
            report.frames,
            report.reliability,
            if report.indexed { ", indexed" } else { "" }
        );
        for seek in &report.seeks {
            let landed = seek
                .landed
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string());
            let strategy = seek
                .strategy
                .map(|s| format!("{:?}", s))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {} seek {:>8} -> {:>8}  {:?} via {}",
                if seek.exact { "✓" } else { "✗" },
                seek.target,
                landed,
                seek.outcome,
                strategy
            );
        }
        println!("Decoded {} frames", report.decode_calls);
    }

    match report.mismatches() {
        0 => Ok(()),
        n => anyhow::bail!("{} seeks landed on the wrong frame", n),
    }
}

fn probe_file(file: &Path, track: Option<u32>, config: &Config, json: bool) -> Result<()> {
    let info = media::probe(file, track, &config.tools)?;
    let report = StreamReport::from(&info);

    if json {
        return print_json(&report);
    }
    println!("File: {}", report.path);
    println!("Track: {} ({})", report.track, report.decoder);
    if !report.decoder_version.is_empty() {
        println!("Decoder: {}", report.decoder_version);
    }
    println!("Size: {} bytes", report.byte_len);
    if let Some(fps) = report.frame_rate {
        println!("Frame rate: {:.3} fps", fps);
    }
    if let Some(secs) = report.duration_secs {
        println!("Duration: {:.3}s", secs);
    }
    if let Some(frames) = report.estimated_frames {
        println!("Estimated frames: {}", frames);
    }
    Ok(())
}

fn check_tools(config: &Config) -> Result<()> {
    println!("Checking backends...\n");

    let backends = frameseek_av::detect_backends(config.tools.ffprobe_path.as_deref());

    match &backends.ffprobe {
        Some(path) => {
            print!("✓ ffprobe");
            if let Some(ref version) = backends.ffprobe_version {
                print!(" ({})", version);
            }
            println!(" - {}", path.display());
        }
        None => println!("✗ ffprobe"),
    }

    println!(
        "\nNative decoder: {}",
        if backends.native_decoder {
            "built in"
        } else {
            "not built (enable the native-ffmpeg feature)"
        }
    );
    if backends.ffprobe.is_none() {
        println!("ffprobe is missing. Install it or set [tools] ffprobe_path to enable probing.");
    }

    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
