//! TiltScan command-line tool
//!
//! # Usage
//!
//! ```bash
//! # Decoded lines inside a window
//! tiltscan -l lidar.log -s "2005-10-08 09:12:30" -e "2005-10-08 09:13:00" lines --fields timestamp,tilt,avg
//!
//! # Smoothed, backward-filtered points with GPS poses
//! tiltscan -l lidar.log -g gps.log -f recursive -b points -o points.csv
//!
//! # Mesh for a viewer
//! tiltscan --config tiltscan.toml mesh -o scan.obj --vehicle
//! ```

use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use chrono::{Local, TimeZone};
use clap::{Args, Parser, Subcommand};

use tiltscan::config::{OutputField, PipelineConfig, TimeSpec};
use tiltscan::core::math::wrap_degrees;
use tiltscan::engine::{interleave, vehicle_marker, ScanPipeline, DEFAULT_MARKER_WIDTH};
use tiltscan::io::export::{ObjWriter, PointWriter};
use tiltscan::io::log::{log_time_range, GpsRecord, LidarRecord, TimeRange};
use tiltscan::sensors::projection::ProjectedLine;
use tiltscan::sensors::tilt::{FilterResponse, HammingWindow, RecursiveCoefficients, TiltFilterKind};
use tiltscan::sensors::{PoseTrack, PoseTrackConfig};
use tiltscan::{Error, Result, ScanLine};

#[derive(Parser, Debug)]
#[command(version, about = "Tilting LIDAR + GPS log processing")]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Command,
}

/// Values that override the configuration file.
#[derive(Args, Debug)]
struct Overrides {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Lidar log
    #[arg(short, long, global = true)]
    lidar: Option<PathBuf>,
    /// GPS log
    #[arg(short, long, global = true)]
    gps: Option<PathBuf>,
    /// Start time, "YYYY-MM-DD hh:mm:ss" or epoch seconds
    #[arg(short, long, global = true)]
    start: Option<String>,
    /// End time, "YYYY-MM-DD hh:mm:ss" or epoch seconds
    #[arg(short, long, global = true)]
    end: Option<String>,
    /// Drop lines tilted below this many degrees
    #[arg(short = 'i', long, global = true)]
    tilt_ignore: Option<f64>,
    /// Averaging window left edge, degrees
    #[arg(short = 'a', long, global = true, allow_hyphen_values = true)]
    left_angle: Option<i32>,
    /// Averaging window right edge, degrees
    #[arg(short, long, global = true, allow_hyphen_values = true)]
    right_angle: Option<i32>,
    /// Cycles the tilt lags the range data (negative: range lags tilt)
    #[arg(short = 'c', long, global = true, allow_hyphen_values = true)]
    lag: Option<i32>,
    /// Tilt filter
    #[arg(short, long, global = true, value_enum)]
    filter: Option<TiltFilterKind>,
    /// Hamming window size for the symmetric filter
    #[arg(short, long, global = true)]
    window_size: Option<usize>,
    /// Recursive filter order
    #[arg(short = 'd', long, global = true)]
    order: Option<usize>,
    /// Recursive filter cutoff, fraction of the line rate
    #[arg(short = 'q', long, global = true)]
    cutoff: Option<f64>,
    /// Drop lines sweeping back over the previous line
    #[arg(short, long, global = true)]
    backward: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print scan lines
    Lines {
        #[arg(long, value_enum, value_delimiter = ',')]
        fields: Vec<OutputField>,
        #[arg(short = 'm', long)]
        max_lines: Option<u64>,
    },
    /// Export projected points as CSV
    Points {
        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short = 'm', long)]
        max_lines: Option<u64>,
    },
    /// Export a Wavefront OBJ mesh
    Mesh {
        #[arg(short, long)]
        output: PathBuf,
        /// Add vehicle track markers
        #[arg(long)]
        vehicle: bool,
        /// Size markers by the GPS error
        #[arg(long)]
        show_error: bool,
        #[arg(short = 'm', long)]
        max_lines: Option<u64>,
    },
    /// Dump GPS poses
    Gps,
    /// Print first and last timestamps of the logs
    Range,
    /// Print normalized Hamming weights
    Weights {
        #[arg(default_value_t = 7)]
        size: usize,
    },
    /// Print synthesized recursive filter coefficients
    Coefficients {
        #[arg(long)]
        cutoff: f64,
        #[arg(long, default_value_t = 2)]
        poles: usize,
        /// Chebyshev ripple, percent; 0 for Butterworth
        #[arg(long, default_value_t = 0.0)]
        ripple: f64,
        #[arg(long)]
        high_pass: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "[{}] {} - {}", record.level(), record.target(), record.args()))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(&cli.overrides)?;
    match cli.command {
        Command::Lines { fields, max_lines } => {
            if !fields.is_empty() {
                config.output.fields = fields;
            }
            if let Some(max) = max_lines {
                config.output.max_lines = max;
            }
            print_lines(&config)
        }
        Command::Points { output, max_lines } => {
            if let Some(max) = max_lines {
                config.output.max_lines = max;
            }
            export_points(&config, output)
        }
        Command::Mesh {
            output,
            vehicle,
            show_error,
            max_lines,
        } => {
            if let Some(max) = max_lines {
                config.output.max_lines = max;
            }
            config.gps.show_error |= show_error;
            export_mesh(&config, output, vehicle)
        }
        Command::Gps => dump_gps(&config),
        Command::Range => print_ranges(&config),
        Command::Weights { size } => {
            let window = HammingWindow::new(size)?;
            for (i, w) in window.weights().iter().enumerate() {
                println!("{:3} {:.6}", i, w);
            }
            Ok(())
        }
        Command::Coefficients {
            cutoff,
            poles,
            ripple,
            high_pass,
        } => {
            let response = if high_pass {
                FilterResponse::HighPass
            } else {
                FilterResponse::LowPass
            };
            let c = RecursiveCoefficients::synthesize(cutoff, poles, ripple, response)?;
            for (i, (a, b)) in c.a.iter().zip(&c.b).enumerate() {
                println!("a[{}] = {:.10e}  b[{}] = {:.10e}", i, a, i, b);
            }
            Ok(())
        }
    }
}

fn load_config(overrides: &Overrides) -> Result<PipelineConfig> {
    let mut config = match &overrides.config {
        Some(path) => {
            log::info!("Loading config from {}", path.display());
            PipelineConfig::from_file(path)?
        }
        None => PipelineConfig::default(),
    };

    if let Some(lidar) = &overrides.lidar {
        config.input.lidar_log = lidar.clone();
    }
    if let Some(gps) = &overrides.gps {
        config.input.gps_log = Some(gps.clone());
    }
    if let Some(start) = &overrides.start {
        config.window.start_time = Some(TimeSpec::Local(start.clone()));
    }
    if let Some(end) = &overrides.end {
        config.window.end_time = Some(TimeSpec::Local(end.clone()));
    }
    if let Some(v) = overrides.tilt_ignore {
        config.window.tilt_ignore_deg = v;
    }
    if let Some(v) = overrides.left_angle {
        config.window.left_angle_deg = v;
    }
    if let Some(v) = overrides.right_angle {
        config.window.right_angle_deg = v;
    }
    if let Some(v) = overrides.lag {
        config.window.lag_cycles = v;
    }
    if let Some(v) = overrides.filter {
        config.filter.tilt = v;
    }
    if let Some(v) = overrides.window_size {
        config.filter.window_size = v;
    }
    if let Some(v) = overrides.order {
        config.filter.order = v;
    }
    if let Some(v) = overrides.cutoff {
        config.filter.cutoff = v;
    }
    config.filter.backward |= overrides.backward;

    config.validate()?;
    Ok(config)
}

fn require_lidar(config: &PipelineConfig) -> Result<()> {
    if config.input.lidar_log.as_os_str().is_empty() {
        return Err(Error::Config("no lidar log given (--lidar or [input] lidar_log)".into()));
    }
    Ok(())
}

fn print_lines(config: &PipelineConfig) -> Result<()> {
    require_lidar(config)?;
    let mut pipeline = ScanPipeline::from_config(config)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut previous: Option<ScanLine> = None;
    let mut index = 0u64;
    while let Some(line) = pipeline.next_line()? {
        let average = pipeline.last_average();
        let fields: Vec<String> = config
            .output
            .fields
            .iter()
            .map(|field| {
                let (dt, dtilt) = match &previous {
                    Some(p) => (line.timestamp - p.timestamp, line.tilt - p.tilt),
                    None => (0.0, 0.0),
                };
                match field {
                    OutputField::Line => index.to_string(),
                    OutputField::Timestamp => format!("{:.6}", line.timestamp),
                    OutputField::Tilt => format!("{:.6}", line.tilt),
                    OutputField::Angle => format!("{:.3}", line.tilt.to_degrees()),
                    OutputField::DeltaTimestamp => format!("{:.6}", dt),
                    OutputField::DeltaTilt => format!("{:.6}", dtilt),
                    OutputField::DeltaAngle => format!("{:.3}", dtilt.to_degrees()),
                    OutputField::Count => line.count().to_string(),
                    OutputField::Ranges => {
                        line.ranges.iter().map(|r| r.to_string()).collect::<Vec<_>>().join(" ")
                    }
                    OutputField::Avg => average.map_or("-".into(), |a| format!("{:.2}", a.raw)),
                    OutputField::FilteredAvg => average.map_or("-".into(), |a| format!("{:.2}", a.filtered)),
                }
            })
            .collect();
        writeln!(out, "{}", fields.join(" "))?;
        previous = Some(line);
        index += 1;
    }

    report(&pipeline);
    Ok(())
}

fn export_points(config: &PipelineConfig, output: Option<PathBuf>) -> Result<()> {
    require_lidar(config)?;
    let mut pipeline = ScanPipeline::from_config(config)?;

    match output {
        Some(path) => {
            let mut writer = PointWriter::create(&path)?;
            while let Some(projected) = pipeline.next_projected()? {
                writer.write_line(&projected.vertices)?;
            }
            log::info!("Wrote {} lines to {}", writer.lines_written(), path.display());
            writer.finish()?;
        }
        None => {
            let mut writer = PointWriter::new(io::stdout().lock())?;
            while let Some(projected) = pipeline.next_projected()? {
                writer.write_line(&projected.vertices)?;
            }
            writer.finish()?;
        }
    }

    report(&pipeline);
    Ok(())
}

fn export_mesh(config: &PipelineConfig, output: PathBuf, vehicle: bool) -> Result<()> {
    require_lidar(config)?;
    let mut pipeline = ScanPipeline::from_config(config)?;
    let mut writer = ObjWriter::create(&output, config.projection.max_edge_length)?;

    let mut previous: Option<ProjectedLine> = None;
    while let Some(current) = pipeline.next_projected()? {
        if let Some(prev) = &previous {
            writer.write_strip(&interleave(&prev.vertices, &current.vertices))?;
            if vehicle {
                let width = match pipeline.gps_error() {
                    Some(error) if config.gps.show_error => error,
                    _ => DEFAULT_MARKER_WIDTH,
                };
                if let Some(marker) = vehicle_marker(&current.pose, &prev.pose, width) {
                    writer.add_marker(marker);
                }
            }
        }
        previous = Some(current);
    }

    log::info!("Wrote {} faces to {}", writer.faces_written(), output.display());
    writer.finish()?;
    report(&pipeline);
    Ok(())
}

fn report(pipeline: &ScanPipeline) {
    let stats = pipeline.stats();
    log::info!("Total lines: {}  invalid lines: {}", stats.lines, stats.invalid);
    if let Some(backward) = pipeline.backward_stats() {
        log::info!(
            "Backward: {}  crossing: {}  left turns: {}  right turns: {}  reference resets: {}",
            backward.backward,
            backward.crossing,
            backward.left_turns,
            backward.right_turns,
            backward.reference_resets
        );
    }
}

fn dump_gps(config: &PipelineConfig) -> Result<()> {
    let Some(path) = &config.input.gps_log else {
        return Err(Error::Config("no GPS log given (--gps or [input] gps_log)".into()));
    };
    let track_config = PoseTrackConfig {
        heading_from_motion: true,
        ..config.pose_track_config()
    };
    let mut track = PoseTrack::open(path, track_config)?;
    let window = config.requested_window()?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    while track.consume()? {
        let (_, newer) = track.poses();
        if !window.contains(newer.timestamp) {
            continue;
        }
        let (_, Some(raw)) = track.raw_records() else {
            continue;
        };
        let [n, e, d] = raw.ned;
        let [roll, pitch, yaw] = raw.roll_pitch_yaw;
        let p = newer.data.position;
        let heading = track.heading();
        writeln!(
            out,
            "{:.3} {} {:?} {:.3} {:.3} {:.3} {:.3} {:.3} {:.3} {:.2} {:.2} {:.2} {:.2} {:.2}",
            newer.timestamp,
            raw.solution_status,
            raw.position_type(),
            n,
            e,
            d,
            p.x,
            p.y,
            p.z,
            roll,
            pitch,
            yaw,
            heading,
            heading_delta(heading, yaw as f64)
        )?;
    }

    let stats = track.stats();
    log::info!(
        "GPS records: {} consumed, {} duplicates, {} rejected by status",
        stats.consumed,
        stats.duplicates,
        stats.rejected_status
    );
    Ok(())
}

/// Motion heading minus the recorded yaw, in (-180, 180].
fn heading_delta(heading: f64, yaw: f64) -> f64 {
    wrap_degrees(heading - yaw)
}

fn print_ranges(config: &PipelineConfig) -> Result<()> {
    require_lidar(config)?;
    print_range("lidar", log_time_range::<LidarRecord>(&config.input.lidar_log)?);
    if let Some(gps) = &config.input.gps_log {
        print_range("gps", log_time_range::<GpsRecord>(gps)?);
    }
    Ok(())
}

fn print_range(name: &str, range: Option<TimeRange>) {
    match range {
        Some(r) => println!(
            "{}: {} .. {} ({:.3} s)",
            name,
            format_time(r.start),
            format_time(r.end),
            r.duration()
        ),
        None => println!("{}: empty", name),
    }
}

fn format_time(t: f64) -> String {
    let secs = t.floor();
    let nanos = ((t - secs) * 1e9) as u32;
    match Local.timestamp_opt(secs as i64, nanos).single() {
        Some(dt) => format!("{} ({:.3})", dt.format("%Y-%m-%d %H:%M:%S%.3f"), t),
        None => format!("{:.3}", t),
    }
}
