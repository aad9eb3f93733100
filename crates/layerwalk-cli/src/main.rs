use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use glob::glob;
use layerwalk_core::{AnalysisOptions, DecoderRegistry, PipelineConfig, Report, Severity};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "layerwalk")]
#[command(version)]
#[command(
    about = "Nested protocol decoder for offline packet captures.",
    long_about = None,
    after_help = "Examples:\n  layerwalk pcap decode capture.pcapng -o report.json\n  layerwalk pcap decode 'captures/*.pcap' --stdout --pretty\n  layerwalk decoders"
)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Operations on PCAP/PCAPNG inputs.
    Pcap {
        #[command(subcommand)]
        command: PcapCommands,
    },
    /// List registered decoders and the protocol ids they claim.
    Decoders {
        /// Print the list as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
enum PcapCommands {
    /// Decode every packet of a capture and write a JSON report.
    Decode(DecodeArgs),
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Path (or glob matching one file) to a .pcap or .pcapng file
    input: PathBuf,

    /// Output report path (JSON)
    #[arg(short = 'o', long, required_unless_present = "stdout")]
    report: Option<PathBuf>,

    /// Write JSON report to stdout
    #[arg(long, conflicts_with = "report")]
    stdout: bool,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Include one record per packet in the report
    #[arg(long)]
    packets: bool,

    /// Maximum layers decoded per invocation
    #[arg(long, value_name = "N")]
    max_depth: Option<usize>,

    /// Decoding threads
    #[arg(long, value_name = "N", default_value_t = 1)]
    workers: usize,

    /// Pipeline configuration file (JSON)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Suppress non-error output
    #[arg(long)]
    quiet: bool,

    /// Exit with a non-zero code if any abort-worthy event was emitted
    #[arg(long)]
    strict: bool,

    /// Log every parser event
    #[arg(long)]
    log_events: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, quiet_requested(&cli.command));

    let result = match cli.command {
        Commands::Pcap {
            command: PcapCommands::Decode(args),
        } => cmd_pcap_decode(args),
        Commands::Decoders { json } => cmd_decoders(json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {hint}");
            }
            ExitCode::from(2)
        }
    }
}

fn quiet_requested(command: &Commands) -> bool {
    matches!(
        command,
        Commands::Pcap {
            command: PcapCommands::Decode(DecodeArgs { quiet: true, .. })
        }
    )
}

fn init_logging(verbose: u8, quiet: bool) {
    let filter = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(std::io::stderr)
        .init();
}

#[derive(Debug)]
struct CliError {
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::new(format!("{err:#}"), None)
    }
}

fn cmd_pcap_decode(args: DecodeArgs) -> Result<(), CliError> {
    let resolved_input = resolve_input_path(&args.input)?;
    validate_input_file(&resolved_input)?;
    let options = analysis_options(&args)?;

    let output = if args.stdout {
        None
    } else {
        let report_path = args.report.clone().ok_or_else(|| {
            CliError::new(
                "missing output path",
                Some("use -o/--report or --stdout".to_string()),
            )
        })?;
        ensure_distinct_output(&resolved_input, &report_path)?;
        Some(report_path)
    };

    let report = layerwalk_core::decode_pcap_file(&resolved_input, &options)
        .context("capture decoding failed")?;
    let json = serialize_report(&report, args.pretty)?;

    match output {
        None => println!("{json}"),
        Some(report_path) => {
            if let Some(parent) = report_path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create output directory: {}", parent.display())
                    })?;
                }
            }
            let bytes = json.len();
            fs::write(&report_path, json)
                .with_context(|| format!("Failed to write report: {}", report_path.display()))?;
            debug!(path = %report_path.display(), bytes, "wrote decode report");
            if !args.quiet {
                print_summary(&report);
                eprintln!("OK: report written -> {}", report_path.display());
            }
        }
    }

    if args.strict && has_abort_worthy(&report) {
        return Err(CliError::new(
            "abort-worthy parser events detected",
            Some("inspect the `events` section of the report".to_string()),
        ));
    }
    Ok(())
}

fn analysis_options(args: &DecodeArgs) -> Result<AnalysisOptions, CliError> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path).map_err(|err| {
            CliError::new(
                format!("invalid config file {}: {err}", path.display()),
                Some("expected JSON with max_decode_depth, max_embed_nesting, decode_embedded".to_string()),
            )
        })?,
        None => PipelineConfig::default(),
    };
    if let Some(depth) = args.max_depth {
        config = config.with_max_decode_depth(depth);
    }
    config.validate().map_err(|err| {
        CliError::new(err.to_string(), Some("adjust --max-depth or the config file".to_string()))
    })?;
    if args.workers == 0 {
        return Err(CliError::new(
            "--workers must be at least 1",
            Some("use --workers 1 to decode on one thread".to_string()),
        ));
    }
    Ok(AnalysisOptions {
        config,
        workers: args.workers,
        include_packets: args.packets,
        log_events: args.log_events,
    })
}

fn ensure_distinct_output(input: &Path, report_path: &Path) -> Result<(), CliError> {
    let input_abs = fs::canonicalize(input)
        .with_context(|| format!("Failed to resolve input path: {}", input.display()))?;
    let parent = match report_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    // A missing output directory is created later and cannot hold the input.
    let Ok(report_dir) = fs::canonicalize(parent) else {
        return Ok(());
    };
    let Some(file_name) = report_path.file_name() else {
        return Err(CliError::new(
            format!("invalid report path: {}", report_path.display()),
            Some("pass a file name, not a directory".to_string()),
        ));
    };
    if report_dir.join(file_name) == input_abs {
        return Err(CliError::new(
            format!(
                "report path must differ from input: {}",
                report_path.display()
            ),
            Some("choose a different output path".to_string()),
        ));
    }
    Ok(())
}

fn serialize_report(report: &Report, pretty: bool) -> Result<String, CliError> {
    let json = if pretty {
        serde_json::to_string_pretty(report)
    } else {
        serde_json::to_string(report)
    };
    json.context("JSON serialization failed").map_err(Into::into)
}

fn has_abort_worthy(report: &Report) -> bool {
    report
        .events
        .iter()
        .any(|event| event.severity == Severity::AbortWorthy.as_str())
}

fn print_summary(report: &Report) {
    if let Some(summary) = &report.capture_summary {
        eprintln!(
            "packets: {} total, {} decoded, {} unsupported link type",
            summary.packets_total, summary.packets_decoded, summary.packets_unsupported
        );
    }
    for (termination, count) in &report.decode.terminations {
        eprintln!("  {termination}: {count}");
    }
    for event in &report.events {
        eprintln!("  {} {} ({})", event.severity, event.code, event.count);
    }
}

#[derive(Debug, Serialize)]
struct DecoderEntry {
    name: &'static str,
    help: &'static str,
    protocol_ids: Vec<String>,
}

fn cmd_decoders(json: bool) -> Result<(), CliError> {
    let registry = DecoderRegistry::builtin().map_err(|err| {
        CliError::new(format!("decoder registry failed to build: {err}"), None)
    })?;

    let mut entries: Vec<DecoderEntry> = registry
        .decoders()
        .map(|decoder| DecoderEntry {
            name: decoder.name(),
            help: decoder.help(),
            protocol_ids: decoder
                .protocol_ids()
                .iter()
                .map(|id| format!("0x{:04x}", id.value()))
                .collect(),
        })
        .collect();
    entries.sort_by(|a, b| a.name.cmp(b.name));

    if json {
        let text = serde_json::to_string_pretty(&entries).context("JSON serialization failed")?;
        println!("{text}");
        return Ok(());
    }

    for entry in entries {
        println!(
            "{:<14} {:<32} {}",
            entry.name,
            entry.protocol_ids.join(","),
            entry.help
        );
    }
    Ok(())
}

fn validate_input_file(input: &Path) -> Result<(), CliError> {
    if !input.exists() {
        return Err(CliError::new(
            format!("input file not found: {}", input.display()),
            Some("use a .pcap or .pcapng file".to_string()),
        ));
    }
    if !input.is_file() {
        return Err(CliError::new(
            format!("input is not a file: {}", input.display()),
            Some("use a .pcap or .pcapng file".to_string()),
        ));
    }
    let ext = input
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    if ext != "pcap" && ext != "pcapng" {
        return Err(CliError::new(
            format!("unsupported input format '{}'", input.display()),
            Some("expected a .pcap or .pcapng file".to_string()),
        ));
    }
    Ok(())
}

fn resolve_input_path(input: &Path) -> Result<PathBuf, CliError> {
    let pattern = input.to_string_lossy();
    if !is_glob_pattern(&pattern) {
        return Ok(input.to_path_buf());
    }

    let paths = glob(&pattern).map_err(|err| {
        CliError::new(
            format!("invalid input pattern '{pattern}'"),
            Some(format!("pattern error: {}", err.msg)),
        )
    })?;
    let mut matches = Vec::new();
    for entry in paths {
        let path = entry.map_err(|err| {
            CliError::new(
                format!("invalid input pattern '{pattern}'"),
                Some(format!("pattern error: {err}")),
            )
        })?;
        if path.is_file() {
            matches.push(path);
        }
    }

    match matches.len() {
        0 => Err(CliError::new(
            format!("no files match pattern '{pattern}'"),
            Some("check the path or quote the pattern; expected .pcap or .pcapng".to_string()),
        )),
        1 => Ok(matches.remove(0)),
        count => {
            let mut listed = matches
                .iter()
                .take(3)
                .map(|path| path.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            if count > 3 {
                listed.push_str(", ...");
            }
            Err(CliError::new(
                format!("multiple files match pattern '{pattern}' ({count} matches); matches: {listed}"),
                Some("pass a single capture file, or run once per file".to_string()),
            ))
        }
    }
}

fn is_glob_pattern(input: &str) -> bool {
    input.contains('*') || input.contains('?') || input.contains('[')
}
