use clap::{Parser, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use webapi_rust::line_protocol::{to_json, to_line_protocol, OutputFormat};
use webapi_rust::measurement::{parse_source, source_tags};
use webapi_rust::{debug, decode, Config, Flattener, InputFormat, Measurement, Result, Tags};

const LOG_TARGET: &str = "webapi";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    None,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Flatten a JSON or XML API response into measurements.
#[derive(Parser, Debug)]
#[command(name = "webapi", version)]
struct Args {
    /// Response body to read; standard input when omitted
    file: Option<PathBuf>,

    /// TOML configuration with variables and tag keys
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// URL the body was fetched from, added as the `url` and `server` tags
    #[arg(long)]
    source: Option<String>,

    /// Override the configured input format
    #[arg(long, value_enum)]
    input_format: Option<InputFormat>,

    #[arg(long, value_enum, default_value = "line")]
    output: OutputFormat,

    #[arg(long, value_enum, default_value = "warn")]
    log_level: LogLevel,
}

fn init_logging(log_level: LogLevel) {
    let level = match log_level {
        LogLevel::None => return,
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);
    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .init();
}

fn read_body(file: Option<&Path>) -> io::Result<Vec<u8>> {
    match file {
        Some(path) => fs::read(path),
        None => {
            let mut body = Vec::new();
            io::stdin().read_to_end(&mut body)?;
            Ok(body)
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(format) = args.input_format {
        config.input_format = format;
    }

    let started = Instant::now();
    let body = read_body(args.file.as_deref())?;
    let response_time = started.elapsed().as_secs_f64();

    let source = args.source.as_deref().map(parse_source).transpose()?;
    let caller_tags = source.as_ref().map(source_tags).unwrap_or_else(Tags::new);

    let Some(root) = decode(&body, config.input_format, config.max_depth)? else {
        log::info!(target: LOG_TARGET, "Empty response body, nothing to report");
        return Ok(());
    };

    let flattener: Flattener = config.flattener();
    let dump = if config.debug {
        debug::open(Path::new("."), source.as_ref())
    } else {
        None
    };
    let records = match dump {
        Some(mut dump) => flattener.flatten_observed(&root, &caller_tags, &mut dump)?,
        None => flattener.flatten(&root, &caller_tags)?,
    };
    log::debug!(target: LOG_TARGET, "{} record(s) from {} byte(s)", records.len(), body.len());

    let measurements = Measurement::from_records(&config.name, records, Some(response_time));
    match args.output {
        OutputFormat::Line => print!("{}", to_line_protocol(&measurements, None)),
        OutputFormat::Json => println!("{}", to_json(&measurements).map_err(io::Error::from)?),
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_level);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
