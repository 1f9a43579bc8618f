//! Binary entry point for the demystify CLI.
//!
//! Reads a trace document (metadata, exception graph, root id) and prints
//! the demystified rendering of the root exception.
//!
//! ## Usage
//!
//! ```bash
//! # Plain text rendering
//! demystify render trace.json
//!
//! # Colored terminal output
//! demystify render --style ansi trace.json
//!
//! # Both styles plus the written-back traces, as JSON
//! cat trace.json | demystify render - --format json
//!
//! # One frame of the root exception
//! demystify frame trace.json --index 0
//! ```

mod output;

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};

use demystify_core::{DemystifyError, Engine, ErrorCode, RenderOptions, TraceDocument};

use output::{emit_response, ErrorResponse, FrameResponse, NodeTrace, RenderResponse};

// ============================================================================
// CLI Structure
// ============================================================================

/// Demystify compiler-mangled exception traces.
#[derive(Parser, Debug)]
#[command(
    name = "demystify",
    version,
    about = "Render compiler-mangled exception traces as the source the programmer wrote"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

/// Global arguments shared by all subcommands.
#[derive(Parser, Debug)]
struct GlobalArgs {
    /// Log level for tracing output (overridden by RUST_LOG).
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Emit log records as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    /// JSON file with render options.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::default())]
    format: OutputFormat,

    /// Disable color markup.
    #[arg(long, global = true)]
    no_color: bool,

    /// Render type names with their namespace.
    #[arg(long, global = true)]
    full_names: bool,

    /// Render unbound generic parameters as placeholders.
    #[arg(long, global = true)]
    no_generic_names: bool,

    /// Maximum exception nesting depth.
    #[arg(long, global = true)]
    max_depth: Option<usize>,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Rendered text (default).
    #[default]
    Text,
    /// JSON response with both styles.
    Json,
}

/// Rendering style for text output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum RenderStyle {
    /// Plain text (default).
    #[default]
    Plain,
    /// Console markup tags.
    Styled,
    /// ANSI escape sequences.
    Ansi,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the root exception of a trace document.
    Render {
        /// Trace document path, or `-` for stdin.
        input: String,
        /// Rendering style for text output.
        #[arg(long, value_enum, default_value_t = RenderStyle::default())]
        style: RenderStyle,
    },
    /// Render a single frame of the root exception.
    Frame {
        /// Trace document path, or `-` for stdin.
        input: String,
        /// Zero-based frame index.
        #[arg(long)]
        index: usize,
        /// Rendering style for text output.
        #[arg(long, value_enum, default_value_t = RenderStyle::default())]
        style: RenderStyle,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.global.log_level, cli.global.log_json);

    let format = cli.global.format;
    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let error_code = ErrorCode::from(&err);
            match format {
                OutputFormat::Json => {
                    let _ = emit_response(&ErrorResponse::from_error(&err), &mut io::stdout());
                    let _ = io::stdout().flush();
                }
                OutputFormat::Text => {
                    eprintln!("error: {}", err);
                }
            }
            ExitCode::from(error_code.code())
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: LogLevel, json: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Execute the CLI command.
fn execute(cli: Cli) -> Result<(), DemystifyError> {
    let options = resolve_options(&cli.global)?;
    match cli.command {
        Command::Render { input, style } => {
            execute_render(&input, style, cli.global.format, options)
        }
        Command::Frame {
            input,
            index,
            style,
        } => execute_frame(&input, index, style, cli.global.format, options),
    }
}

/// Process-wide defaults, then the config file, then individual flags.
fn resolve_options(global: &GlobalArgs) -> Result<RenderOptions, DemystifyError> {
    let mut options = match &global.config {
        Some(path) => {
            debug!("loading render options from {}", path.display());
            RenderOptions::load(path)?
        }
        None => RenderOptions::global(),
    };
    if global.no_color {
        options.color_enabled = false;
    }
    if global.full_names {
        options.namespace_qualified = true;
    }
    if global.no_generic_names {
        options.include_generic_param_names = false;
    }
    if let Some(max_depth) = global.max_depth {
        if max_depth == 0 {
            return Err(DemystifyError::invalid_args("--max-depth must be at least 1"));
        }
        options.max_depth = max_depth;
    }
    Ok(options)
}

/// Read a trace document from a path, or stdin for `-`.
fn read_document(input: &str) -> Result<TraceDocument, DemystifyError> {
    if input == "-" {
        let mut content = String::new();
        io::stdin().read_to_string(&mut content)?;
        TraceDocument::from_json(&content)
    } else {
        TraceDocument::load(Path::new(input))
    }
}

// ============================================================================
// Command Executors
// ============================================================================

/// Execute render command.
///
/// Text output prints the requested style. JSON output runs the mutating
/// entry point so the response also lists every written-back trace.
fn execute_render(
    input: &str,
    style: RenderStyle,
    format: OutputFormat,
    options: RenderOptions,
) -> Result<(), DemystifyError> {
    let document = read_document(input)?;
    info!(
        "rendering exception #{} of {}",
        document.root.0,
        document.exceptions.len()
    );
    let root = document.root;
    let engine = Engine::new(&document.metadata).with_options(options);
    let mut stdout = io::stdout();

    match format {
        OutputFormat::Json => {
            let mut graph = document.exceptions.clone();
            let plain = engine.demystify(&mut graph, root);
            let styled = engine.to_styled_string_demystified(&graph, root);
            let response = RenderResponse::new(root.0, plain, styled, NodeTrace::collect(&graph));
            emit_response(&response, &mut stdout)?;
        }
        OutputFormat::Text => match style {
            RenderStyle::Plain => {
                writeln!(stdout, "{}", engine.to_string_demystified(&document.exceptions, root))?;
            }
            RenderStyle::Styled => {
                let styled = engine.to_styled_string_demystified(&document.exceptions, root);
                writeln!(stdout, "{}", styled)?;
            }
            RenderStyle::Ansi => {
                engine.write_styled_demystified(&document.exceptions, root, &mut stdout)?
            }
        },
    }
    stdout.flush()?;
    Ok(())
}

/// Execute frame command.
fn execute_frame(
    input: &str,
    index: usize,
    style: RenderStyle,
    format: OutputFormat,
    options: RenderOptions,
) -> Result<(), DemystifyError> {
    let document = read_document(input)?;
    let record = document
        .exceptions
        .get(document.root)
        .ok_or(DemystifyError::UnknownException {
            id: document.root.0,
        })?;
    let frame = record.trace.frames.get(index).ok_or_else(|| {
        DemystifyError::invalid_args(format!(
            "frame index {} out of range ({} frames)",
            index,
            record.trace.frames.len()
        ))
    })?;

    let engine = Engine::new(&document.metadata).with_options(options);
    let mut stdout = io::stdout();
    match format {
        OutputFormat::Json => {
            let response = FrameResponse::new(
                index,
                engine.demystify_frame(frame),
                engine.styled_demystify_frame(frame),
            );
            emit_response(&response, &mut stdout)?;
        }
        OutputFormat::Text => {
            let line = match style {
                RenderStyle::Plain => engine.demystify_frame(frame),
                RenderStyle::Styled => engine.styled_demystify_frame(frame),
                RenderStyle::Ansi if engine.options().color_enabled => {
                    demystify_core::markup::to_ansi(&engine.styled_demystify_frame(frame))
                }
                RenderStyle::Ansi => engine.demystify_frame(frame),
            };
            writeln!(stdout, "{}", line)?;
        }
    }
    stdout.flush()?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
