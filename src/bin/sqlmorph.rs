//! sqlmorph: SQL dialect converter CLI
//!
//! # Usage
//!
//! ```bash
//! # Convert a file
//! sqlmorph convert --from oracle --to postgresql schema.sql
//!
//! # From stdin, JSON report
//! cat dump.sql | sqlmorph convert --from mysql --to oracle --format json
//!
//! # Show the rewrite rules of a pair
//! sqlmorph rules --from oracle --to mysql
//! ```

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::*;
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use sqlmorph::prelude::*;
use sqlmorph::rewrite::RewriteRegistry;
use sqlmorph::stream::{split_statements, ChunkProgress, ProcessingStrategy};

#[derive(Parser)]
#[command(name = "sqlmorph")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Convert SQL between MySQL, PostgreSQL, Oracle and Tibero", long_about = None)]
#[command(after_help = "EXAMPLES:
    sqlmorph convert --from oracle --to postgresql schema.sql
    sqlmorph convert --from mysql --to tibero --format json < dump.sql
    sqlmorph split script.sql
    sqlmorph rules --from oracle --to mysql")]
struct Cli {
    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file (defaults to ./sqlmorph.toml, then the user config dir)
    #[arg(long, global = true, env = "SQLMORPH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a SQL script between dialects
    Convert(ConvertArgs),
    /// Print the statements found in a script
    Split {
        /// Input file; stdin when omitted or `-`
        input: Option<PathBuf>,
    },
    /// List the rewrite rules of a dialect pair
    Rules {
        #[arg(long)]
        from: Dialect,

        #[arg(long)]
        to: Dialect,
    },
    /// List supported dialects and their aliases
    Dialects,
}

#[derive(Args)]
struct ConvertArgs {
    /// Source dialect
    #[arg(long)]
    from: Dialect,

    /// Target dialect
    #[arg(long)]
    to: Dialect,

    /// Input file; stdin when omitted or `-`
    input: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Escalate review warnings to errors
    #[arg(long)]
    strict: bool,

    /// Omit warnings from the output
    #[arg(long)]
    no_warnings: bool,

    /// Comment out statements the target cannot express
    #[arg(long)]
    skip_unsupported: bool,

    /// Schema qualifier to strip
    #[arg(long)]
    schema_owner: Option<String>,

    /// Convert in parallel chunks regardless of input size
    #[arg(long)]
    batch: bool,

    /// Statements per chunk
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Write the converted SQL (or report) here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Summary of a chunked run.
#[derive(Serialize)]
struct BatchSummary {
    total_statements: usize,
    successful_statements: usize,
    failed_statements: usize,
    chunks_processed: usize,
    processing_time_ms: u64,
}

/// JSON report of one `convert` run.
#[derive(Serialize)]
struct Report {
    generated_at: DateTime<Utc>,
    source_dialect: Dialect,
    target_dialect: Dialect,
    converted_sql: String,
    warnings: Vec<ConversionWarning>,
    applied_rules: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    batch: Option<BatchSummary>,
}

impl Report {
    fn has_errors(&self) -> bool {
        self.warnings.iter().any(|w| w.severity == Severity::Error)
    }
}

impl From<ConversionResult> for Report {
    fn from(result: ConversionResult) -> Self {
        Self {
            generated_at: Utc::now(),
            source_dialect: result.source_dialect,
            target_dialect: result.target_dialect,
            converted_sql: result.converted_sql,
            warnings: result.warnings,
            applied_rules: result.applied_rules,
            batch: None,
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let outcome = match cli.command {
        Commands::Convert(args) => run_convert(args, cli.config.as_deref()).await,
        Commands::Split { input } => run_split(input.as_deref()),
        Commands::Rules { from, to } => {
            show_rules(from, to);
            Ok(true)
        }
        Commands::Dialects => {
            show_dialects();
            Ok(true)
        }
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn read_input(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) if path != Path::new("-") => {
            fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
        }
        _ => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

/// Returns `Ok(false)` when the conversion produced error-severity warnings.
async fn run_convert(request: ConvertArgs, config_path: Option<&Path>) -> Result<bool> {
    let mut config = Config::load(config_path)?;
    let options = &mut config.conversion;
    options.strict_mode |= request.strict;
    options.skip_unsupported_features |= request.skip_unsupported;
    if request.no_warnings {
        options.include_warnings = false;
    }
    if request.schema_owner.is_some() {
        options.schema_owner = request.schema_owner.clone();
    }
    if let Some(size) = request.chunk_size {
        config.batch.chunk_size = size.max(1);
    }

    let sql = read_input(request.input.as_deref())?;
    info!(from = %request.from, to = %request.to, bytes = sql.len(), "converting");

    let processor = StreamProcessor::new(config.batch.clone());
    let chunked = request.batch || matches!(processor.strategy(&sql), ProcessingStrategy::Parallel { .. });

    let report = if chunked {
        let options = config.conversion.clone();
        let converter = move |stmt: &str, source: Dialect, target: Dialect| {
            sqlmorph::convert(stmt, source, target, &options)
        };
        let chunk_size = processor.config().chunk_size;
        let progress: &(dyn Fn(ChunkProgress) + Sync) = &|p: ChunkProgress| {
            debug!(
                chunk = p.completed_chunks,
                of = p.total_chunks,
                statements = p.processed_statements,
                "chunk done"
            );
        };
        let result = processor
            .process_in_chunks(&sql, request.from, request.to, converter, chunk_size, Some(progress))
            .await?;
        Report {
            generated_at: Utc::now(),
            source_dialect: request.from,
            target_dialect: request.to,
            converted_sql: result.converted_sql,
            warnings: result.warnings,
            applied_rules: result.applied_rules,
            batch: Some(BatchSummary {
                total_statements: result.total_statements,
                successful_statements: result.successful_statements,
                failed_statements: result.failed_statements,
                chunks_processed: result.chunks_processed,
                processing_time_ms: result.processing_time_ms,
            }),
        }
    } else {
        Report::from(sqlmorph::convert(&sql, request.from, request.to, &config.conversion))
    };

    let rendered = match request.format {
        OutputFormat::Json => serde_json::to_string_pretty(&report)?,
        OutputFormat::Text => report.converted_sql.clone(),
    };
    match &request.output {
        Some(path) => {
            fs::write(path, format!("{}\n", rendered))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{} Wrote {}", "✓".green(), path.display().to_string().cyan());
        }
        None => println!("{}", rendered),
    }

    if matches!(request.format, OutputFormat::Text) {
        print_diagnostics(&report);
    }
    Ok(!report.has_errors())
}

fn print_diagnostics(report: &Report) {
    for warning in &report.warnings {
        let label = match warning.severity {
            Severity::Info => warning.severity.as_str().blue().bold(),
            Severity::Warning => warning.severity.as_str().yellow().bold(),
            Severity::Error => warning.severity.as_str().red().bold(),
        };
        eprintln!("{} [{}] {}", label, warning.kind.as_str().dimmed(), warning.message);
        if let Some(suggestion) = &warning.suggestion {
            eprintln!("  {} {}", "→".cyan(), suggestion.dimmed());
        }
    }
    if !report.applied_rules.is_empty() {
        eprintln!("{}", "Applied rules:".green().bold());
        for rule in &report.applied_rules {
            eprintln!("  • {}", rule);
        }
    }
    if let Some(batch) = &report.batch {
        eprintln!(
            "{} {} statements in {} chunks ({} failed) in {}ms",
            "Batch:".cyan().bold(),
            batch.total_statements,
            batch.chunks_processed,
            batch.failed_statements,
            batch.processing_time_ms
        );
    }
}

fn run_split(input: Option<&Path>) -> Result<bool> {
    let sql = read_input(input)?;
    let statements = split_statements(&sql);
    for (i, statement) in statements.iter().enumerate() {
        println!("{}", format!("-- statement {}", i + 1).dimmed());
        println!("{};", statement);
        println!();
    }
    eprintln!("{} statement(s)", statements.len().to_string().cyan());
    Ok(true)
}

fn show_rules(from: Dialect, to: Dialect) {
    println!("{} {} → {}", "Rewrite rules:".cyan().bold(), from, to);
    if from == to {
        println!("{}", "(identity: input is returned unchanged)".dimmed());
        return;
    }
    let rules = RewriteRegistry::global().rules(DialectPair::new(from, to));
    if rules.is_empty() {
        println!("{}", "(no pattern rules)".dimmed());
    }
    for (i, rule) in rules.iter().enumerate() {
        println!("{:>3}. {}", i + 1, rule.description.white());
    }
}

fn show_dialects() {
    println!("{:12} {:10} {}", "Dialect".white().bold(), "Family".white().bold(), "Aliases".white().bold());
    println!("{}", "─".repeat(48).dimmed());
    for dialect in Dialect::ALL {
        println!(
            "{:12} {:10} {}",
            dialect.name().cyan(),
            dialect.family().name(),
            dialect.aliases().join(", ").dimmed()
        );
    }
}
