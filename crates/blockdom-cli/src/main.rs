//! blockdom CLI - flatten, validate and inspect block-editor creation markup
//!
//! Usage:
//!   bdcli [OPTIONS] <COMMAND> <FILE>
//!
//! Commands:
//!   flatten   Flatten a markup file into block records
//!   event     Adapt a JSON creation event into block records
//!   validate  Check markup for errors
//!   stats     Show block statistics

use std::collections::HashSet;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context, Result};
use blockdom_core::{
    flatten_str_with, BlockRecord, EventAdapter, FlattenError, FlattenOptions, ParseCache,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter directive.
const LOG_ENV: &str = "BLOCKDOM_LOG";

#[derive(Parser, Debug)]
#[command(name = "bdcli", author, version, about = "Flatten block-editor creation markup")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    json: bool,

    /// Show every record in detail and enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Fail on blocks nested deeper than this
    #[arg(long, global = true, value_name = "N")]
    max_depth: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Flatten a markup file into block records
    Flatten {
        /// Markup file, or `-` for stdin
        file: PathBuf,
    },
    /// Adapt a JSON creation event (`{"blockId": .., "xml": {"outerHTML": ..}}`)
    Event {
        /// Event JSON file, or `-` for stdin
        file: PathBuf,
    },
    /// Check markup for errors without printing records
    Validate {
        /// Markup file, or `-` for stdin
        file: PathBuf,
    },
    /// Show block statistics
    Stats {
        /// Markup file, or `-` for stdin
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("error: {:#}", e);
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let options = FlattenOptions {
        max_depth: cli.max_depth,
    };

    match &cli.command {
        Command::Flatten { file } => cmd_flatten(&read_input(file)?, &options, cli),
        Command::Event { file } => cmd_event(&read_input(file)?, &options, cli),
        Command::Validate { file } => cmd_validate(&read_input(file)?, &options, cli),
        Command::Stats { file } => cmd_stats(&read_input(file)?, &options, cli),
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut input = String::new();
        io::stdin()
            .read_to_string(&mut input)
            .context("failed to read stdin")?;
        return Ok(input);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read '{}'", path.display()))
}

// =============================================================================
// Flatten Command
// =============================================================================

fn cmd_flatten(input: &str, options: &FlattenOptions, cli: &Cli) -> Result<()> {
    let blocks = flatten_str_with(input, options)?;
    print_blocks(&blocks, cli)
}

// =============================================================================
// Event Command
// =============================================================================

fn cmd_event(input: &str, options: &FlattenOptions, cli: &Cli) -> Result<()> {
    let event: serde_json::Value =
        serde_json::from_str(input).context("event is not valid JSON")?;
    let mut adapter = EventAdapter::new(ParseCache::new(0), *options);

    match adapter.adapt(&event)? {
        Some(blocks) => print_blocks(&blocks, cli),
        None => {
            if cli.json {
                println!("null");
            } else {
                println!("No applicable event");
            }
            Ok(())
        }
    }
}

// =============================================================================
// Validate Command
// =============================================================================

#[derive(Serialize)]
struct JsonValidation<'a> {
    valid: bool,
    blocks: usize,
    error: Option<JsonError<'a>>,
}

#[derive(Serialize)]
struct JsonError<'a> {
    kind: &'a str,
    message: String,
    span: Option<JsonSpan>,
}

#[derive(Serialize)]
struct JsonSpan {
    start: u32,
    end: u32,
}

impl<'a> From<&'a FlattenError> for JsonError<'a> {
    fn from(e: &'a FlattenError) -> Self {
        JsonError {
            kind: e.kind().as_str(),
            message: e.to_string(),
            span: e.span().map(|s| JsonSpan {
                start: s.start,
                end: s.end,
            }),
        }
    }
}

fn cmd_validate(input: &str, options: &FlattenOptions, cli: &Cli) -> Result<()> {
    let result = flatten_str_with(input, options);

    if cli.json {
        let report = match &result {
            Ok(blocks) => JsonValidation {
                valid: true,
                blocks: blocks.len(),
                error: None,
            },
            Err(e) => JsonValidation {
                valid: false,
                blocks: 0,
                error: Some(JsonError::from(e)),
            },
        };
        println!("{}", serde_json::to_string(&report)?);
    }

    match result {
        Ok(blocks) => {
            if !cli.json {
                println!("Valid: {} block(s), no errors found", blocks.len());
            }
            Ok(())
        }
        Err(e) => {
            if !cli.json {
                eprintln!("Invalid: {}", e);
            }
            bail!("validation failed")
        }
    }
}

// =============================================================================
// Stats Command
// =============================================================================

#[derive(Debug, Default, Serialize)]
struct BlockStats {
    blocks: usize,
    top_level: usize,
    inputs: usize,
    fields: usize,
    chained: usize,
    max_depth: usize,
}

impl BlockStats {
    fn from_blocks(blocks: &[BlockRecord]) -> Self {
        let mut stats = Self {
            blocks: blocks.len(),
            ..Self::default()
        };
        for block in blocks {
            stats.top_level += usize::from(block.top_level);
            stats.inputs += block.inputs.len();
            stats.fields += block.fields.len();
            stats.chained += usize::from(block.next.is_some());
        }
        stats.max_depth = max_depth(blocks);
        stats
    }
}

/// Deepest nesting reachable from a top-level record, following inputs only.
/// `next` links stay on the same level. Revisited ids are skipped, since
/// records may form a cycle.
fn max_depth(blocks: &[BlockRecord]) -> usize {
    let by_id: std::collections::HashMap<&str, &BlockRecord> =
        blocks.iter().map(|b| (b.id.as_str(), b)).collect();
    let mut seen = HashSet::new();
    let mut stack: Vec<(&str, usize)> = blocks
        .iter()
        .filter(|b| b.top_level)
        .map(|b| (b.id.as_str(), 0))
        .collect();
    let mut deepest = 0;

    while let Some((id, depth)) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        deepest = deepest.max(depth);
        let Some(block) = by_id.get(id) else {
            continue;
        };
        for linked in block.linked_ids() {
            // `next` continues the same stack; inputs nest one level down.
            let step = usize::from(block.next.as_deref() != Some(linked));
            stack.push((linked, depth + step));
        }
    }
    deepest
}

fn cmd_stats(input: &str, options: &FlattenOptions, cli: &Cli) -> Result<()> {
    let blocks = flatten_str_with(input, options)?;
    let stats = BlockStats::from_blocks(&blocks);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Block Statistics");
    println!("----------------");
    println!("Blocks:        {}", stats.blocks);
    println!("Top-level:     {}", stats.top_level);
    println!("Inputs:        {}", stats.inputs);
    println!("Fields:        {}", stats.fields);
    println!("Chained:       {}", stats.chained);
    println!("Max depth:     {}", stats.max_depth);
    println!();
    println!("Size:");
    println!("  Bytes:       {}", input.len());
    println!("  Lines:       {}", input.lines().count());

    Ok(())
}

// =============================================================================
// Output
// =============================================================================

fn print_blocks(blocks: &[BlockRecord], cli: &Cli) -> Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(blocks)?);
        return Ok(());
    }

    let top_level = blocks.iter().filter(|b| b.top_level).count();
    println!("Blocks: {} ({} top-level)", blocks.len(), top_level);
    for (i, block) in blocks.iter().enumerate() {
        println!("  [{}] {}", i + 1, describe_block(block));
        if cli.verbose {
            print_block_verbose(block, 3);
        }
    }
    Ok(())
}

fn describe_block(block: &BlockRecord) -> String {
    let mut line = format!("{} ({})", block.id, block.opcode);
    if block.top_level {
        line.push_str(" top-level");
    }
    if let Some(next) = &block.next {
        line.push_str(&format!(" -> {}", next));
    }
    line
}

fn print_block_verbose(block: &BlockRecord, indent: usize) {
    let prefix = "  ".repeat(indent);
    for field in block.fields.values() {
        println!("{}field {} = {:?}", prefix, field.name, field.value);
    }
    for input in block.inputs.values() {
        println!("{}input {} <- {}", prefix, input.name, input.block);
    }
}
