//! kindxml - Export entities of one kind as XML fragments
//!
//! Reads a Datastore entity export, converts each entity's properties to an
//! XML element and writes them to sharded text files with a header line.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "kindxml")]
#[command(about = "Export Datastore entities as sharded XML text")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file path (default: ./kindxml.toml or ~/.config/kindxml/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Export one entity kind to sharded XML text files
    Export(cmd::export::ExportArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    kindxml_core::install_signal_handlers().context("Failed to install signal handlers")?;

    // Progress context (TTY auto-detect)
    let progress = Arc::new(kindxml_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug, the spinner shows activity
    //   non-TTY: info unless --quiet or --debug
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let verbosity = kindxml_core::Verbosity::from_flags(cli.quiet || is_tty, cli.debug);
    kindxml_core::init_logging(verbosity, multi).context("Failed to initialize logging")?;

    // Load configuration
    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    match cli.command {
        Command::Export(args) => cmd::export::run(args, &config, &progress),
        Command::Config => {
            use comfy_table::{
                Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
            };

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec![
                    Cell::new("Setting").fg(Color::Cyan),
                    Cell::new("Value").fg(Color::Cyan),
                ]);

            table.add_row(vec!["Root tag", &config.xml.root_tag]);
            table.add_row(vec!["Indent", &format!("{:?}", config.xml.indent)]);
            table.add_row(vec!["Max depth", &config.xml.max_depth.to_string()]);
            table.add_row(vec![
                "Sort keys",
                if config.xml.sort_keys { "yes" } else { "no" },
            ]);
            table.add_row(vec!["Header", &format!("{:?}", config.output.header)]);
            table.add_row(vec!["Shards", &config.output.num_shards.to_string()]);
            table.add_row(vec!["Suffix", &format!("{:?}", config.output.suffix)]);
            table.add_row(vec!["Workers", &config.pipeline.workers.to_string()]);
            table.add_row(vec![
                "On error",
                &format!("{:?}", config.pipeline.on_error).to_lowercase(),
            ]);
            table.add_row(vec!["Region", &config.job.region]);

            eprintln!("\n{table}");
            Ok(())
        }
    }
}
