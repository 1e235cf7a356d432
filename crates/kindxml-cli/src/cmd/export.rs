//! Export subcommand - serialize one entity kind into sharded XML text

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use kindxml_core::{SharedProgress, TextShardSink, TextSinkConfig, fmt_num};
use kindxml_datastore::{ErrorPolicy, ExportSource, InputFormat, Pipeline, Query};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Entity kind to export
    #[arg(long)]
    pub kind: String,

    /// Namespace of the entities (default namespace when omitted)
    #[arg(long)]
    pub namespace: Option<String>,

    /// Output path prefix; shards are PREFIX-SSSSS-of-NNNNN[SUFFIX]
    #[arg(short, long)]
    pub output: PathBuf,

    /// Number of output shards
    #[arg(long)]
    pub num_shards: Option<usize>,

    /// Project the entities belong to
    #[arg(long)]
    pub project: String,

    /// Job region (recorded in logs only)
    #[arg(long)]
    pub region: Option<String>,

    /// Job name (recorded in logs only)
    #[arg(long, default_value = "unique-job-name")]
    pub job_name: String,

    /// Execution runner
    #[arg(long, value_enum, default_value = "direct")]
    pub runner: Runner,

    /// First line of every shard file
    #[arg(long)]
    pub header: Option<String>,

    /// Entity export file (newline-delimited JSON, .gz allowed, - for stdin)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Line format of the export file
    #[arg(long, value_enum, default_value = "datastore")]
    pub format: Format,

    /// Element name wrapping each entity
    #[arg(long)]
    pub root_tag: Option<String>,

    /// Indent per nesting level; empty for compact fragments
    #[arg(long)]
    pub indent: Option<String>,

    /// Maximum nesting of embedded entities and arrays
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Emit properties in key order instead of export order (`--sort-keys=false` to disable)
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub sort_keys: Option<bool>,

    /// Suffix appended to every shard file name (e.g. ".xml")
    #[arg(long)]
    pub suffix: Option<String>,

    /// Number of serialization threads
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// What to do with entities that cannot be serialized
    #[arg(long, value_enum)]
    pub on_error: Option<OnError>,

    /// Also print every fragment to stdout
    #[arg(long)]
    pub echo: bool,
}

#[derive(Clone, Copy, ValueEnum, Debug)]
pub enum Runner {
    /// Run in this process
    #[value(alias = "DirectRunner")]
    Direct,
}

#[derive(Clone, Copy, ValueEnum, Debug)]
pub enum Format {
    Datastore,
    Json,
}

impl From<Format> for InputFormat {
    fn from(f: Format) -> Self {
        match f {
            Format::Datastore => InputFormat::Datastore,
            Format::Json => InputFormat::Json,
        }
    }
}

#[derive(Clone, Copy, ValueEnum, Debug)]
pub enum OnError {
    Fail,
    Skip,
}

impl From<OnError> for ErrorPolicy {
    fn from(p: OnError) -> Self {
        match p {
            OnError::Fail => ErrorPolicy::Fail,
            OnError::Skip => ErrorPolicy::Skip,
        }
    }
}

/// Merge CLI flags over file config into pipeline settings
fn pipeline_config(args: &ExportArgs, config: &Config) -> kindxml_datastore::Config {
    kindxml_datastore::Config {
        root_tag: args
            .root_tag
            .clone()
            .unwrap_or_else(|| config.xml.root_tag.clone()),
        indent: args
            .indent
            .clone()
            .unwrap_or_else(|| config.xml.indent.clone()),
        max_depth: args.max_depth.unwrap_or(config.xml.max_depth),
        sort_keys: args.sort_keys.unwrap_or(config.xml.sort_keys),
        workers: args.workers.unwrap_or(config.pipeline.workers),
        on_error: args.on_error.map_or(config.pipeline.on_error, Into::into),
        ..Default::default()
    }
}

fn sink_config(args: &ExportArgs, config: &Config) -> TextSinkConfig {
    TextSinkConfig {
        prefix: args.output.clone(),
        num_shards: args.num_shards.unwrap_or(config.output.num_shards),
        suffix: args
            .suffix
            .clone()
            .unwrap_or_else(|| config.output.suffix.clone()),
        header: args
            .header
            .clone()
            .unwrap_or_else(|| config.output.header.clone()),
    }
}

pub fn run(args: ExportArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let query = Query::new(&args.kind, &args.project, args.namespace.clone())?;
    let pipeline_config = pipeline_config(&args, config);
    let sink_config = sink_config(&args, config);
    anyhow::ensure!(sink_config.num_shards >= 1, "--num-shards must be at least 1");

    log::info!("Job {} ({:?} runner)", args.job_name, args.runner);
    log::info!(
        "  Region: {}",
        args.region.as_deref().unwrap_or(&config.job.region)
    );
    log::info!("  Input: {}", args.input.display());
    log::info!(
        "  Output: {} ({} shards)",
        sink_config.prefix.display(),
        sink_config.num_shards
    );

    let source = ExportSource::open(&args.input)
        .with_context(|| format!("Failed to open export {}", args.input.display()))?
        .with_format(args.format.into());
    let mut sink = TextShardSink::create(&sink_config).with_context(|| {
        format!(
            "Failed to create output shards at {}",
            sink_config.prefix.display()
        )
    })?;

    let mut echo = args.echo.then(|| Echo::new(io::stdout().lock()));
    let mut pipeline = Pipeline::new(&pipeline_config)?
        .with_progress(progress.stage_line("export"))
        .on_fragment(move |fragment| match echo.as_mut() {
            Some(echo) => echo.write(fragment),
            None => log::trace!("{fragment}"),
        });
    let summary = pipeline.run(&query, &source, &mut sink)?;

    let shards = sink_config.shard_paths();
    let mut rows = vec![
        ("Records read", fmt_num(summary.records_read)),
        ("Written", fmt_num(summary.records_written)),
        ("Skipped", fmt_num(summary.records_skipped)),
        ("Time", format!("{:.1}s", summary.elapsed.as_secs_f64())),
    ];
    for path in &shards {
        rows.push(("Shard", path.display().to_string()));
    }
    print_summary(&format!("Export {}", query.kind), &rows);

    Ok(())
}

/// Copies fragments to a writer until the writer goes away.
///
/// A closed pipe (`kindxml export --echo | head`) only stops the echo; the
/// shards are still written.
struct Echo<W> {
    out: Option<W>,
}

impl<W: Write> Echo<W> {
    fn new(out: W) -> Self {
        Self { out: Some(out) }
    }

    fn write(&mut self, fragment: &str) {
        let Some(out) = self.out.as_mut() else {
            return;
        };
        if let Err(e) = writeln!(out, "{fragment}") {
            if e.kind() == io::ErrorKind::BrokenPipe {
                log::debug!("stdout closed, echo stopped");
            } else {
                log::warn!("Echo to stdout failed, echo stopped: {e}");
            }
            self.out = None;
        }
    }
}

/// Print a key-value summary table on stderr
fn print_summary(title: &str, rows: &[(&str, String)]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new(title).fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    eprintln!("\n{table}");
}
