//! Export runner: source → properties → XML → sink

use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use indicatif::ProgressBar;
use kindxml_core::{
    Record, RecordSink, SerializeError, XmlSerializer, fmt_num, is_shutdown_requested,
};
use rayon::prelude::*;

use crate::config::{Config, ErrorPolicy};
use crate::query::Query;
use crate::source::RecordSource;

/// Pipeline execution summary
#[derive(Debug)]
pub struct Summary {
    pub records_read: usize,
    pub records_written: usize,
    pub records_skipped: usize,
    pub elapsed: Duration,
}

/// Callback invoked once per fragment, before it reaches the sink
pub type FragmentHook<'a> = Box<dyn FnMut(&str) + 'a>;

/// One configured export run.
///
/// Records are pulled from the source in batches, serialized in parallel on a
/// dedicated rayon pool and handed to the sink in source order.
pub struct Pipeline<'a> {
    serializer: XmlSerializer,
    workers: usize,
    batch_size: usize,
    on_error: ErrorPolicy,
    hook: Option<FragmentHook<'a>>,
    progress: ProgressBar,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &Config) -> Result<Self> {
        let serializer = config.serializer().context("Invalid serializer settings")?;
        Ok(Self {
            serializer,
            workers: config.workers.max(1),
            batch_size: config.batch_size.max(1),
            on_error: config.on_error,
            hook: None,
            progress: ProgressBar::hidden(),
        })
    }

    /// Observe every fragment (e.g. echo to stdout)
    pub fn on_fragment(mut self, hook: impl FnMut(&str) + 'a) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Report progress on this bar (hidden by default)
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Run the export. The sink is finished on success only.
    pub fn run<S, K>(&mut self, query: &Query, source: &S, sink: &mut K) -> Result<Summary>
    where
        S: RecordSource + ?Sized,
        K: RecordSink + ?Sized,
    {
        let start = Instant::now();
        log::info!(
            "Exporting kind `{}` (project {}, namespace {}) as <{}>",
            query.kind,
            query.project,
            query.namespace.as_deref().unwrap_or("<default>"),
            self.serializer.root_tag()
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .context("Failed to create thread pool")?;

        let mut entities = source
            .entities(query)
            .context("Failed to open record source")?;

        let mut batch: Vec<Record> = Vec::with_capacity(self.batch_size);
        let mut records_read = 0usize;
        let mut records_written = 0usize;
        let mut records_skipped = 0usize;

        loop {
            if is_shutdown_requested() {
                bail!("Interrupted after {records_read} records; output was not finalized");
            }

            batch.clear();
            for item in entities.by_ref().take(self.batch_size) {
                let entity = item.with_context(|| {
                    format!("Failed to read entity #{}", records_read + batch.len())
                })?;
                batch.push(entity.into_properties());
            }
            if batch.is_empty() {
                break;
            }

            let serializer = &self.serializer;
            let fragments: Vec<Result<String, SerializeError>> =
                pool.install(|| batch.par_iter().map(|r| serializer.serialize(r)).collect());

            for (offset, fragment) in fragments.into_iter().enumerate() {
                let position = records_read + offset;
                match fragment {
                    Ok(xml) => {
                        if let Some(hook) = self.hook.as_mut() {
                            hook(&xml);
                        }
                        sink.write(&xml)
                            .with_context(|| format!("Failed to write record #{position}"))?;
                        records_written += 1;
                    }
                    Err(e) => match self.on_error {
                        ErrorPolicy::Fail => {
                            return Err(e)
                                .with_context(|| format!("Record #{position} cannot be serialized"));
                        }
                        ErrorPolicy::Skip => {
                            log::warn!("Skipping record #{position}: {e}");
                            records_skipped += 1;
                        }
                    },
                }
            }

            records_read += batch.len();
            self.progress.set_message(format!(
                "{} records written, {} skipped",
                fmt_num(records_written),
                fmt_num(records_skipped)
            ));
            log::debug!("Batch done: {records_read} records read");
        }

        sink.finish().context("Failed to finalize output")?;
        self.progress.finish_and_clear();

        let summary = Summary {
            records_read,
            records_written,
            records_skipped,
            elapsed: start.elapsed(),
        };

        log::info!("=== Export Summary ===");
        log::info!(
            "Records: {} read, {} written, {} skipped",
            fmt_num(summary.records_read),
            fmt_num(summary.records_written),
            fmt_num(summary.records_skipped)
        );
        log::info!("Time: {:.1}s", summary.elapsed.as_secs_f64());
        if summary.records_written > 0 {
            let rate = summary.records_written as f64 / summary.elapsed.as_secs_f64();
            log::info!("Throughput: {:.0} records/sec", rate);
        }

        Ok(summary)
    }
}
