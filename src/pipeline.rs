//! Bounded-concurrency ingestion of many gzip NDJSON sources into one aggregate.
//!
//! Layout of a run:
//!
//! ```text
//! producer ──jobs──▶ worker × N ──records──▶ aggregator (calling thread)
//!                        │
//!                 open + decode one source at a time
//! ```
//!
//! - The job queue and the record channel are both bounded; a slow aggregator
//!   blocks workers on send instead of letting decoded records pile up.
//! - A failing source (open, fetch, framing) is logged and skipped; its worker
//!   moves on to the next job.
//! - A closer thread joins every worker before releasing the last record
//!   sender, so the channel closes exactly once, after all workers are done.
//! - Records from different sources interleave arbitrarily; within one source
//!   they arrive in line order.

use crate::aggregate::Aggregator;
use crate::config::PipelineConfig;
use crate::decode::{decode_stream_into, DecodeSummary};
use crate::error::{Error, Result};
use crate::models::RawRecord;
use crate::source::{SourceKind, SourceProvider};
use crate::stats::{IngestStats, IngestSummary};
use crossbeam_channel::{bounded, Receiver, Sender};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Output of a pipeline run.
#[derive(Debug)]
pub struct Ingested<R> {
    pub output: R,
    pub summary: IngestSummary,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Ingests `jobs` with the provider selected by `kind`.
    pub fn run<A: Aggregator>(
        &self,
        jobs: &[String],
        kind: SourceKind,
        aggregator: A,
    ) -> Result<Ingested<A::Output>> {
        let provider = kind.provider(&self.config)?;
        self.run_with_source(jobs, provider.as_ref(), aggregator)
    }

    /// Ingests `jobs` through `source`, attempting each job exactly once.
    ///
    /// Per-source failures never fail the run; they show up in the summary's
    /// `sources_failed` count and as missing records in the output.
    pub fn run_with_source<A: Aggregator>(
        &self,
        jobs: &[String],
        source: &dyn SourceProvider,
        aggregator: A,
    ) -> Result<Ingested<A::Output>> {
        let config = &self.config;
        let stats = IngestStats::new(jobs.len() as u64);
        let progress = make_progress_bar(jobs.len() as u64);

        let (job_tx, job_rx) = bounded::<&str>(config.job_queue_capacity);
        let (record_tx, record_rx) = bounded::<RawRecord<A::Record>>(config.channel_capacity);

        info!(
            sources = jobs.len(),
            workers = config.workers,
            "Starting ingestion"
        );

        let output = thread::scope(|scope| {
            scope.spawn(move || {
                for job in jobs {
                    if job_tx.send(job.as_str()).is_err() {
                        break;
                    }
                }
                debug!("Job producer finished");
            });

            let workers: Vec<_> = (0..config.workers)
                .map(|worker_id| {
                    let jobs = job_rx.clone();
                    let records = record_tx.clone();
                    let stats = &stats;
                    let progress = &progress;
                    scope.spawn(move || {
                        run_worker(worker_id, jobs, records, source, config, stats, progress)
                    })
                })
                .collect();
            drop(job_rx);

            scope.spawn(move || {
                for handle in workers {
                    if handle.join().is_err() {
                        error!("Ingest worker panicked");
                    }
                }
                drop(record_tx);
                debug!("All workers finished, record channel closed");
            });

            aggregator.fold(record_rx)
        });

        progress.finish_and_clear();
        let summary = stats.snapshot();
        info!(
            sources = summary.total_sources,
            failed = summary.sources_failed,
            records = summary.records_decoded,
            skipped_lines = summary.lines_skipped,
            duration_secs = stats.elapsed().as_secs_f64(),
            "Ingestion complete"
        );

        Ok(Ingested { output, summary })
    }
}

fn run_worker<T: serde::de::DeserializeOwned + Send>(
    worker_id: usize,
    jobs: Receiver<&str>,
    records: Sender<RawRecord<T>>,
    source: &dyn SourceProvider,
    config: &PipelineConfig,
    stats: &IngestStats,
    progress: &ProgressBar,
) {
    for job in jobs {
        let result = process_source(job, source, config, &records, stats);
        let channel_closed = matches!(result, Err(Error::ChannelClosed));

        match result {
            Ok(summary) => debug!(
                worker = worker_id,
                source = job,
                records = summary.records,
                skipped = summary.skipped,
                "Source finished"
            ),
            Err(Error::ChannelClosed) => {}
            Err(e) => {
                stats.inc_failed();
                if e.is_source_failure() {
                    warn!(worker = worker_id, source = job, error = %e, "Skipping source");
                } else {
                    error!(worker = worker_id, source = job, error = %e, "Skipping source after unexpected error");
                }
            }
        }

        let done = stats.inc_completed();
        progress.inc(1);
        report_progress(stats, done, config.progress_interval);

        if channel_closed {
            debug!(worker = worker_id, "Aggregator stopped receiving, worker exiting");
            break;
        }
    }
}

fn process_source<T: serde::de::DeserializeOwned>(
    id: &str,
    source: &dyn SourceProvider,
    config: &PipelineConfig,
    records: &Sender<RawRecord<T>>,
    stats: &IngestStats,
) -> Result<DecodeSummary> {
    let opened = source.open(id)?;
    stats.add_declared_bytes(opened.length);

    let mut summary = DecodeSummary::default();
    let result = decode_stream_into(
        opened.reader,
        config.read_buffer_size,
        &mut summary,
        |record| records.send(record).map_err(|_| Error::ChannelClosed),
    );
    stats.add_decoded(&summary);

    match result {
        Ok(()) => Ok(summary),
        Err(e) => Err(classify_read_error(id, config.http_timeout, e)),
    }
}

/// A body read that hits the fetch deadline surfaces as a timed-out I/O error.
fn classify_read_error(id: &str, timeout: Duration, err: Error) -> Error {
    match err {
        Error::Io(e) if e.kind() == io::ErrorKind::TimedOut => Error::Timeout {
            source_id: id.to_string(),
            seconds: timeout.as_secs_f64(),
        },
        other => other,
    }
}

fn report_progress(stats: &IngestStats, done: u64, interval: u64) {
    let total = stats.total();
    if done % interval == 0 || done == total {
        let eta = stats.eta(done);
        info!(
            processed = done,
            total,
            eta_secs = eta.as_secs(),
            "Progress: {}/{} | ETA: {}s",
            done,
            total,
            eta.as_secs()
        );
    }
}

fn make_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("    {spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} sources | ETA {eta}")
        .map(|style| style.progress_chars("=> "))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
