use crate::error::{Error, Result};
use std::time::Duration;

/// Number of concurrent source workers
pub const WORKER_COUNT: usize = 16;

/// Capacity of the shared decoded-record channel
pub const CHANNEL_CAPACITY: usize = 32;

/// Capacity of the job queue between the producer and the workers
pub const JOB_QUEUE_CAPACITY: usize = 32;

/// Line reader buffer size (5 MiB) for decompressed archive streams
pub const READ_BUFFER_SIZE: usize = 5 * 1024 * 1024;

/// Deadline for a whole HTTP fetch, headers and body included
pub const HTTP_TIMEOUT_SECS: u64 = 300;

/// Progress log interval (every N completed sources)
pub const PROGRESS_INTERVAL: u64 = 10;

/// Progress log interval for graph readers/writers (every N nodes)
pub const CODEC_LOG_INTERVAL: u64 = 1_000_000;

/// Progress log interval for the streaming projection (every N bytes read)
pub const STREAM_LOG_BYTES: u64 = 64 * 1024 * 1024;

/// Buffer size for graph file writers and readers
pub const WRITE_BUFFER_SIZE: usize = 256 * 1024;

/// Maximum bytes of a non-success HTTP body kept for diagnostics
pub const BAD_STATUS_BODY_LIMIT: usize = 4096;

/// Lines sampled by the NDJSON pre-flight validator
pub const VALIDATION_SAMPLE_LINES: usize = 1000;

/// Share of sampled lines that must parse for a source to count as NDJSON
pub const VALIDITY_THRESHOLD: f64 = 0.95;

/// Settings for one ingestion run. Built once and handed to [`crate::pipeline::Pipeline`].
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub workers: usize,
    pub channel_capacity: usize,
    pub job_queue_capacity: usize,
    pub read_buffer_size: usize,
    pub http_timeout: Duration,
    pub progress_interval: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: WORKER_COUNT,
            channel_capacity: CHANNEL_CAPACITY,
            job_queue_capacity: JOB_QUEUE_CAPACITY,
            read_buffer_size: READ_BUFFER_SIZE,
            http_timeout: Duration::from_secs(HTTP_TIMEOUT_SECS),
            progress_interval: PROGRESS_INTERVAL,
        }
    }
}

impl PipelineConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_job_queue_capacity(mut self, capacity: usize) -> Self {
        self.job_queue_capacity = capacity;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Rejects settings that would stall or spin the pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("worker count must be at least 1".into()));
        }
        if self.channel_capacity == 0 {
            return Err(Error::Config("channel capacity must be at least 1".into()));
        }
        if self.job_queue_capacity == 0 {
            return Err(Error::Config("job queue capacity must be at least 1".into()));
        }
        if self.read_buffer_size == 0 {
            return Err(Error::Config("read buffer size must be non-zero".into()));
        }
        if self.http_timeout.is_zero() {
            return Err(Error::Config("HTTP timeout must be non-zero".into()));
        }
        if self.progress_interval == 0 {
            return Err(Error::Config("progress interval must be at least 1".into()));
        }
        Ok(())
    }
}
