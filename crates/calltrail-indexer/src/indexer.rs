//! Batched parallel indexing.
//!
//! Files are split into batches. Within a batch every worker thread parses
//! its own slice with a private front end and sends finished records over
//! a channel; the calling thread collects them and, once all workers have
//! joined, hands the batch to the [`GraphBuilder`]. Graph mutation only
//! ever happens on the calling thread.

use crate::config::IndexerConfig;
use crate::discovery::{discover_files, display_path};
use crate::error::{IndexError, Result};
use calltrail_core::{FileRecords, FrontEnd, ParseError, SourceParser};
use calltrail_graph::{BuildStats, CallGraph, GraphBuilder};
use crossbeam_channel::{bounded, Sender};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Called from worker threads after each file: `(path, done, total)`.
pub type ProgressFn<'a> = dyn Fn(&str, usize, usize) + Sync + 'a;

/// Result of indexing a directory.
#[derive(Debug)]
pub struct IndexResult {
    /// The finalized graph.
    pub graph: CallGraph,

    /// Number of files that produced records.
    pub files_indexed: usize,

    /// Files that failed to parse, with their error messages.
    pub errors: Vec<(String, String)>,

    pub stats: BuildStats,

    pub duration_ms: u64,
}

/// What a worker sends back to the collecting thread.
enum WorkerMessage {
    Records(Vec<FileRecords>),
    Failed { path: String, message: String },
}

/// Indexes one project root.
pub struct Indexer<'a> {
    root: PathBuf,
    config: IndexerConfig,
    progress: Option<&'a ProgressFn<'a>>,
}

impl<'a> Indexer<'a> {
    pub fn new(root: impl Into<PathBuf>, config: IndexerConfig) -> Self {
        Self {
            root: root.into(),
            config,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: &'a ProgressFn<'a>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Runs with the built-in tree-sitter front end.
    pub fn run(&self) -> Result<IndexResult> {
        self.run_with(|| Ok(SourceParser::new()))
    }

    /// Runs with front ends made by `factory`, one per worker.
    pub fn run_with<P, F>(&self, factory: F) -> Result<IndexResult>
    where
        P: FrontEnd,
        F: Fn() -> std::result::Result<P, ParseError> + Sync,
    {
        let start = Instant::now();

        if !self.root.is_dir() {
            return Err(IndexError::MissingRoot(self.root.clone()));
        }

        let files = discover_files(&self.root, &self.config);
        let total = files.len();
        let batch_size = self.config.batch_size(total);
        let workers = self.config.worker_count();
        info!(
            "Indexing {} files in batches of {} with {} workers",
            total, batch_size, workers
        );

        let mut builder = GraphBuilder::new();
        let mut errors = Vec::new();
        let mut files_indexed = 0;
        let done = AtomicUsize::new(0);

        if batch_size > 0 {
            for (n, batch) in files.chunks(batch_size).enumerate() {
                let records =
                    self.parse_batch(batch, workers, &factory, &done, total, &mut errors)?;
                debug!("Batch {}: {} files with records", n, records.len());
                files_indexed += records.len();
                builder.add_batch(records);
            }
        }

        let stats = builder.stats();
        let graph = builder.build();
        let duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Indexed {} files ({} symbols, {} call edges) in {}ms",
            files_indexed,
            graph.num_symbols(),
            graph.call_edge_count(),
            duration_ms
        );

        Ok(IndexResult {
            graph,
            files_indexed,
            errors,
            stats,
            duration_ms,
        })
    }

    fn parse_batch<P, F>(
        &self,
        batch: &[PathBuf],
        workers: usize,
        factory: &F,
        done: &AtomicUsize,
        total: usize,
        errors: &mut Vec<(String, String)>,
    ) -> Result<Vec<FileRecords>>
    where
        P: FrontEnd,
        F: Fn() -> std::result::Result<P, ParseError> + Sync,
    {
        let slice_len = batch.len().div_ceil(workers.max(1)).max(1);
        let (tx, rx) = bounded::<WorkerMessage>(workers * 2);

        std::thread::scope(|scope| {
            let handles: Vec<_> = batch
                .chunks(slice_len)
                .map(|slice| {
                    let tx = tx.clone();
                    scope.spawn(move || {
                        let front_end = factory()?;
                        self.parse_slice(front_end, slice, &tx, done, total);
                        Ok::<(), ParseError>(())
                    })
                })
                .collect();
            drop(tx);

            let mut records = Vec::with_capacity(batch.len());
            for message in rx {
                match message {
                    WorkerMessage::Records(mut buffer) => records.append(&mut buffer),
                    WorkerMessage::Failed { path, message } => errors.push((path, message)),
                }
            }

            for handle in handles {
                handle.join().map_err(|_| IndexError::WorkerPanic)??;
            }
            Ok(records)
        })
    }

    fn parse_slice<P: FrontEnd>(
        &self,
        mut front_end: P,
        slice: &[PathBuf],
        tx: &Sender<WorkerMessage>,
        done: &AtomicUsize,
        total: usize,
    ) {
        let mut buffer = Vec::new();
        let mut buffered = 0;

        for path in slice {
            let display_name = display_path(&self.root, path);

            match front_end.parse_file(path, &display_name) {
                Ok(records) => {
                    buffered += records.len();
                    buffer.push(records);
                }
                Err(ParseError::EmptyFile(_)) => {
                    debug!("Skipping empty file {}", display_name);
                }
                Err(e) => {
                    warn!("Failed to parse {}: {}", display_name, e);
                    let _ = tx.send(WorkerMessage::Failed {
                        path: display_name.clone(),
                        message: e.to_string(),
                    });
                }
            }

            let n = done.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(progress) = self.progress {
                progress(&display_name, n, total);
            }

            if buffered >= self.config.flush_threshold {
                let _ = tx.send(WorkerMessage::Records(std::mem::take(&mut buffer)));
                buffered = 0;
            }
        }

        if !buffer.is_empty() {
            let _ = tx.send(WorkerMessage::Records(buffer));
        }
    }
}

/// Indexes `root` with its stored config (or the defaults).
pub fn index_directory(root: &Path) -> Result<IndexResult> {
    let config = IndexerConfig::load(root)?;
    Indexer::new(root, config).run()
}
