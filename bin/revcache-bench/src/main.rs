//! Revision cache load generator
//!
//! Seeds an in-memory document store, then drives a revision cache from
//! several threads with a mix of lookups, puts and delta updates, and
//! reports throughput and hit/miss statistics.

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use rand::Rng;
use revcache::{
    CacheStats, DocumentRevision, DocumentSource, LoadedRevision, MemoryDocumentSource,
    MetricsStatsRecorder, RevisionCache, RevisionLoader, StatsRecorder,
};
use revcache_common::{Body, Config, Revisions};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "revcache-bench")]
#[command(about = "Revision cache load generator")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "revcache.toml")]
    config: String,

    /// Cache capacity (overrides the config file, 0 = default)
    #[arg(long)]
    capacity: Option<u32>,

    /// Number of documents to seed (at least one)
    #[arg(long, default_value = "10000")]
    docs: usize,

    /// Revisions stored per document
    #[arg(long, default_value = "3")]
    revs_per_doc: u64,

    /// Worker threads
    #[arg(long, default_value = "8")]
    threads: usize,

    /// Operations per worker thread
    #[arg(long, default_value = "100000")]
    ops_per_thread: usize,

    /// Print the exported counters in Prometheus text format when done
    #[arg(long)]
    prometheus: bool,

    /// Log level (overrides the config file)
    #[arg(long)]
    log_level: Option<String>,
}

/// Counts locally and, when enabled, exports through the metrics facade
struct BenchStats {
    local: CacheStats,
    exported: Option<MetricsStatsRecorder>,
}

impl StatsRecorder for BenchStats {
    fn record_hit(&self) {
        self.local.record_hit();
        if let Some(exported) = &self.exported {
            exported.record_hit();
        }
    }

    fn record_miss(&self) {
        self.local.record_miss();
        if let Some(exported) = &self.exported {
            exported.record_miss();
        }
    }
}

/// Seeded documents: each entry holds a document ID and its revision IDs,
/// oldest first
struct Workload {
    docs: Vec<(String, Vec<String>)>,
}

impl Workload {
    /// Seed at least one document with at least one revision each
    fn seed(source: &MemoryDocumentSource, docs: usize, revs_per_doc: u64) -> Result<Self> {
        let docs = docs.max(1);
        let mut rng = rand::thread_rng();
        let mut seeded = Vec::with_capacity(docs);

        for seq in 0..docs {
            let doc_id = uuid::Uuid::new_v4().to_string();
            let mut rev_ids: Vec<String> = Vec::new();

            for generation in 1..=revs_per_doc.max(1) {
                let rev_id = format!("{generation}-{:08x}", rng.r#gen::<u32>());
                rev_ids.push(rev_id.clone());

                let history: Vec<&str> = rev_ids.iter().rev().map(String::as_str).collect();
                let mut body = Body::new();
                body.insert("seq".into(), json!(seq));
                body.insert("generation".into(), json!(generation));
                body.insert("payload".into(), json!({ "value": rng.r#gen::<u64>() }));

                let revision = LoadedRevision::new(body, Revisions::from_rev_ids(&history)?)
                    .with_channels([format!("ch{}", seq % 16)]);
                source.insert_revision(&doc_id, &rev_id, revision)?;
            }
            seeded.push((doc_id, rev_ids));
        }

        Ok(Self { docs: seeded })
    }

    fn pick(&self, rng: &mut impl Rng) -> (&str, &str) {
        let (doc_id, rev_ids) = &self.docs[rng.gen_range(0..self.docs.len())];
        let rev_id = &rev_ids[rng.gen_range(0..rev_ids.len())];
        (doc_id, rev_id)
    }
}

#[derive(Debug, Default)]
struct WorkerReport {
    ops: u64,
    errors: u64,
}

fn run_worker(
    worker: usize,
    cache: &RevisionCache,
    source: &MemoryDocumentSource,
    workload: &Workload,
    ops: usize,
) -> WorkerReport {
    let mut rng = rand::thread_rng();
    let mut report = WorkerReport::default();

    for op in 0..ops {
        let (doc_id, rev_id) = workload.pick(&mut rng);
        let result = match rng.gen_range(0..100) {
            0..60 => cache.get(doc_id, rev_id).map(drop),
            60..75 => cache.get_cached(doc_id, rev_id).map(drop),
            75..85 => cache.get_active(doc_id, source as &dyn DocumentSource).map(drop),
            85..95 => cache.update_delta(
                doc_id,
                rev_id,
                format!("bench-{worker}-{op}"),
                Bytes::from(vec![0u8; 64]),
            ),
            _ => {
                let mut body = Body::new();
                body.insert("worker".into(), json!(worker));
                let rev_id = format!("1-bench{worker}x{op}");
                cache.put(
                    doc_id,
                    DocumentRevision::new(rev_id, body, Revisions::default()),
                )
            }
        };

        report.ops += 1;
        if let Err(e) = result {
            report.errors += 1;
            warn!(worker, doc_id, rev_id, error = %e, "operation failed");
        }
    }

    report
}

fn load_config(path: &str) -> Result<Config> {
    if Path::new(path).exists() {
        Config::load(path).with_context(|| format!("failed to load config file {path}"))
    } else {
        Ok(Config::default())
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load config file if it exists; CLI takes precedence
    let config = load_config(&args.config)?;
    let capacity = args.capacity.unwrap_or(config.cache.capacity);
    let log_level = args.log_level.clone().unwrap_or(config.logging.level.clone());

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting revision cache bench");
    info!("Config file: {}", args.config);

    let prometheus = if args.prometheus {
        Some(
            PrometheusBuilder::new()
                .install_recorder()
                .context("failed to install Prometheus recorder")?,
        )
    } else {
        None
    };

    let source = Arc::new(MemoryDocumentSource::new());
    let started = Instant::now();
    let workload = Arc::new(Workload::seed(&source, args.docs, args.revs_per_doc)?);
    info!(
        "Seeded {} documents x {} revisions in {:?}",
        workload.docs.len(),
        args.revs_per_doc.max(1),
        started.elapsed()
    );

    let stats = Arc::new(BenchStats {
        local: CacheStats::new(),
        exported: config
            .stats
            .enabled
            .then(|| MetricsStatsRecorder::from_config(&config.stats)),
    });
    let cache = Arc::new(RevisionCache::new(
        capacity,
        Some(source.clone() as Arc<dyn RevisionLoader>),
        Some(stats.clone() as Arc<dyn StatsRecorder>),
    ));

    info!(
        "Running {} threads x {} ops against capacity {}",
        args.threads,
        args.ops_per_thread,
        cache.capacity()
    );
    let started = Instant::now();
    let handles: Vec<_> = (0..args.threads.max(1))
        .map(|worker| {
            let cache = Arc::clone(&cache);
            let source = Arc::clone(&source);
            let workload = Arc::clone(&workload);
            let ops = args.ops_per_thread;
            thread::spawn(move || run_worker(worker, &cache, &source, &workload, ops))
        })
        .collect();

    let mut total = WorkerReport::default();
    for handle in handles {
        let report = handle
            .join()
            .map_err(|_| anyhow::anyhow!("worker thread panicked"))?;
        total.ops += report.ops;
        total.errors += report.errors;
    }
    let elapsed = started.elapsed();

    info!("============================================");
    info!("Operations:      {} ({} errors)", total.ops, total.errors);
    info!("Elapsed:         {:?}", elapsed);
    info!(
        "Throughput:      {:.0} ops/s",
        total.ops as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );
    info!(
        "Hits / misses:   {} / {} (hit ratio {:.3})",
        stats.local.hits(),
        stats.local.misses(),
        stats.local.hit_ratio()
    );
    info!("Loader calls:    {}", source.revision_loads());
    info!("Document fetches: {}", source.document_fetches());
    info!("Resident:        {} / {}", cache.len(), cache.capacity());
    info!("============================================");

    if let Some(handle) = prometheus {
        println!("{}", handle.render());
    }

    Ok(())
}
