// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prometheus metrics (§6). Registered once at startup; exposing them for
//! scraping is out of scope, but the registry and its collectors are real.

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

pub struct Metrics {
    pub registry: Registry,
    pub execution_discrepancy_detected_count: IntCounterVec,
    pub aborted_batch_count: IntCounterVec,
    pub storage_commit_latency: HistogramVec,
    pub batch_read_time: HistogramVec,
    pub batch_processing_time: HistogramVec,
    pub batch_runtime_processing_time: HistogramVec,
    pub batch_size: HistogramVec,
}

impl Metrics {
    /// Construct and register every collector. Fails only if prometheus
    /// rejects one of the (fixed, compile-time-known) metric names, which
    /// would indicate a programmer error in this function.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let execution_discrepancy_detected_count = IntCounterVec::new(
            Opts::new(
                "oasis_worker_execution_discrepancy_detected_count",
                "Number of execution discrepancies detected",
            ),
            &["runtime"],
        )?;
        let aborted_batch_count = IntCounterVec::new(
            Opts::new("oasis_worker_aborted_batch_count", "Number of aborted batches"),
            &["runtime"],
        )?;
        let storage_commit_latency = HistogramVec::new(
            HistogramOpts::new(
                "oasis_worker_storage_commit_latency",
                "Latency of storage apply_batch calls, in seconds",
            ),
            &["runtime"],
        )?;
        let batch_read_time = HistogramVec::new(
            HistogramOpts::new("oasis_worker_batch_read_time", "Time spent fetching a batch's inputs, in seconds"),
            &["runtime"],
        )?;
        let batch_processing_time = HistogramVec::new(
            HistogramOpts::new(
                "oasis_worker_batch_processing_time",
                "End-to-end batch processing time, in seconds",
            ),
            &["runtime"],
        )?;
        let batch_runtime_processing_time = HistogramVec::new(
            HistogramOpts::new(
                "oasis_worker_batch_runtime_processing_time",
                "Time the sandboxed runtime spent executing a batch, in seconds",
            ),
            &["runtime"],
        )?;
        let batch_size = HistogramVec::new(
            HistogramOpts::new("oasis_worker_batch_size", "Number of transactions per batch"),
            &["runtime"],
        )?;

        registry.register(Box::new(execution_discrepancy_detected_count.clone()))?;
        registry.register(Box::new(aborted_batch_count.clone()))?;
        registry.register(Box::new(storage_commit_latency.clone()))?;
        registry.register(Box::new(batch_read_time.clone()))?;
        registry.register(Box::new(batch_processing_time.clone()))?;
        registry.register(Box::new(batch_runtime_processing_time.clone()))?;
        registry.register(Box::new(batch_size.clone()))?;

        Ok(Self {
            registry,
            execution_discrepancy_detected_count,
            aborted_batch_count,
            storage_commit_latency,
            batch_read_time,
            batch_processing_time,
            batch_runtime_processing_time,
            batch_size,
        })
    }
}
