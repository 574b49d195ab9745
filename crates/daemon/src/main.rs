// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `executor-noded`: standalone binary for one executor committee node.
//!
//! Wires a `SandboxProvisioner`, the admission/commitment pipelines, and the
//! outer event loop together. The consensus/registry backend, the storage
//! backend, and peer gossip are out of scope for this crate; this binary
//! uses the in-memory `fake` collaborators (gated behind the default
//! `test-support` feature) in their place so the node is runnable on its own
//! against a sandboxed runtime.

mod admission;
mod commitment;
mod config;
mod epoch_source;
mod error;
mod event_loop;
mod metrics;
mod node;
#[cfg(test)]
mod property_tests;
mod state;
mod storage_client;

use clap::Parser;
use commitment::fake::FakeMergePublisher;
use config::Config;
use epoch_source::fake::ChannelEpochSource;
use event_loop::{CommitteeNode, Inbound};
use executor_core::test_support::{fresh_signer, snapshot_for};
use executor_core::{IdentitySigner, Namespace, Role, Signer};
use executor_process::{NoopHostInitializer, SandboxConfig, SandboxMode, SandboxProvisioner};
use metrics::Metrics;
use node::Node;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use storage_client::fake::FakeStorageClient;
use tokio::sync::mpsc;

/// CLI overrides for the environment-driven `Config` (§ ambient stack: the
/// `EXECUTOR_*` variables remain authoritative when a flag is omitted).
#[derive(Parser, Debug)]
#[command(name = "executor-noded", about = "Executor committee node")]
struct Args {
    /// Overrides EXECUTOR_IDENTITY_KEY.
    #[arg(long)]
    identity_key: Option<PathBuf>,

    /// Overrides EXECUTOR_RUNTIME_BINARY.
    #[arg(long)]
    runtime_binary: Option<PathBuf>,

    /// Overrides EXECUTOR_BUNDLE_VERSION.
    #[arg(long)]
    bundle_version: Option<String>,

    /// Overrides EXECUTOR_UNSANDBOXED (pass to run the runtime unsandboxed).
    #[arg(long)]
    unsandboxed: bool,

    /// Overrides EXECUTOR_FAULT_DETECTOR_TIMEOUT_MS.
    #[arg(long)]
    fault_detector_timeout_ms: Option<u64>,

    /// Label attached to every metric and log line for this runtime slot.
    #[arg(long, default_value = "default")]
    runtime_label: String,

    /// Minimum number of storage-committee signatures a dispatch must carry.
    #[arg(long, default_value_t = 1)]
    min_write_replication: usize,

    /// Additional read-only bind mounts for the sandboxed runtime (e.g. the
    /// runtime bundle directory).
    #[arg(long)]
    ro_bind: Vec<PathBuf>,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(args: &Args) -> Result<Config, config::ConfigError> {
    let mut config = Config::load()?;
    if let Some(path) = &args.identity_key {
        config.identity_key_path = path.clone();
    }
    if let Some(path) = &args.runtime_binary {
        config.runtime_binary = path.clone();
    }
    if let Some(version) = &args.bundle_version {
        config.bundle_version = version.clone();
    }
    if args.unsandboxed {
        config.sandboxed = false;
    }
    if let Some(ms) = args.fault_detector_timeout_ms {
        config.fault_detector_timeout = Duration::from_millis(ms);
    }
    Ok(config)
}

#[tokio::main]
async fn main() {
    init_tracing();
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let signer = match IdentitySigner::load(&config.identity_key_path) {
        Ok(signer) => Arc::new(signer),
        Err(e) => {
            tracing::error!(error = %e, path = ?config.identity_key_path, "failed to load identity key");
            std::process::exit(1);
        }
    };

    let metrics = match Metrics::new() {
        Ok(metrics) => Arc::new(metrics),
        Err(e) => {
            tracing::error!(error = %e, "failed to register metrics");
            std::process::exit(1);
        }
    };

    let sandbox_config = SandboxConfig {
        mode: if config.sandboxed { SandboxMode::Sandboxed } else { SandboxMode::Unsandboxed },
        runtime_binary: config.runtime_binary.clone(),
        host_socket_path: PathBuf::new(),
        ro_binds: args.ro_bind.clone(),
    };
    let host_initializer = Arc::new(NoopHostInitializer { version: config.bundle_version.clone() });
    let sandbox = Arc::new(SandboxProvisioner::start(
        sandbox_config,
        args.runtime_label.clone(),
        config.bundle_version.clone(),
        host_initializer,
    ));

    // Storage, the merge committee, and epoch membership all come from
    // backends this crate does not implement (consensus, storage, gossip).
    // The `fake` collaborators stand in so the node can run end-to-end
    // locally; a real deployment replaces all three.
    let storage = Arc::new(FakeStorageClient::new(Box::new(fresh_signer())));
    let merge = Arc::new(FakeMergePublisher::new());
    let (epoch_tx, epoch_source) = ChannelEpochSource::new();

    let runtime_namespace = Namespace::zero();
    let bootstrap_snapshot =
        snapshot_for(signer.public_key(), Role::Worker, signer.public_key(), vec![]);
    if epoch_tx.send(bootstrap_snapshot).await.is_err() {
        tracing::error!("failed to prime the bootstrap epoch snapshot");
        std::process::exit(1);
    }

    let node = Node::new(runtime_namespace, args.runtime_label.clone(), args.min_write_replication);
    let committee_node = CommitteeNode::new(
        node,
        Arc::clone(&sandbox),
        storage,
        merge,
        signer,
        metrics,
        args.runtime_label.clone(),
        config.fault_detector_timeout,
    );

    // Peer gossip is out of scope: these channels are wired for a real
    // deployment's consensus/P2P layer to feed; left empty here.
    let (_dispatch_tx, dispatch_rx) = mpsc::channel(config.control_channel_capacity);
    let (_block_tx, block_rx) = mpsc::channel(config.control_channel_capacity);
    let (_event_tx, event_rx) = mpsc::channel(config.control_channel_capacity);
    let inbound = Inbound {
        dispatches: dispatch_rx,
        blocks: block_rx,
        events: event_rx,
        epoch_source: Box::new(epoch_source),
    };

    let run_handle = tokio::spawn(committee_node.clone().run(inbound));

    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "failed to listen for shutdown signal"),
    }
    committee_node.stop_token().cancel();
    sandbox.stop();
    let _ = run_handle.await;
}
