//! smartctx binary — parses CLI args, loads `.smartctx.toml`, performs the
//! initial scan, starts the watcher, and serves the Search/Edit HTTP API
//! and the MCP transport (stdio or streamable HTTP). Auto-scans a port
//! range, shuts down gracefully on SIGINT/SIGTERM, and prints a
//! machine-readable `SMARTCTX_PORT=<port>` startup line.

use clap::{CommandFactory, Parser};
use smartctx_cli::{Cli, Commands};
use smartctx_core::edit::{EditCoordinator, EditResolver, Editor, History};
use smartctx_core::indexer::InvalidationEvent;
use smartctx_core::ucg::UnifiedContextGraph;
use smartctx_core::{Config, Indexer, RealFs};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[cfg(feature = "semantic")]
use smartctx_core::vector::{FastEmbedProvider, VectorIndexManager};

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received SIGINT, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for Ctrl+C");
        info!("Received Ctrl+C, shutting down...");
    }
}

fn resolve_root(cli: &Cli) -> PathBuf {
    if let Some(spec) = cli.repos.first() {
        if cli.repos.len() > 1 {
            warn!("multiple --repo flags given; smartctx indexes a single workspace root, using the first");
        }
        let path = spec.split_once('=').map(|(_, p)| p).unwrap_or(spec.as_str());
        return PathBuf::from(path).canonicalize().unwrap_or_else(|e| {
            error!(path = path, error = %e, "repository path not found");
            std::process::exit(1);
        });
    }

    if let Some(config_path) = &cli.config {
        warn!(path = %config_path.display(), "--config is accepted for compatibility but multi-repo config files are not indexed; pass --root instead");
    }

    let root = cli.root.clone().unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| {
        error!("could not determine current directory. Use --root <path>");
        std::process::exit(1);
    }));

    root.canonicalize().unwrap_or_else(|e| {
        error!(path = %root.display(), error = %e, "project root not found");
        std::process::exit(1);
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("smartctx=info".parse().unwrap()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Some(command) = &cli.command {
        let code = match command {
            Commands::Init { path, global: _, semantic: _ } => smartctx_server::init::run_init(path.as_deref()),
            Commands::Doctor { path } => smartctx_server::init::run_doctor(path.as_deref()),
            Commands::Completions { shell } => {
                clap_complete::generate(*shell, &mut Cli::command(), "smartctx", &mut std::io::stdout());
                0
            }
        };
        std::process::exit(code);
    }

    let root = resolve_root(&cli);
    let config = Config::load(&root);
    info!(root = %root.display(), "Loaded configuration");

    let fs = Arc::new(RealFs);
    let indexer = Arc::new(Indexer::new(root.clone(), config.clone(), fs.clone()));

    let scanned = indexer.run_initial_scan().unwrap_or_else(|e| {
        error!(error = %e.message, "Initial scan failed");
        std::process::exit(1);
    });
    info!(files = scanned, "Initial scan complete");

    if let Err(e) = indexer.start_watcher() {
        warn!(error = %e.message, "Failed to start file watcher — live re-indexing disabled");
    }

    let ucg = Arc::new(UnifiedContextGraph::new(config.max_nodes, Config::ucg_checkpoint_path(&root), fs.clone()));
    ucg.reload();

    let ucg_for_task = ucg.clone();
    let mut invalidation_rx = indexer.subscribe();
    tokio::spawn(async move {
        loop {
            match invalidation_rx.recv().await {
                Ok(InvalidationEvent::Updated(path)) => {
                    ucg_for_task.invalidate(&path, true);
                    let _ = ucg_for_task.maybe_checkpoint();
                }
                Ok(InvalidationEvent::Removed(path)) => {
                    ucg_for_task.remove_node(&path);
                    let _ = ucg_for_task.maybe_checkpoint();
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let store_for_ghosts = indexer.store();
    let ghost_retention_secs = config.ghost_retention_secs;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            store_for_ghosts.evict_expired_ghosts(ghost_retention_secs as i64);
        }
    });

    #[cfg(feature = "semantic")]
    let vector = if cli.no_semantic {
        None
    } else {
        match FastEmbedProvider::try_new() {
            Ok(provider) => Some(Arc::new(VectorIndexManager::new(
                config.vector_index.mode,
                config.vector_index.rebuild,
                Box::new(provider),
            ))),
            Err(e) => {
                warn!(error = %e.message, "Failed to initialize embedding model — semantic search disabled");
                None
            }
        }
    };
    #[cfg(not(feature = "semantic"))]
    let vector: Option<Arc<smartctx_core::vector::VectorIndexManager>> = {
        if !cli.no_semantic {
            warn!("--no-semantic has no effect: this binary was not built with the `semantic` feature");
        }
        None
    };

    let resolver = EditResolver::new(config.levenshtein_max_file_size, config.levenshtein_min_target_len);
    let editor = Editor::new(fs.clone(), Config::backups_dir(&root), config.backups_per_file);
    let history = History::new(fs.clone(), Config::history_dir(&root).join("transactions.json"), config.undo_depth);
    let edit = Arc::new(EditCoordinator::new(fs.clone(), root.clone(), resolver, editor, history));

    let file_sizes = Arc::new(std::sync::RwLock::new(std::collections::HashMap::new()));

    let http_state = smartctx_http::ApiState {
        store: indexer.store(),
        trigram: indexer.trigram(),
        vector: vector.clone(),
        file_sizes: file_sizes.clone(),
        edit: edit.clone(),
    };

    let mcp_state = smartctx_mcp::McpState {
        store: indexer.store(),
        trigram: indexer.trigram(),
        vector: vector.clone(),
        file_sizes: file_sizes.clone(),
        edit: edit.clone(),
    };

    if cli.mcp {
        info!("Running MCP stdio transport");
        if let Err(e) = smartctx_mcp::stdio::run_mcp(&mcp_state) {
            error!(error = %e, "MCP stdio transport terminated with an error");
            std::process::exit(1);
        }
        return;
    }

    let bind_addr = if cli.bind_all { "0.0.0.0" } else { "127.0.0.1" };
    let explicit_port: Option<u16> = std::env::var("PORT").ok().and_then(|p| p.parse().ok());

    let listener = if let Some(port) = explicit_port {
        tokio::net::TcpListener::bind(format!("{bind_addr}:{port}")).await.unwrap_or_else(|e| {
            error!(port = port, error = %e, "Could not bind to port");
            std::process::exit(1);
        })
    } else {
        const BASE: u16 = 8432;
        const RANGE: u16 = 10;
        let mut found = None;
        for port in BASE..BASE + RANGE {
            if let Ok(l) = tokio::net::TcpListener::bind(format!("{bind_addr}:{port}")).await {
                found = Some(l);
                break;
            }
        }
        found.unwrap_or_else(|| {
            error!(range_start = BASE, range_end = BASE + RANGE - 1, "No free port found");
            eprintln!("  Try: PORT=<port> smartctx");
            std::process::exit(1);
        })
    };

    let port = listener.local_addr().unwrap().port();

    let cli_allowed_origins: Option<Vec<String>> =
        cli.allowed_origins.map(|s| s.split(',').map(|o| o.trim().to_string()).collect());
    let allowed_origins = cli_allowed_origins.unwrap_or_else(|| {
        vec![
            format!("http://localhost:{port}"),
            format!("http://127.0.0.1:{port}"),
            "http://localhost".to_string(),
            "http://127.0.0.1".to_string(),
            "null".to_string(),
        ]
    });

    let mcp_http_state = smartctx_mcp::http::McpHttpState::new(
        mcp_state,
        smartctx_mcp::http::McpHttpConfig {
            server_url: format!("http://{bind_addr}:{port}"),
            allowed_origins,
            auth_issuer: cli.auth_issuer,
        },
    );

    let app = smartctx_http::router(http_state)
        .merge(smartctx_mcp::http::router(mcp_http_state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive());

    info!("MCP HTTP transport at /mcp");
    info!(port = port, "http://{bind_addr}:{port}");
    eprintln!("SMARTCTX_PORT={port}");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await.unwrap();

    indexer.stop();
}
