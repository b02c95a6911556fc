use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use wa::Gateway;
use wa_runtime::{BridgeEngine, FileCredentialStore};

use crate::cli::ServeArgs;
use crate::config::ServerConfig;
use crate::error::Result;
use crate::server;

pub(crate) async fn run(mut config: ServerConfig, args: ServeArgs) -> Result<()> {
	config.apply_port_override(std::env::var("PORT").ok().as_deref())?;
	config.apply_args(&args);

	let gateway = Gateway::builder(Arc::new(BridgeEngine::new(config.bridge_url.clone())), Arc::new(FileCredentialStore::new()))
		.with_session_root(config.session_root.clone())
		.with_timings(config.timings())
		.build();

	let addr = config.bind_addr();
	let listener = tokio::net::TcpListener::bind(&addr)
		.await
		.with_context(|| format!("failed to bind {addr}"))?;

	info!(
		target = "wa.http",
		addr = %addr,
		bridge = %config.bridge_url,
		session_root = %config.session_root.display(),
		"server listening"
	);

	axum::serve(listener, server::router(gateway))
		.with_graceful_shutdown(shutdown_signal())
		.await
		.context("server error")?;

	info!(target = "wa.http", "server stopped");
	Ok(())
}

async fn shutdown_signal() {
	let _ = tokio::signal::ctrl_c().await;
}
