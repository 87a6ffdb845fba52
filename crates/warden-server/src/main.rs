// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Warden server binary.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warden_aws::SdkCloud;
use warden_server::{create_app_state, create_router};

/// Warden server - federated sign-in and cloud credentials.
#[derive(Parser, Debug)]
#[command(name = "warden-server", about = "Warden credential broker", version)]
struct Args {
	/// TOML configuration file.
	#[arg(long, env = "WARDEN_SERVER_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version information
	Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("warden-server version: {}", env!("CARGO_PKG_VERSION"));
		return Ok(());
	}

	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => warden_server_config::load_config_with_file(path)?,
		None => warden_server_config::load_config()?,
	};

	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| config.logging.level.clone().into()),
		)
		.with(tracing_subscriber::fmt::layer())
		.init();

	tracing::info!(
		host = %config.http.host,
		port = config.http.port,
		idp = %config.oidc.idp,
		"starting warden-server"
	);

	let cloud = Arc::new(SdkCloud::load(config.aws.region.clone()).await);
	let state = create_app_state(&config, cloud.clone(), cloud)?;
	let app = create_router(state).layer(TraceLayer::new_for_http());

	let addr = config.socket_addr();
	tracing::info!("listening on {}", addr);
	let listener = tokio::net::TcpListener::bind(&addr).await?;

	tokio::select! {
		result = axum::serve(listener, app) => {
			if let Err(e) = result {
				tracing::error!(error = %e, "Server error");
			}
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("Received shutdown signal");
		}
	}

	tracing::info!("Server shutdown complete");
	Ok(())
}
