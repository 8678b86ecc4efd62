mod api;
mod trace;

#[cfg(test)]
mod tests;

use std::net::SocketAddr;

use anyhow::Context;
use libtally::prelude::*;
use rustls::crypto::aws_lc_rs;
use tokio::signal;

use crate::api::config::Config;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  aws_lc_rs::default_provider()
    .install_default()
    .map_err(|_| anyhow::anyhow!("could not install default cryptography provider"))?;

  let config = Config::from_env()?;
  let _guards = trace::init_tracing(&config, std::io::stdout());

  match (&config.record_store_url, &config.documents_path) {
    (Some(url), _) => {
      let store = HttpStore::new(url)?;

      run(config, store).await
    }

    (None, Some(path)) => {
      let store = MemoryStore::from_path(path)?;

      run(config, store).await
    }

    (None, None) => run(config, MemoryStore::default()).await,
  }
}

async fn run<S: DocumentStore>(config: Config, store: S) -> anyhow::Result<()> {
  let app = api::routes(&config, store)?;
  let listener = tokio::net::TcpListener::bind(&config.listen_addr).await.context("could not create listener")?;

  tracing::info!(tally = env!("CARGO_PKG_VERSION"), "listening on {}", listener.local_addr()?.to_string());

  axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
    .with_graceful_shutdown(shutdown())
    .await
    .context("could not start app")?;

  Ok(())
}

async fn shutdown() {
  let ctrl_c = async {
    signal::ctrl_c().await.expect("failed to install ^C handler");
  };

  let terminate = async {
    signal::unix::signal(signal::unix::SignalKind::terminate())
      .expect("failed to install terminate signal handler")
      .recv()
      .await;
  };

  tokio::select! {
      () = ctrl_c => tracing::info!("received ^C, initiating shutdown"),
      () = terminate => tracing::info!("received terminate signal, initiating shutdown"),
  }
}
