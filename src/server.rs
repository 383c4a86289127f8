use std::{
    net::{Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    time::Duration,
};

use axum::Router;
use easy_sgr::{Color::*, Style::*};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto::Builder,
    service::TowerToHyperService,
};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::watch,
    task::JoinSet,
    time::{sleep, timeout},
};
use tokio_util::sync::CancellationToken;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    /// Absolute path of the served directory
    pub root: PathBuf,
    /// Upper bound on draining in-flight requests
    pub grace: Duration,
}

/// Where a [`Server`] is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Created,
    Starting,
    Running(SocketAddr),
    ShuttingDown,
    Stopped,
}

#[derive(Debug)]
pub struct Server {
    config: Config,
    state: watch::Sender<State>,
}

/// Static files under `root`, nothing else
pub fn router(root: &Path) -> Router {
    Router::new()
        .fallback_service(ServeDir::new(root))
        .layer(TraceLayer::new_for_http())
}

/// One connection, told to finish its current response once `shutdown` fires
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    app: Router,
    shutdown: CancellationToken,
) {
    let builder = Builder::new(TokioExecutor::new());
    let conn =
        builder.serve_connection_with_upgrades(TokioIo::new(stream), TowerToHyperService::new(app));
    tokio::pin!(conn);

    #[allow(clippy::redundant_pub_crate)]
    let res = tokio::select! {
        res = conn.as_mut() => res,
        () = shutdown.cancelled() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };
    if let Err(e) = res {
        tracing::debug!(%peer, error = %e, "connection closed with error");
    }
}

fn log_join(res: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = res {
        if e.is_panic() {
            tracing::error!(error = %e, "connection task panicked");
        }
    }
}

impl Server {
    #[must_use]
    pub fn new(config: Config) -> Self {
        let (state, _) = watch::channel(State::Created);
        Self { config, state }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<State> {
        self.state.subscribe()
    }

    /// Serves until `shutdown` is cancelled
    ///
    /// Always leaves the state at [`State::Stopped`], including on bind failure.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let res = self.serve(shutdown).await;
        self.set(State::Stopped);
        res
    }

    #[allow(clippy::redundant_pub_crate)]
    async fn serve(&self, shutdown: CancellationToken) -> Result<()> {
        self.set(State::Starting);

        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, self.config.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;
        let local = listener.local_addr().map_err(Error::Serve)?;
        tracing::info!(%local, root = %self.config.root.display(), "listening");

        println!(
            "{GreenFg}serving from '{}' on port {}{Reset}",
            self.config.root.display(),
            local.port()
        );
        println!("{BlueFg}http://{local}/{Reset}");

        let app = router(&self.config.root);
        let mut conns = JoinSet::new();

        self.set(State::Running(local));

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        conns.spawn(serve_connection(stream, peer, app.clone(), shutdown.clone()));
                    }
                    Err(e) => {
                        // usually fd exhaustion, which clears once connections close
                        tracing::warn!(error = %e, "accept failed");
                        sleep(Duration::from_millis(100)).await;
                    }
                },
                Some(res) = conns.join_next(), if !conns.is_empty() => log_join(res),
                () = shutdown.cancelled() => break,
            }
        }

        drop(listener);
        self.set(State::ShuttingDown);
        tracing::info!(grace = ?self.config.grace, open = conns.len(), "draining connections");

        let drain = async {
            while let Some(res) = conns.join_next().await {
                log_join(res);
            }
        };
        if timeout(self.config.grace, drain).await.is_err() {
            tracing::warn!(
                grace = ?self.config.grace,
                open = conns.len(),
                "grace period elapsed, dropping remaining connections"
            );
            conns.shutdown().await;
        }

        println!("{GreenFg}Server Stopped{Reset}");
        Ok(())
    }

    fn set(&self, state: State) {
        tracing::debug!(?state, "server state");
        self.state.send_replace(state);
    }
}
