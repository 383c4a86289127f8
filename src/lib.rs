//! quick local file server
#![forbid(unsafe_code)]
#![deny(
    // missing_docs,
    future_incompatible,
    rustdoc::all,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::enum_glob_use)]

use args::Args;
use clap::Parser;
use server::Server;
use signal::Signals;
use tokio_util::sync::CancellationToken;

/// implements clap
pub mod args;

pub mod error;

/// tracing setup
pub mod logging;

/// the http host
pub mod server;

/// server end signal
pub mod signal;

pub use error::{ArgError, Error};

pub async fn run() -> miette::Result<()> {
    miette::set_panic_hook();
    let args = Args::parse();
    logging::init(args.log_level);

    let config = args.config()?;
    tracing::debug!(?config, "resolved arguments");

    let console = args
        .console
        .then(|| format!("http://127.0.0.1:{}/", config.port));
    if console.is_some() {
        println!("enter h for help");
    }

    let signals = Signals::install().map_err(Error::Signal)?;
    let token = CancellationToken::new();
    let server = Server::new(config);
    let signal = tokio::spawn(signal::shutdown_signal(signals, token.clone(), console));

    let res = server.run(token.clone()).await;
    // stops the signal task when the server exits on its own
    token.cancel();
    if let Err(e) = signal.await {
        tracing::error!(error = %e, "shutdown signal task failed");
    }

    res?;
    Ok(())
}
