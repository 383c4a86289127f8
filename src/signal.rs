use std::{future::pending, io};

use easy_sgr::{Color::*, Style::*};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Process signals that end the server
///
/// Handlers are registered by [`Signals::install`], so a signal that
/// arrives before anything waits on it is still seen.
#[derive(Debug)]
pub struct Signals {
    #[cfg(unix)]
    interrupt: signal::unix::Signal,
    #[cfg(unix)]
    terminate: signal::unix::Signal,
    #[cfg(windows)]
    ctrl_c: signal::windows::CtrlC,
}

impl Signals {
    #[cfg(unix)]
    pub fn install() -> io::Result<Self> {
        use signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(windows)]
    pub fn install() -> io::Result<Self> {
        Ok(Self {
            ctrl_c: signal::windows::ctrl_c()?,
        })
    }

    /// Waits for the next signal and names it
    #[cfg(unix)]
    #[allow(clippy::redundant_pub_crate)]
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "Ctrl-C",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }

    #[cfg(windows)]
    async fn recv(&mut self) -> &'static str {
        self.ctrl_c.recv().await;
        "Ctrl-C"
    }
}

/// Cancels `token` once a shutdown is requested
///
/// Listens for `signals` and, when `console` holds the url being served,
/// for `q` on the console. Returns early, without cancelling, if the token
/// is cancelled elsewhere.
pub async fn shutdown_signal(
    mut signals: Signals,
    token: CancellationToken,
    console: Option<String>,
) {
    let console = async {
        let Some(url) = console else {
            return pending::<()>().await;
        };
        match read_console(&url).await {
            Ok(true) => (),
            Ok(false) => pending::<()>().await,
            Err(e) => {
                tracing::warn!(error = %e, "console stopped");
                pending::<()>().await;
            }
        }
    };

    #[allow(clippy::redundant_pub_crate)]
    let trigger = tokio::select! {
        trigger = signals.recv() => trigger,
        () = console => "Console exit",
        () = token.cancelled() => return,
    };

    println!("{BlueFg}{trigger} received, shutdown commencing{Reset}");
    tracing::info!(trigger, "shutdown requested");
    token.cancel();
}

/// Reads console
///
/// Returns `true` once the quit command is received, `false` at end of input.
async fn read_console(url: &str) -> io::Result<bool> {
    let stdin = async_std::io::stdin();
    let mut buf = String::new();
    loop {
        buf.clear();
        if stdin.read_line(&mut buf).await? == 0 {
            return Ok(false);
        }
        if handle_console_input(url, buf.trim()) {
            return Ok(true);
        }
    }
}

/// returns true if program should stop
pub fn handle_console_input(url: &str, s: &str) -> bool {
    match s {
        "h" => println!(
            "\
            enter {BlueFg}h{Reset} to show help (this text)\n\
            enter {BlueFg}o{Reset} to open the served directory in a browser\n\
            enter {BlueFg}u{Reset} to show server url\n\
            enter {BlueFg}c{Reset} clear screen\n\
            enter {BlueFg}q{Reset} to quit\
            "
        ),
        "o" => {
            if webbrowser::open(url).is_ok() {
                println!("{GreenFg}Opening browser...{Reset}");
            } else {
                println!("{YellowFg}Unable to open browser{Reset}");
            }
        }
        "c" => scroll(),
        "u" => println!("{BlueFg}{url}{Reset}"),
        "q" => return true,
        "" => (),
        s => println!("{YellowFg}Unknown input: \"{s}\"{Reset}"),
    }
    false
}

pub(crate) fn scroll() {
    print!("\x1B[2J\x1B[1;1H");
    let _ = std::io::Write::flush(&mut std::io::stdout());
}
