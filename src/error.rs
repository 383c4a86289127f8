use std::{io, net::SocketAddr, path::PathBuf};

use miette::Diagnostic;
use thiserror::Error;

/// Rejected `-p` values
#[derive(Error, Diagnostic, Debug, PartialEq, Eq)]
pub enum ArgError {
    #[error("not an integer ('{0}')")]
    #[diagnostic(code(qlfs::args::port))]
    NotAnInteger(String),

    #[error("invalid port number ('{0}')")]
    #[diagnostic(
        code(qlfs::args::port),
        help("ports must be between 1024 and 65535")
    )]
    OutOfRange(i32),
}

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("directory not found: {}", .0.display())]
    #[diagnostic(code(qlfs::args::directory))]
    DirectoryNotFound(PathBuf),

    #[error("could not locate the executable's directory")]
    #[diagnostic(
        code(qlfs::args::directory),
        help("pass a directory explicitly with -d")
    )]
    NoExecutableDirectory(#[source] io::Error),

    #[error("failed to bind {addr}")]
    #[diagnostic(code(qlfs::server::bind), help("is another server using this port?"))]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to install signal handlers")]
    #[diagnostic(code(qlfs::signal))]
    Signal(#[source] io::Error),

    #[error("server error")]
    #[diagnostic(code(qlfs::server::serve))]
    Serve(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
