use std::{
    env, io,
    path::{Path, PathBuf},
    time::Duration,
};

use clap::Parser;
use tracing_subscriber::filter::LevelFilter;

use crate::{
    error::{ArgError, Error, Result},
    server::Config,
};

pub const DEFAULT_PORT: u16 = 12_000;

/// serve a directory over http on localhost
#[derive(Parser, Debug)]
#[command(name = "qlfs", version, about)]
pub struct Args {
    /// The port to listen on, above 1023
    #[arg(short = 'p', long, value_name = "PORT", default_value_t = DEFAULT_PORT, value_parser = parse_port)]
    pub port: u16,
    /// The directory to serve, defaults to the executable's directory
    #[arg(short = 'd', long, value_name = "DIR")]
    pub directory: Option<PathBuf>,
    /// Minimum level of log output, overridden by RUST_LOG
    #[arg(short, long, value_name = "LEVEL", default_value_t = LevelFilter::WARN)]
    pub log_level: LevelFilter,
    /// Seconds in-flight requests get to finish on shutdown
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    pub grace: u64,
    /// Read commands from stdin while serving
    #[arg(long)]
    pub console: bool,
}

impl Args {
    /// Validates the directory and builds the server config
    pub fn config(&self) -> Result<Config> {
        Ok(Config {
            port: self.port,
            root: resolve_directory(self.directory.as_deref())?,
            grace: Duration::from_secs(self.grace),
        })
    }
}

pub fn parse_port(s: &str) -> std::result::Result<u16, ArgError> {
    let port: i32 = s
        .trim()
        .parse()
        .map_err(|_| ArgError::NotAnInteger(s.to_owned()))?;

    match u16::try_from(port) {
        Ok(port) if port > 1023 => Ok(port),
        _ => Err(ArgError::OutOfRange(port)),
    }
}

/// Resolves `-d` to an absolute, existing directory
///
/// With no argument the executable's own directory is used.
pub fn resolve_directory(dir: Option<&Path>) -> Result<PathBuf> {
    let path = match dir {
        Some(dir) => {
            let dir = expand_home(dir);
            std::path::absolute(&dir).map_err(|_| Error::DirectoryNotFound(dir))?
        }
        None => executable_dir()?,
    };

    if !path.is_dir() {
        return Err(Error::DirectoryNotFound(path));
    }
    Ok(path)
}

/// Replaces a leading `~` component with the home directory
#[must_use]
pub fn expand_home(path: &Path) -> PathBuf {
    expand_home_with(path, home_dir())
}

fn expand_home_with(path: &Path, home: Option<PathBuf>) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_owned();
    };
    let Some(home) = home else {
        return path.to_owned();
    };

    if rest.as_os_str().is_empty() {
        home
    } else {
        home.join(rest)
    }
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
}

fn executable_dir() -> Result<PathBuf> {
    let exe = env::current_exe().map_err(Error::NoExecutableDirectory)?;
    exe.parent().map(Path::to_path_buf).ok_or_else(|| {
        Error::NoExecutableDirectory(io::Error::new(
            io::ErrorKind::NotFound,
            "executable has no parent directory",
        ))
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn port_default() {
        let args = Args::try_parse_from(["qlfs"]).unwrap();
        assert_eq!(args.port, 12_000);
        assert!(args.directory.is_none());
        assert_eq!(args.log_level, LevelFilter::WARN);
    }

    #[test]
    fn port_bounds() {
        assert_eq!(parse_port("1024"), Ok(1024));
        assert_eq!(parse_port("65535"), Ok(65535));
        assert_eq!(parse_port(" 8080 "), Ok(8080));
        assert_eq!(parse_port("1023"), Err(ArgError::OutOfRange(1023)));
        assert_eq!(parse_port("65536"), Err(ArgError::OutOfRange(65536)));
        assert_eq!(parse_port("-1"), Err(ArgError::OutOfRange(-1)));
        assert_eq!(parse_port("0"), Err(ArgError::OutOfRange(0)));
    }

    #[test]
    fn port_not_integer() {
        assert_eq!(
            parse_port("http"),
            Err(ArgError::NotAnInteger("http".into()))
        );
        assert_eq!(
            parse_port("12.5"),
            Err(ArgError::NotAnInteger("12.5".into()))
        );
        assert_eq!(
            parse_port("99999999999"),
            Err(ArgError::NotAnInteger("99999999999".into()))
        );
    }

    #[test]
    fn port_error_messages() {
        assert_eq!(
            ArgError::NotAnInteger("abc".into()).to_string(),
            "not an integer ('abc')"
        );
        assert_eq!(
            ArgError::OutOfRange(80).to_string(),
            "invalid port number ('80')"
        );
    }

    #[test]
    fn bad_port_is_usage_error() {
        for bad in ["80", "65536", "abc", ""] {
            let err = Args::try_parse_from(["qlfs", "-p", bad]).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        }
    }

    #[test]
    fn flags() {
        let args = Args::try_parse_from([
            "qlfs", "-p", "12345", "-d", "/tmp/www", "-l", "debug", "--console",
        ])
        .unwrap();
        assert_eq!(args.port, 12345);
        assert_eq!(args.directory.as_deref(), Some(Path::new("/tmp/www")));
        assert_eq!(args.log_level, LevelFilter::DEBUG);
        assert!(args.console);
    }

    #[test]
    fn directory_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_directory(Some(dir.path())).unwrap();
        assert_eq!(resolved, dir.path());
    }

    #[test]
    fn directory_relative() {
        let resolved = resolve_directory(Some(Path::new("src"))).unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("src"));
    }

    #[test]
    fn directory_missing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        match resolve_directory(Some(&missing)) {
            Err(Error::DirectoryNotFound(path)) => assert_eq!(path, missing),
            other => panic!("expected DirectoryNotFound, got {other:?}"),
        }
    }

    #[test]
    fn directory_is_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            resolve_directory(Some(file.path())),
            Err(Error::DirectoryNotFound(_))
        ));
    }

    #[test]
    fn directory_default_is_executable_dir() {
        let exe = env::current_exe().unwrap();
        let resolved = resolve_directory(None).unwrap();
        assert_eq!(Some(resolved.as_path()), exe.parent());
    }

    #[test]
    fn tilde() {
        let home = PathBuf::from("/home/someone");
        let expand = |p: &str| expand_home_with(Path::new(p), Some(home.clone()));
        assert_eq!(expand("~"), home);
        assert_eq!(expand("~/www"), home.join("www"));
        assert_eq!(expand("~www"), Path::new("~www"));
        assert_eq!(expand("/a/~/b"), Path::new("/a/~/b"));
    }

    #[test]
    fn tilde_without_home() {
        assert_eq!(expand_home_with(Path::new("~"), None), Path::new("~"));
        assert_eq!(
            expand_home_with(Path::new("~/www"), None),
            Path::new("~/www")
        );
    }

    #[test]
    fn tilde_uses_environment() {
        assert_eq!(
            expand_home(Path::new("~/www")),
            expand_home_with(Path::new("~/www"), home_dir())
        );
    }

    #[test]
    fn config() {
        let dir = tempfile::tempdir().unwrap();
        let dir_arg = dir.path().to_str().unwrap();
        let args =
            Args::try_parse_from(["qlfs", "-p", "4000", "-d", dir_arg, "--grace", "3"]).unwrap();
        let config = args.config().unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.root, dir.path());
        assert_eq!(config.grace, Duration::from_secs(3));
    }
}
