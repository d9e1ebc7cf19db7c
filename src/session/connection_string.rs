//! Connection string parsing
//!
//! Supports formats:
//! * docdb://[user[:password]@][host][:port][/database][?params]
//! * docdb:///database (Unix socket, default directory)
//! * docdb:///database?host=/path/to/dir (Unix socket, custom directory)

use crate::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// URL scheme accepted by [`ConnectionInfo::parse`]
pub const SCHEME: &str = "docdb://";

/// Default server port
pub const DEFAULT_PORT: u16 = 27017;

/// Parsed connection info
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Transport type
    pub transport: TransportType,
    /// Host (for TCP)
    pub host: Option<String>,
    /// Port
    pub port: u16,
    /// Unix socket path
    pub unix_socket: Option<PathBuf>,
    /// Database name
    pub database: String,
    /// Username
    pub user: String,
    /// Password
    pub password: Option<String>,
    /// Query parameters, including the ones consumed by [`PoolConfig`](super::PoolConfig)
    pub params: HashMap<String, String>,
}

/// Transport type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportType {
    /// TCP socket
    Tcp,
    /// Unix domain socket
    Unix,
}

/// Resolve the default Unix socket directory
fn resolve_default_socket_dir() -> Option<String> {
    for dir in &["/run/docdb", "/var/run/docdb", "/tmp"] {
        if Path::new(dir).is_dir() {
            return Some(dir.to_string());
        }
    }
    None
}

/// Split `key=value&...` into a map; later keys win
fn parse_query_params(query_string: &str) -> HashMap<String, String> {
    query_string
        .trim_start_matches('?')
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

/// Construct the full Unix socket path
fn construct_socket_path(socket_dir: &str, port: u16) -> PathBuf {
    PathBuf::from(format!("{}/docdb-{}.sock", socket_dir, port))
}

fn parse_port(value: &str) -> Result<u16> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("invalid port '{}'", value)))
}

impl ConnectionInfo {
    /// Parse connection string
    pub fn parse(s: &str) -> Result<Self> {
        let rest = s.strip_prefix(SCHEME).ok_or_else(|| {
            Error::Config(format!("connection string must start with {}", SCHEME))
        })?;

        if rest.starts_with('/') {
            return Self::parse_unix(rest);
        }

        Self::parse_tcp(rest)
    }

    fn parse_unix(rest: &str) -> Result<Self> {
        let (path, query_string) = rest.split_once('?').unwrap_or((rest, ""));
        let mut params = parse_query_params(query_string);

        let path = path.trim_start_matches('/');
        let database = if path.is_empty() {
            whoami::username()
        } else {
            path.to_string()
        };

        let port = match params.remove("port") {
            Some(port) => parse_port(&port)?,
            None => DEFAULT_PORT,
        };

        let socket_dir = match params.remove("host") {
            Some(dir) => dir,
            None => resolve_default_socket_dir().ok_or_else(|| {
                Error::Config(
                    "could not locate Unix socket directory. Set host query parameter explicitly."
                        .into(),
                )
            })?,
        };

        Ok(Self {
            transport: TransportType::Unix,
            host: None,
            port,
            unix_socket: Some(construct_socket_path(&socket_dir, port)),
            database,
            user: whoami::username(),
            password: None,
            params,
        })
    }

    fn parse_tcp(rest: &str) -> Result<Self> {
        // [user[:password]@]host[:port][/database][?params]
        let (auth, rest) = match rest.split_once('@') {
            Some((auth, rest)) => (Some(auth), rest),
            None => (None, rest),
        };

        let (user, password) = match auth {
            Some(auth) => match auth.split_once(':') {
                Some((user, pass)) => (user.to_string(), Some(pass.to_string())),
                None => (auth.to_string(), None),
            },
            None => (whoami::username(), None),
        };

        let (rest, query_string) = rest.split_once('?').unwrap_or((rest, ""));
        let params = parse_query_params(query_string);

        let (host_port, database) = match rest.split_once('/') {
            Some((hp, db)) if !db.is_empty() => (hp, db.to_string()),
            Some((hp, _)) => (hp, whoami::username()),
            None => (rest, whoami::username()),
        };

        let (host, port) = match host_port.split_once(':') {
            Some((host, port)) => (host.to_string(), parse_port(port)?),
            None => (host_port.to_string(), DEFAULT_PORT),
        };

        if host.is_empty() {
            return Err(Error::Config("connection string has no host".into()));
        }

        Ok(Self {
            transport: TransportType::Tcp,
            host: Some(host),
            port,
            unix_socket: None,
            database,
            user,
            password,
            params,
        })
    }

    /// Render the connection without its password, for logs and errors
    pub fn descriptor(&self) -> String {
        match self.transport {
            TransportType::Tcp => format!(
                "{}{}@{}:{}/{}",
                SCHEME,
                self.user,
                self.host.as_deref().unwrap_or_default(),
                self.port,
                self.database
            ),
            TransportType::Unix => format!(
                "{}{}@unix:{}/{}",
                SCHEME,
                self.user,
                self.unix_socket
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
                self.database
            ),
        }
    }

    /// Look up a query parameter
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}
