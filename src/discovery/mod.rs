//! Discovery of TLS virtual hosts in web server configuration directories.
//!
//! Each supported [`Dialect`] has a [`ConfigDialect`] implementation that turns
//! raw configuration text into [`Block`]s. The aggregator reads every regular
//! file directly under a dialect's root directory, folds blocks into
//! [`Server`] records and keeps those that reference a certificate.
//!
//! # Submodules
//!
//! - `apache` - `<VirtualHost>` tag-delimited configuration
//! - `nginx` - brace-delimited `server { }` configuration
//! - `brace` - generic brace-config parser used by `nginx`

pub mod apache;
pub mod brace;
pub mod nginx;

use std::fs;
use std::path::{Path, PathBuf};

use strum_macros::{AsRefStr, Display, EnumIter};
use tracing::{debug, info, warn};

use crate::error::DiscoveryError;
use crate::server::{Block, Server};

/// Supported configuration syntaxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Dialect {
    Nginx,
    Apache,
}

impl Dialect {
    pub fn parser(&self) -> Box<dyn ConfigDialect> {
        match self {
            Dialect::Nginx => Box::new(nginx::NginxParser),
            Dialect::Apache => Box::new(apache::ApacheParser),
        }
    }
}

/// Result of parsing one configuration file.
#[derive(Debug, Default)]
pub struct Extraction {
    /// Blocks that were completely read, in source order
    pub blocks: Vec<Block>,
    /// Structural problems that caused a block to be dropped
    pub dropped: Vec<DiscoveryError>,
}

/// Parses raw configuration text into normalized blocks.
pub trait ConfigDialect {
    fn dialect(&self) -> Dialect;

    /// Returns an error when the text is malformed beyond recovery. Recoverable
    /// problems are reported through [`Extraction::dropped`].
    fn parse(&self, source: &str) -> Result<Extraction, DiscoveryError>;
}

/// A configuration file or root that could not be fully processed.
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub dialect: Dialect,
    pub error: DiscoveryError,
}

/// Aggregated outcome of scanning one or more configuration roots.
#[derive(Debug, Default)]
pub struct Discovery {
    pub servers: Vec<Server>,
    pub failures: Vec<FileFailure>,
}

impl Discovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans `root` with the given dialect and appends the results.
    ///
    /// A missing root is a normal deployment state and adds nothing.
    pub fn scan(&mut self, parser: &dyn ConfigDialect, root: &Path) {
        let dialect = parser.dialect();
        if !root.exists() {
            debug!(%dialect, root = %root.display(), "configuration root not found, skipping");
            return;
        }

        let files = match list_files(root) {
            Ok(files) => files,
            Err(error) => {
                self.record(root.to_path_buf(), dialect, error);
                return;
            }
        };

        for path in files {
            let servers = match servers_from_file(parser, &path) {
                Ok((servers, dropped)) => {
                    for error in dropped {
                        self.record(path.clone(), dialect, error);
                    }
                    servers
                }
                Err(error) => {
                    self.record(path, dialect, error);
                    continue;
                }
            };
            debug!(%dialect, file = %path.display(), servers = servers.len(), "parsed configuration file");
            self.servers
                .extend(servers.into_iter().filter(Server::has_certificate));
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, path: PathBuf, dialect: Dialect, error: DiscoveryError) {
        warn!(%dialect, file = %path.display(), %error, "configuration skipped");
        self.failures.push(FileFailure {
            path,
            dialect,
            error,
        });
    }
}

/// Discovers TLS servers in both roots, nginx results first.
pub fn discover_ssl_servers(nginx_root: &Path, apache_root: &Path) -> Discovery {
    let mut discovery = Discovery::new();
    for (dialect, root) in [(Dialect::Nginx, nginx_root), (Dialect::Apache, apache_root)] {
        discovery.scan(dialect.parser().as_ref(), root);
    }
    info!(
        servers = discovery.servers.len(),
        failures = discovery.failures.len(),
        "discovery finished"
    );
    discovery
}

/// Runs one file through its dialect pipeline. Certificate-less servers are
/// still returned; filtering is up to the caller.
pub fn servers_from_file(
    parser: &dyn ConfigDialect,
    path: &Path,
) -> Result<(Vec<Server>, Vec<DiscoveryError>), DiscoveryError> {
    let source = fs::read_to_string(path).map_err(|source| DiscoveryError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let extraction = parser.parse(&source)?;
    let servers = extraction.blocks.iter().map(Server::from_block).collect();
    Ok((servers, extraction.dropped))
}

/// Regular files directly under `root`, sorted by name.
fn list_files(root: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    let read_dir_error = |source: std::io::Error| DiscoveryError::ReadDir {
        path: root.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(root).map_err(read_dir_error)? {
        let path = entry.map_err(read_dir_error)?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
