//! Normalized server records built from configuration blocks.
//!
//! Both configuration dialects reduce a virtual host definition to a [`Block`]
//! of [`Directive`]s. [`Server::from_block`] folds that block into a single
//! record carrying the name, listen specifier and certificate path.

use serde::{Deserialize, Serialize};

/// A directive relevant to certificate discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Listen specifier, e.g. `443 ssl`, `0.0.0.0:8443` or `*:443`
    Listen(String),
    /// One or more whitespace separated server names
    ServerName(String),
    /// Path to the certificate file
    SslCertificate(String),
    /// Nested group such as an nginx `location` block
    Nested(Block),
}

/// One structural unit of configuration, a virtual host or server definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    pub directives: Vec<Directive>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, directive: Directive) {
        self.directives.push(directive);
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }
}

impl From<Vec<Directive>> for Block {
    fn from(directives: Vec<Directive>) -> Self {
        Block { directives }
    }
}

/// A TLS-serving virtual host.
///
/// `port` is kept as text because listen directives may carry an
/// `address:port` form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub name: String,
    pub port: String,
    pub cert: String,
}

impl Server {
    /// Folds a block's directives into a server record.
    ///
    /// - `Listen` keeps the first whitespace separated token.
    /// - `ServerName` with several names picks the first one starting with a
    ///   letter, skipping wildcards and `_` placeholders. A single name is
    ///   used as is.
    /// - `SslCertificate` is taken verbatim, the last one wins.
    /// - `Nested` groups are skipped.
    pub fn from_block(block: &Block) -> Server {
        let mut server = Server::default();
        for directive in &block.directives {
            match directive {
                Directive::Listen(value) => {
                    if let Some(port) = value.split_whitespace().next() {
                        server.port = port.to_string();
                    }
                }
                Directive::ServerName(value) => {
                    let names: Vec<&str> = value.split_whitespace().collect();
                    if names.len() > 1 {
                        if let Some(name) = names
                            .iter()
                            .find(|name| name.chars().next().map_or(false, char::is_alphabetic))
                        {
                            server.name = name.to_string();
                        }
                    } else {
                        server.name = value.trim().to_string();
                    }
                }
                Directive::SslCertificate(value) => server.cert = value.clone(),
                Directive::Nested(_) => continue,
            }
        }
        server
    }

    /// Only servers with a certificate are worth monitoring.
    pub fn has_certificate(&self) -> bool {
        !self.cert.is_empty()
    }
}
