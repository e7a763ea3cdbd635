//! Apache `<VirtualHost>` blocks.
//!
//! Virtual hosts do not nest, so a single line-oriented pass is enough: the
//! opening tag starts a block, `ServerName` and `SSLCertificateFile` lines
//! add directives, and the closing tag emits the block. A block that is never
//! closed is dropped and reported, it never yields a partial record.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use super::{ConfigDialect, Dialect, Extraction};
use crate::error::DiscoveryError;
use crate::server::{Block, Directive};

lazy_static! {
    static ref VHOST_START: Regex = Regex::new(r"(?i)^\s*<VirtualHost(?:\s+([^>]*))?>").unwrap();
    static ref VHOST_STOP: Regex = Regex::new(r"(?i)^\s*</VirtualHost\s*>").unwrap();
    static ref SERVER_NAME: Regex = Regex::new(r"(?i)^\s*ServerName\s+(.+?)\s*$").unwrap();
    static ref CERTIFICATE_FILE: Regex =
        Regex::new(r"(?i)^\s*SSLCertificateFile\s+(.+?)\s*$").unwrap();
    static ref ADDRESS_WITH_PORT: Regex = Regex::new(r":\d+$").unwrap();
}

#[derive(Debug, PartialEq, Eq)]
enum LineKind<'a> {
    /// Opening tag with its first address, if any
    Start(Option<&'a str>),
    Stop,
    ServerName(&'a str),
    Certificate(&'a str),
    Other,
}

#[derive(Debug)]
enum State {
    Idle,
    InBlock { line: usize, block: Block },
}

fn classify(line: &str) -> LineKind<'_> {
    if let Some(caps) = VHOST_START.captures(line) {
        let address = caps
            .get(1)
            .and_then(|params| params.as_str().split_whitespace().next());
        return LineKind::Start(address);
    }
    if VHOST_STOP.is_match(line) {
        return LineKind::Stop;
    }
    if let Some(caps) = SERVER_NAME.captures(line) {
        return LineKind::ServerName(caps.get(1).map_or("", |m| m.as_str()));
    }
    if let Some(caps) = CERTIFICATE_FILE.captures(line) {
        return LineKind::Certificate(caps.get(1).map_or("", |m| m.as_str()));
    }
    LineKind::Other
}

/// Splits `source` into one block per closed `<VirtualHost>` section.
pub fn extract_virtual_hosts(source: &str) -> Extraction {
    let mut extraction = Extraction::default();
    let mut state = State::Idle;

    for (index, text) in source.lines().enumerate() {
        let line_no = index + 1;
        state = match (state, classify(text)) {
            (State::InBlock { line: open, .. }, LineKind::Start(address)) => {
                extraction.dropped.push(unterminated(open));
                open_block(line_no, address)
            }
            (State::Idle, LineKind::Start(address)) => open_block(line_no, address),
            (State::InBlock { block, .. }, LineKind::Stop) => {
                extraction.blocks.push(block);
                State::Idle
            }
            (State::InBlock { line, mut block }, LineKind::ServerName(name)) => {
                block.push(Directive::ServerName(unquote(name).to_string()));
                State::InBlock { line, block }
            }
            (State::InBlock { line, mut block }, LineKind::Certificate(path)) => {
                block.push(Directive::SslCertificate(unquote(path).to_string()));
                State::InBlock { line, block }
            }
            (state, _) => state,
        };
    }

    if let State::InBlock { line, .. } = state {
        extraction.dropped.push(unterminated(line));
    }
    extraction
}

fn open_block(line: usize, address: Option<&str>) -> State {
    let mut block = Block::new();
    if let Some(address) = address.filter(|a| ADDRESS_WITH_PORT.is_match(a)) {
        block.push(Directive::Listen(address.to_string()));
    }
    State::InBlock { line, block }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn unterminated(line: usize) -> DiscoveryError {
    DiscoveryError::Malformed {
        dialect: Dialect::Apache,
        line,
        reason: "<VirtualHost> is never closed".to_string(),
    }
}

/// Parser for Apache configuration files.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApacheParser;

impl ConfigDialect for ApacheParser {
    fn dialect(&self) -> Dialect {
        Dialect::Apache
    }

    fn parse(&self, source: &str) -> Result<Extraction, DiscoveryError> {
        let extraction = extract_virtual_hosts(source);
        debug!(
            blocks = extraction.blocks.len(),
            dropped = extraction.dropped.len(),
            "extracted apache virtual hosts"
        );
        Ok(extraction)
    }
}
