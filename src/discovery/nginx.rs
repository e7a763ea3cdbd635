//! Nginx `server { }` blocks.
//!
//! Discovery happens in two passes. [`extract_server_blocks`] cuts the text of
//! every `server` block out of a file by tracking brace depth over the token
//! stream, so quoted braces and comments never count and unrelated context
//! (`events`, `upstream`, `map`, ...) never reaches the parser. Each extracted
//! unit is then parsed with [`brace::parse`] and the relevant directives are
//! projected into a [`Block`].

use tracing::debug;

use super::brace::{self, Lexeme, Node, Token};
use super::{ConfigDialect, Dialect, Extraction};
use crate::error::DiscoveryError;
use crate::server::{Block, Directive};

/// Text of one `server` block, from the `server` keyword to its closing brace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerUnit {
    /// 1-based line of the `server` keyword
    pub line: usize,
    pub text: String,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Idle,
    /// Inside a server block that opened when the file was at depth `base`.
    InBlock {
        base: usize,
        line: usize,
        start: usize,
    },
}

/// Cuts every `server { ... }` block out of `source`.
///
/// Nested blocks such as `location` stay part of their server, and a server
/// declared inside `http { }` is found as well. Unbalanced braces make the
/// whole file malformed.
pub fn extract_server_blocks(source: &str) -> Result<Vec<ServerUnit>, DiscoveryError> {
    let lexemes = brace::tokenize(source).map_err(|e| malformed(e.line(), &e.to_string()))?;
    let mut units = Vec::new();
    let mut state = State::Idle;
    let mut depth: usize = 0;
    let mut statement_start = true;

    for (index, lexeme) in lexemes.iter().enumerate() {
        if let State::Idle = state {
            if statement_start && opens_server(lexeme, lexemes.get(index + 1)) {
                state = State::InBlock {
                    base: depth,
                    line: lexeme.line,
                    start: lexeme.span.start,
                };
            }
        }

        match lexeme.token {
            Token::BlockOpen => depth += 1,
            Token::BlockClose => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| malformed(lexeme.line, "unexpected '}'"))?;
                if let State::InBlock { base, line, start } = state {
                    if depth == base {
                        units.push(ServerUnit {
                            line,
                            text: source[start..lexeme.span.end].to_string(),
                        });
                        state = State::Idle;
                    }
                }
            }
            _ => {}
        }

        statement_start = matches!(
            lexeme.token,
            Token::Semicolon | Token::BlockOpen | Token::BlockClose
        );
    }

    match state {
        State::InBlock { line, .. } => Err(malformed(line, "server block is never closed")),
        State::Idle if depth > 0 => Err(malformed(
            lexemes.last().map_or(1, |lexeme| lexeme.line),
            "unbalanced braces at end of file",
        )),
        State::Idle => Ok(units),
    }
}

/// A bare `server` word directly followed by `{`.
fn opens_server(lexeme: &Lexeme, next: Option<&Lexeme>) -> bool {
    matches!(&lexeme.token, Token::Word(word) if word == "server")
        && matches!(next, Some(next) if next.token == Token::BlockOpen)
}

/// Projects the `server` nodes of a parsed tree into blocks.
pub fn server_blocks(nodes: &[Node]) -> Vec<Block> {
    nodes
        .iter()
        .filter(|node| node.name == "server" && node.block.is_some())
        .map(|node| project(node.children()))
        .collect()
}

fn project(children: &[Node]) -> Block {
    let mut block = Block::new();
    for node in children {
        if node.block.is_some() {
            block.push(Directive::Nested(project(node.children())));
            continue;
        }
        match node.name.as_str() {
            "listen" => block.push(Directive::Listen(node.value())),
            "server_name" => block.push(Directive::ServerName(node.value())),
            "ssl_certificate" => block.push(Directive::SslCertificate(node.value())),
            _ => {}
        }
    }
    block
}

fn malformed(line: usize, reason: &str) -> DiscoveryError {
    DiscoveryError::Malformed {
        dialect: Dialect::Nginx,
        line,
        reason: reason.to_string(),
    }
}

/// Parser for nginx configuration files.
#[derive(Debug, Clone, Copy, Default)]
pub struct NginxParser;

impl ConfigDialect for NginxParser {
    fn dialect(&self) -> Dialect {
        Dialect::Nginx
    }

    fn parse(&self, source: &str) -> Result<Extraction, DiscoveryError> {
        let mut extraction = Extraction::default();
        for unit in extract_server_blocks(source)? {
            let nodes = brace::parse(&unit.text)
                .map_err(|e| malformed(unit.line + e.line() - 1, &e.to_string()))?;
            extraction.blocks.extend(server_blocks(&nodes));
        }
        debug!(blocks = extraction.blocks.len(), "extracted nginx server blocks");
        Ok(extraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::Server;

    const SITE: &str = r#"
upstream backend {
    server 127.0.0.1:8080;
}

server {
    listen 80;
    server_name example.com;
    return 301 https://$host$request_uri;
}

server {
    listen 443 ssl default_server;
    server_name "*.example.com" www.example.com;
    ssl_certificate /etc/ssl/example.pem;
    ssl_certificate_key /etc/ssl/example.key;

    location / {
        proxy_pass http://backend;
        if ($http_upgrade) {
            return 400;
        }
    }
}
"#;

    #[test]
    fn test_extracts_only_server_blocks() {
        let units = extract_server_blocks(SITE).unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].line, 6);
        assert!(units[0].text.starts_with("server {"));
        assert!(units[0].text.trim_end().ends_with('}'));
        assert!(!units[0].text.contains("upstream"));
        assert!(units[1].text.contains("proxy_pass"));
        assert!(units[1].text.contains("return 400"));
    }

    #[test]
    fn test_single_line_server() {
        let units = extract_server_blocks("server { listen 443; }\nevents {}\n").unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].text, "server { listen 443; }");
    }

    #[test]
    fn test_quoted_braces_do_not_count() {
        let source = r#"server {
    listen 443 ssl;
    ssl_certificate /etc/ssl/a.pem;
    return 200 "}";
    add_header X-Open '{';
    location /docs#intro {
        return 301 https://example.com/#top;
    }
}
"#;
        let units = extract_server_blocks(source).unwrap();
        assert_eq!(units.len(), 1);
        assert!(units[0].text.ends_with("}\n}"));

        let extraction = NginxParser.parse(source).unwrap();
        let server = Server::from_block(&extraction.blocks[0]);
        assert_eq!(server.port, "443");
        assert_eq!(server.cert, "/etc/ssl/a.pem");
    }

    #[test]
    fn test_server_word_as_argument_is_not_a_block() {
        let source = "map $host $backend {\n    default server;\n}\nupstream up {\n    server 10.0.0.1;\n}\n";
        assert!(extract_server_blocks(source).unwrap().is_empty());
    }

    #[test]
    fn test_unterminated_quote_is_malformed() {
        let err = NginxParser.parse("server {\n    return 200 \"oops;\n}\n").unwrap_err();
        assert!(matches!(err, DiscoveryError::Malformed { line: 2, .. }));
    }

    #[test]
    fn test_server_inside_http_block() {
        let source = r#"
http {
    include mime.types;
    server {
        listen 0.0.0.0:8443 ssl;
        ssl_certificate /etc/ssl/http.pem;
    }
    gzip on;
}
"#;
        let units = extract_server_blocks(source).unwrap();
        assert_eq!(units.len(), 1);
        assert!(!units[0].text.contains("gzip"));
    }

    #[test]
    fn test_comments_do_not_count_braces() {
        let source = "server {\n    # legacy { block\n    listen 443;\n}\n";
        assert_eq!(extract_server_blocks(source).unwrap().len(), 1);
    }

    #[test]
    fn test_unclosed_server_is_malformed() {
        let err = extract_server_blocks("server {\n    listen 443;\n").unwrap_err();
        match err {
            DiscoveryError::Malformed { dialect, line, .. } => {
                assert_eq!(dialect, Dialect::Nginx);
                assert_eq!(line, 1);
            }
            other => panic!("Expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_stray_close_is_malformed() {
        let err = extract_server_blocks("events {}\n}\n").unwrap_err();
        assert!(matches!(err, DiscoveryError::Malformed { line: 2, .. }));
    }

    #[test]
    fn test_parse_projects_directives() {
        let extraction = NginxParser.parse(SITE).unwrap();
        assert_eq!(extraction.blocks.len(), 2);
        assert!(extraction.dropped.is_empty());

        let tls = &extraction.blocks[1];
        assert_eq!(
            &tls.directives[..3],
            &[
                Directive::Listen("443 ssl default_server".into()),
                Directive::ServerName("*.example.com www.example.com".into()),
                Directive::SslCertificate("/etc/ssl/example.pem".into()),
            ]
        );
        assert!(matches!(tls.directives[3], Directive::Nested(_)));

        let server = Server::from_block(tls);
        assert_eq!(server.name, "www.example.com");
        assert_eq!(server.port, "443");
        assert_eq!(server.cert, "/etc/ssl/example.pem");
    }

    #[test]
    fn test_parse_error_reports_file_line() {
        let source = "\n\nserver {\n    listen 443\n}\n";
        let err = NginxParser.parse(source).unwrap_err();
        assert!(matches!(err, DiscoveryError::Malformed { line: 4, .. }));
    }

    #[test]
    fn test_file_without_servers() {
        let extraction = NginxParser.parse("user www-data;\nevents {\n}\n").unwrap();
        assert!(extraction.blocks.is_empty());
    }
}
