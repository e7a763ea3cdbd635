//! Integration tests for the public API

use std::fs;
use std::net::TcpListener;
use std::time::Duration;

use tempfile::tempdir;
use zabbix_ssl::discovery::apache::ApacheParser;
use zabbix_ssl::discovery::nginx::NginxParser;
use zabbix_ssl::{
    discover_ssl_servers, Certificate, ConfigDialect, Dialect, Discovery, DiscoveryError,
    DiscoveryReport, TLSValidationError,
};

#[test]
fn test_public_api_compiles() {
    // The certificate check needs network access, only verify it is usable
    fn check_certificate(hostname: &str) -> Result<(), TLSValidationError> {
        let _result = Certificate::from(hostname, 443, Duration::from_secs(3))?;
        Ok(())
    }

    let _ = check_certificate;
}

#[test]
fn test_apache_directory_end_to_end() {
    let nginx = tempdir().unwrap();
    let apache = tempdir().unwrap();
    fs::write(
        apache.path().join("a.conf"),
        r#"<VirtualHost *:443>
    ServerName a.example.com
    SSLCertificateFile /etc/ssl/a.pem
</VirtualHost>
"#,
    )
    .unwrap();
    fs::write(
        apache.path().join("b.conf"),
        r#"<VirtualHost *:80>
    ServerName b.example.com
</VirtualHost>
"#,
    )
    .unwrap();

    let discovery = discover_ssl_servers(nginx.path(), apache.path());
    let json = DiscoveryReport::from_servers(&discovery.servers)
        .to_json()
        .unwrap();

    assert_eq!(
        json,
        r#"{"data":[{"{#DOMAIN}":"a.example.com","{#PORT}":"443","{#CERT}":"/etc/ssl/a.pem"}]}"#
    );
}

#[test]
fn test_mixed_dialects_end_to_end() {
    let nginx = tempdir().unwrap();
    let apache = tempdir().unwrap();
    fs::write(
        nginx.path().join("nginx.conf"),
        r#"
user www-data;
events {
    worker_connections 768;
}
http {
    server {
        listen [::]:8443 ssl http2;
        server_name _ shop.example.com;
        ssl_certificate /etc/ssl/shop.pem;
        location /api {
            proxy_pass http://127.0.0.1:9000;
        }
    }
    server {
        listen 80;
        server_name plain.example.com;
    }
}
"#,
    )
    .unwrap();
    fs::write(
        apache.path().join("ssl.conf"),
        "<VirtualHost 0.0.0.0:443>\n  ServerName www.example.com\n  SSLCertificateFile /etc/ssl/www.pem\n</VirtualHost>\n",
    )
    .unwrap();

    let discovery = discover_ssl_servers(nginx.path(), apache.path());
    assert!(discovery.is_clean());

    let report = DiscoveryReport::from_servers(&discovery.servers);
    let summary: Vec<(&str, &str, &str)> = report
        .data
        .iter()
        .map(|item| (item.domain.as_str(), item.port.as_str(), item.cert.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("shop.example.com", "8443", "/etc/ssl/shop.pem"),
            ("www.example.com", "443", "/etc/ssl/www.pem"),
        ]
    );
}

#[test]
fn test_nonexistent_roots_yield_empty_report() {
    let dir = tempdir().unwrap();
    let discovery = discover_ssl_servers(&dir.path().join("nope"), &dir.path().join("nada"));
    assert!(discovery.servers.is_empty());
    assert!(discovery.is_clean());
    assert_eq!(
        DiscoveryReport::from_servers(&discovery.servers)
            .to_json()
            .unwrap(),
        r#"{"data":[]}"#
    );
}

#[test]
fn test_custom_dialect_plugs_into_scan() {
    // A single-line "name port cert" format, to exercise the trait seam
    struct Flat;

    impl ConfigDialect for Flat {
        fn dialect(&self) -> Dialect {
            Dialect::Apache
        }

        fn parse(&self, source: &str) -> Result<zabbix_ssl::discovery::Extraction, DiscoveryError> {
            let mut extraction = zabbix_ssl::discovery::Extraction::default();
            for line in source.lines() {
                let fields: Vec<&str> = line.split_whitespace().collect();
                if let [name, port, cert] = fields[..] {
                    extraction.blocks.push(zabbix_ssl::Block::from(vec![
                        zabbix_ssl::Directive::ServerName(name.to_string()),
                        zabbix_ssl::Directive::Listen(port.to_string()),
                        zabbix_ssl::Directive::SslCertificate(cert.to_string()),
                    ]));
                }
            }
            Ok(extraction)
        }
    }

    let dir = tempdir().unwrap();
    fs::write(dir.path().join("hosts"), "a.example.com 443 /a.pem\nbroken line\n").unwrap();

    let mut discovery = Discovery::new();
    discovery.scan(&Flat, dir.path());
    assert_eq!(discovery.servers.len(), 1);
    assert_eq!(discovery.servers[0].cert, "/a.pem");
}

#[test]
fn test_parsers_report_their_dialect() {
    assert_eq!(NginxParser.dialect(), Dialect::Nginx);
    assert_eq!(ApacheParser.dialect(), Dialect::Apache);
}

#[test]
fn test_refused_connection_is_connection_failed() {
    // Grab a free port, then close it so nothing is listening there
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    match Certificate::from("127.0.0.1", port, Duration::from_secs(3)) {
        Err(TLSValidationError::ConnectionFailed { address, .. }) => {
            assert_eq!(address, format!("127.0.0.1:{}", port));
        }
        other => panic!("Expected ConnectionFailed, got {:?}", other),
    }
}
