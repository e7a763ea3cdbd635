//! Zabbix low-level discovery (LLD) output.
//!
//! Zabbix expects discovery rules to return
//!
//! ```json
//! {"data": [{"{#DOMAIN}": "example.com", "{#PORT}": "443", "{#CERT}": "/etc/ssl/example.pem"}]}
//! ```

use comfy_table::{ContentArrangement, Table};
use serde::{Deserialize, Serialize};

use crate::server::Server;

/// One discovered entity, keyed by Zabbix LLD macros.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryItem {
    #[serde(rename = "{#DOMAIN}")]
    pub domain: String,
    #[serde(rename = "{#PORT}")]
    pub port: String,
    #[serde(rename = "{#CERT}")]
    pub cert: String,
}

impl From<&Server> for DiscoveryItem {
    fn from(server: &Server) -> Self {
        DiscoveryItem {
            domain: server.name.clone(),
            port: normalize_port(&server.port).to_string(),
            cert: server.cert.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub data: Vec<DiscoveryItem>,
}

impl DiscoveryReport {
    pub fn from_servers<'a, I>(servers: I) -> Self
    where
        I: IntoIterator<Item = &'a Server>,
    {
        DiscoveryReport {
            data: servers.into_iter().map(DiscoveryItem::from).collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Human readable rendering of the report.
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Domain", "Port", "Certificate"]);
        for item in &self.data {
            table.add_row(vec![&item.domain, &item.port, &item.cert]);
        }
        table
    }
}

/// Port part of a listen specifier: `0.0.0.0:8443` -> `8443`, `[::]:443` -> `443`.
pub fn normalize_port(raw: &str) -> &str {
    raw.rsplit(':').next().unwrap_or(raw)
}
