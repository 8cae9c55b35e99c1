//! Open5GS SBI port rewriting
#![allow(missing_docs)]
//!
//! A stock Open5GS install gives every network function's SBI server port
//! 7777, which only works when each function has its own IP. This crate
//! rewrites the service YAML files in a config directory so that every
//! server listens on its own port and the NRF / SCP client URIs follow.
//!
//! Files are parsed with `serde_yaml`; key order is preserved on write-back
//! and a file is only written when something changed.

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::{Number, Value};
use thiserror::Error;
use tracing::{debug, info};

/// Where Open5GS keeps its YAML files by default
pub const DEFAULT_CONFIG_DIR: &str = "/opt/open5gs/etc/open5gs";

/// Port stock configurations use for every SBI server
pub const STOCK_SBI_PORT: u16 = 7777;

/// SBI port per network function
pub const PORT_TABLE: [(&str, u16); 10] = [
    ("amf", 7777),
    ("smf", 7778),
    ("pcf", 7779),
    ("udr", 7780),
    ("udm", 7781),
    ("ausf", 7782),
    ("nrf", 7783),
    ("bsf", 7784),
    ("nssf", 7785),
    ("scp", 7786),
];

/// Services without an SBI server of their own whose NRF / SCP URIs still
/// need rewriting
pub const ADDITIONAL_SERVICES: [&str; 8] =
    ["sepp1", "sepp2", "mme", "sgwc", "sgwu", "hss", "pcrf", "upf"];

/// Errors while fixing one file
#[derive(Debug, Error)]
pub enum PortFixError {
    #[error("Failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Unknown service {0}")]
    UnknownService(String),
}

pub type Result<T> = std::result::Result<T, PortFixError>;

/// SBI port assigned to `service`
pub fn service_port(service: &str) -> Option<u16> {
    PORT_TABLE
        .iter()
        .find(|(name, _)| *name == service)
        .map(|(_, port)| *port)
}

fn required_port(service: &str) -> Result<u16> {
    service_port(service).ok_or_else(|| PortFixError::UnknownService(service.to_string()))
}

/// One value that was rewritten
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// Dotted path of the value, e.g. `smf.sbi.server[0].port`
    pub field: String,
    pub old: String,
    pub new: String,
}

/// What happened to one service file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixReport {
    pub service: String,
    pub path: PathBuf,
    pub changes: Vec<Change>,
}

impl FixReport {
    /// Whether the file was rewritten
    pub fn changed(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// Port found for a service after fixing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortCheck {
    pub service: String,
    /// First SBI server port, if the file has one
    pub actual: Option<u16>,
    pub expected: u16,
}

impl PortCheck {
    pub fn is_ok(&self) -> bool {
        self.actual == Some(self.expected)
    }
}

fn service_path(dir: &Path, service: &str) -> PathBuf {
    dir.join(format!("{service}.yaml"))
}

fn read_yaml(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path).map_err(|source| PortFixError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&content).map_err(|source| PortFixError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

fn write_yaml(path: &Path, value: &Value) -> Result<()> {
    let content = serde_yaml::to_string(value).map_err(|source| PortFixError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, content).map_err(|source| PortFixError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".into(),
        other => format!("{other:?}"),
    }
}

/// Rewrites `uri` with every `(from, to)` replacement applied in order
fn rewrite_uris(
    entries: Option<&mut Value>,
    field: &str,
    replacements: &[(String, String)],
    changes: &mut Vec<Change>,
) {
    let Some(entries) = entries.and_then(Value::as_sequence_mut) else {
        return;
    };

    for (i, entry) in entries.iter_mut().enumerate() {
        let Some(Value::String(uri)) = entry.get_mut("uri") else {
            continue;
        };
        let mut rewritten = uri.clone();
        for (from, to) in replacements {
            rewritten = rewritten.replace(from.as_str(), to);
        }
        if rewritten != *uri {
            changes.push(Change {
                field: format!("{field}[{i}].uri"),
                old: uri.clone(),
                new: rewritten.clone(),
            });
            *uri = rewritten;
        }
    }
}

/// Applies the port table to one parsed service document
fn fix_document(doc: &mut Value, service: &str, port: u16) -> Vec<Change> {
    let mut changes = Vec::new();
    let nrf = format!(":{}", service_port("nrf").unwrap_or(STOCK_SBI_PORT));
    let scp = format!(":{}", service_port("scp").unwrap_or(STOCK_SBI_PORT));

    let Some(sbi) = doc.get_mut(service).and_then(|s| s.get_mut("sbi")) else {
        return changes;
    };

    if let Some(servers) = sbi.get_mut("server").and_then(Value::as_sequence_mut) {
        for (i, server) in servers.iter_mut().enumerate() {
            let Some(current) = server.get_mut("port") else {
                continue;
            };
            let wanted = Value::Number(Number::from(u64::from(port)));
            if *current != wanted {
                changes.push(Change {
                    field: format!("{service}.sbi.server[{i}].port"),
                    old: scalar_text(current),
                    new: port.to_string(),
                });
                *current = wanted;
            }
        }
    }

    if let Some(client) = sbi.get_mut("client") {
        let stock = format!(":{STOCK_SBI_PORT}");
        rewrite_uris(
            client.get_mut("nrf"),
            &format!("{service}.sbi.client.nrf"),
            &[(stock.clone(), nrf.clone())],
            &mut changes,
        );
        // NRF's port is a known wrong value for SCP clients
        rewrite_uris(
            client.get_mut("scp"),
            &format!("{service}.sbi.client.scp"),
            &[(stock, scp.clone()), (nrf, scp)],
            &mut changes,
        );
    }

    changes
}

/// Fixes `<dir>/<service>.yaml` for one service in the port table.
///
/// Returns `Ok(None)` when the file does not exist.
pub fn fix_service(dir: &Path, service: &str) -> Result<Option<FixReport>> {
    let port = required_port(service)?;
    let path = service_path(dir, service);
    if !path.exists() {
        debug!("Skipping {} - does not exist", path.display());
        return Ok(None);
    }

    let mut doc = read_yaml(&path)?;
    let changes = fix_document(&mut doc, service, port);
    for change in &changes {
        info!("{}: {} -> {}", change.field, change.old, change.new);
    }
    if !changes.is_empty() {
        write_yaml(&path, &doc)?;
    }

    Ok(Some(FixReport {
        service: service.to_string(),
        path,
        changes,
    }))
}

/// URL replacements applied to services outside the port table
fn additional_replacements() -> Vec<(String, String)> {
    let nrf = service_port("nrf").unwrap_or(STOCK_SBI_PORT);
    let scp = service_port("scp").unwrap_or(STOCK_SBI_PORT);
    vec![
        (
            format!("http://127.0.0.1:{STOCK_SBI_PORT}"),
            format!("http://127.0.0.1:{nrf}"),
        ),
        (
            format!("http://127.0.0.10:{STOCK_SBI_PORT}"),
            format!("http://127.0.0.1:{nrf}"),
        ),
        (
            format!("http://127.0.0.22:{STOCK_SBI_PORT}"),
            format!("http://127.0.0.1:{scp}"),
        ),
    ]
}

fn rewrite_strings(
    value: &mut Value,
    path: &str,
    replacements: &[(String, String)],
    changes: &mut Vec<Change>,
) {
    match value {
        Value::String(s) => {
            let mut rewritten = s.clone();
            for (from, to) in replacements {
                rewritten = rewritten.replace(from.as_str(), to);
            }
            if rewritten != *s {
                changes.push(Change {
                    field: path.to_string(),
                    old: s.clone(),
                    new: rewritten.clone(),
                });
                *s = rewritten;
            }
        }
        Value::Sequence(items) => {
            for (i, item) in items.iter_mut().enumerate() {
                rewrite_strings(item, &format!("{path}[{i}]"), replacements, changes);
            }
        }
        Value::Mapping(map) => {
            for (key, item) in map.iter_mut() {
                let key = scalar_text(key);
                let child = if path.is_empty() {
                    key
                } else {
                    format!("{path}.{key}")
                };
                rewrite_strings(item, &child, replacements, changes);
            }
        }
        Value::Tagged(tagged) => rewrite_strings(&mut tagged.value, path, replacements, changes),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// Rewrites NRF / SCP URLs anywhere in `<dir>/<service>.yaml`.
///
/// Returns `Ok(None)` when the file does not exist.
pub fn fix_additional(dir: &Path, service: &str) -> Result<Option<FixReport>> {
    let path = service_path(dir, service);
    if !path.exists() {
        return Ok(None);
    }
    info!("Processing additional service: {}", service);

    let mut doc = read_yaml(&path)?;
    let mut changes = Vec::new();
    rewrite_strings(&mut doc, "", &additional_replacements(), &mut changes);
    if !changes.is_empty() {
        write_yaml(&path, &doc)?;
    }

    Ok(Some(FixReport {
        service: service.to_string(),
        path,
        changes,
    }))
}

/// Reads back the first SBI server port of every service file present
pub fn verify(dir: &Path) -> Vec<PortCheck> {
    PORT_TABLE
        .iter()
        .filter_map(|&(service, expected)| {
            let path = service_path(dir, service);
            if !path.exists() {
                return None;
            }
            let actual = read_yaml(&path).ok().and_then(|doc| {
                doc[service]["sbi"]["server"][0]["port"]
                    .as_u64()
                    .and_then(|p| u16::try_from(p).ok())
            });
            Some(PortCheck {
                service: service.to_string(),
                actual,
                expected,
            })
        })
        .collect()
}
