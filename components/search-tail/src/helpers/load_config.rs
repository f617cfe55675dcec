// Local crates
use crate::helpers::{converters::daily_index_name, endpoint::NormalizedEndpoint};
use crate::output::renderer::OutputFormat;

// External crates
use anyhow::{Context, Result, bail};
use chrono::Utc;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_DOC_TYPE: &str = "apache";
pub const DEFAULT_DOCS: usize = 10;
/// Exclusive upper bound of the bootstrap size, the backend's result window.
pub const MAX_DOCS: usize = 10_000;
pub const DEFAULT_INTERVAL_MS: u64 = 1_000;

/// Amazon Linux ships its CA bundle here and TLS stacks do not always find it.
pub const LINUX_CA_BUNDLE: &str = "/etc/pki/tls/certs/ca-bundle.crt";

/// On-disk TOML configuration. Every field is optional, CLI flags win over
/// anything set here.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub tail: TailSection,
    pub metrics: Option<MetricsSection>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct TailSection {
    pub endpoint: Option<String>,
    pub index: Option<String>,
    pub doc_type: Option<String>,
    pub nonstop: Option<bool>,
    pub docs: Option<usize>,
    pub interval_ms: Option<u64>,
    pub verify_certs: Option<bool>,
    pub format: Option<OutputFormat>,
    pub ca_certs: Option<PathBuf>,
    pub debug: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    pub listen_addr: SocketAddr,
}

/// Values supplied on the command line. `None` / `false` means "not given".
#[derive(Debug, Clone, Default)]
pub struct TailOverrides {
    pub endpoint: Option<String>,
    pub index: Option<String>,
    pub doc_type: Option<String>,
    pub nonstop: bool,
    pub docs: Option<usize>,
    pub interval_ms: Option<u64>,
    pub verify_certs: bool,
    pub format: Option<OutputFormat>,
    pub ca_certs: Option<PathBuf>,
    pub metrics_addr: Option<SocketAddr>,
    pub debug: bool,
}

/// Resolved, immutable configuration threaded through the whole pipeline.
#[derive(Debug, Clone)]
pub struct TailConfig {
    pub endpoint: NormalizedEndpoint,
    pub index: String,
    /// Mapping-type filter, `None` searches every type in the index.
    pub doc_type: Option<String>,
    /// Keep polling after the bootstrap fetch.
    pub nonstop: bool,
    /// Size of the bootstrap fetch.
    pub docs: usize,
    pub interval: Duration,
    pub verify_certs: bool,
    pub format: OutputFormat,
    pub ca_certs: Option<PathBuf>,
    pub metrics_addr: Option<SocketAddr>,
    pub debug: bool,
}

impl FileConfig {
    /// Load and parse the configuration file.
    ///
    /// Runs before tracing is installed, so failures are only reported
    /// through the returned error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = fs::read_to_string(path_ref)
            .with_context(|| format!("Failed to read config file at {:?}", path_ref))?;

        toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse TOML from {:?}", path_ref))
    }
}

impl TailConfig {
    /// Merge command line values over the file configuration and built-in
    /// defaults, validating the result.
    pub fn resolve(cli: TailOverrides, file: FileConfig) -> Result<Self> {
        let tail = file.tail;

        let Some(raw_endpoint) = cli.endpoint.or(tail.endpoint) else {
            bail!("no search endpoint given, pass --endpoint or set tail.endpoint in the config file");
        };
        let endpoint = NormalizedEndpoint::parse(&raw_endpoint)?;

        let index = cli
            .index
            .or(tail.index)
            .unwrap_or_else(|| daily_index_name(Utc::now()));
        if index.trim().is_empty() {
            bail!("index name must not be empty");
        }

        let doc_type = cli
            .doc_type
            .or(tail.doc_type)
            .unwrap_or_else(|| DEFAULT_DOC_TYPE.to_string());
        let doc_type = (!doc_type.is_empty()).then_some(doc_type);

        let docs = cli.docs.or(tail.docs).unwrap_or(DEFAULT_DOCS);
        if docs >= MAX_DOCS {
            bail!("docs must be in [0, {MAX_DOCS}), got {docs}");
        }

        let interval_ms = cli
            .interval_ms
            .or(tail.interval_ms)
            .unwrap_or(DEFAULT_INTERVAL_MS);
        if interval_ms == 0 {
            bail!("interval_ms must be greater than zero");
        }

        let ca_certs = cli.ca_certs.or(tail.ca_certs).or_else(|| {
            let bundle = Path::new(LINUX_CA_BUNDLE);
            (endpoint.secure && cfg!(target_os = "linux") && bundle.exists())
                .then(|| bundle.to_path_buf())
        });

        Ok(Self {
            endpoint,
            index,
            doc_type,
            nonstop: cli.nonstop || tail.nonstop.unwrap_or(false),
            docs,
            interval: Duration::from_millis(interval_ms),
            verify_certs: cli.verify_certs || tail.verify_certs.unwrap_or(false),
            format: cli.format.or(tail.format).unwrap_or_default(),
            ca_certs,
            metrics_addr: cli
                .metrics_addr
                .or(file.metrics.map(|metrics| metrics.listen_addr)),
            debug: cli.debug || tail.debug.unwrap_or(false),
        })
    }
}
