use crate::helpers::load_config::{FileConfig, TailConfig, TailOverrides};
use crate::instrumentation::tracing::{init_panic_handler, init_tracing};
use crate::output::renderer::OutputFormat;
use crate::runtime;
use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "estail",
    long_about = "estail follows documents as they are indexed into an Elasticsearch compatible search backend, printing them the way `tail -f` prints lines of a file.",
    about = "tail -f for search indices",
    version,
    term_width = 100,
    after_help = "\
    EXAMPLES:
        estail -e http://localhost:9200
        estail -e https://search.internal:9243 -i app-2016.07.14 -t java -n 50 -f
        estail -e http://localhost:9200 --format kv --debug
        estail --config /etc/estail.toml -f"
)]
struct Cli {
    /// Search backend URL, http or https
    #[arg(short, long, required_unless_present = "config")]
    endpoint: Option<String>,

    /// Document type to tail, empty for every type [default: apache]
    #[arg(short = 't', long = "type")]
    doc_type: Option<String>,

    /// Index to tail [default: logstash-YYYY.MM.DD for today, UTC]
    #[arg(short, long)]
    index: Option<String>,

    /// Keep polling for new documents after the initial fetch
    #[arg(short = 'f', long)]
    nonstop: bool,

    /// Number of most recent documents to show first [default: 10]
    #[arg(
        short = 'n',
        long,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(0..10_000)
    )]
    docs: Option<usize>,

    /// Verify TLS certificates of https endpoints
    #[arg(long, alias = "verify_certs")]
    verify_certs: bool,

    /// Output format [default: json]
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Enable debug logging on stderr
    #[arg(short, long)]
    debug: bool,

    /// TOML configuration file, command line flags take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Delay between polls in milliseconds [default: 1000]
    #[arg(long)]
    interval_ms: Option<u64>,

    /// PEM bundle of additional trusted CA certificates
    #[arg(long)]
    ca_certs: Option<PathBuf>,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    metrics_addr: Option<SocketAddr>,
}

impl Cli {
    fn overrides(&self) -> TailOverrides {
        TailOverrides {
            endpoint: self.endpoint.clone(),
            index: self.index.clone(),
            doc_type: self.doc_type.clone(),
            nonstop: self.nonstop,
            docs: self.docs,
            interval_ms: self.interval_ms,
            verify_certs: self.verify_certs,
            format: self.format,
            ca_certs: self.ca_certs.clone(),
            metrics_addr: self.metrics_addr,
            debug: self.debug,
        }
    }

    fn resolve(&self) -> Result<TailConfig> {
        let file = match &self.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        TailConfig::resolve(self.overrides(), file)
    }
}

/// Entry function for CLI
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve()?;

    // Keep the guard alive so buffered log lines are flushed on exit
    let _guard = init_tracing(config.debug)?;
    init_panic_handler();

    tracing::debug!(
        configuration_file_path = ?cli.config,
        config = ?config,
        "estail configuration resolved"
    );
    runtime::runtime::run_tail(config).await
}
