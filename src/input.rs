//! Provides a means to read, parse and hold configuration options for scans.
use clap::{Parser, ValueEnum};
use serde_derive::Deserialize;
use std::fs;
use std::io;
use std::num::NonZeroU16;
use std::path::PathBuf;
use std::time::Duration;

use crate::address::Address;
use crate::error::ScanError;
use crate::port_strategy::{PortRange, PortStrategy};

/// How the log files are prepared before the first host record is written.
///   - Overwrite truncates the shared `openPorts.txt` / `closedPorts.txt`.
///   - Append keeps whatever the shared files already contain.
///   - New creates a fresh pair of files named after the run.
///
/// Both the command line and the config file take the lowercase names; the
/// config file also accepts the capitalized spelling.
#[derive(Deserialize, Debug, ValueEnum, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogMode {
    /// Truncate the shared log files.
    #[serde(alias = "Overwrite")]
    Overwrite,
    /// Keep the shared log files and add to them.
    #[serde(alias = "Append")]
    Append,
    /// Write to a fresh pair of files.
    #[serde(alias = "New")]
    New,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "rangescan",
    version = env!("CARGO_PKG_VERSION"),
    max_term_width = 120,
    help_template = "{bin} {version}\n{about}\n\nUSAGE:\n    {usage}\n\nOPTIONS:\n{options}",
)]
#[allow(clippy::struct_excessive_bools)]
/// Batched TCP connect scanner for contiguous IPv4 host and port ranges.
/// Every port of every host in the range is probed with a single connection
/// attempt; a port is open when the connection is accepted before the timeout.
pub struct Opts {
    /// First host of the range, in dotted-quad form.
    #[arg(short, long, default_value = "127.0.0.1")]
    pub start_host: String,

    /// Last host of the range (inclusive), in dotted-quad form.
    #[arg(short, long, default_value = "127.0.0.1")]
    pub end_host: String,

    /// First port of the range.
    #[arg(long, default_value = "80")]
    pub start_port: u16,

    /// Last port of the range (inclusive).
    #[arg(long, default_value = "443")]
    pub end_port: u16,

    /// The timeout in milliseconds before a port is assumed to be closed.
    #[arg(short, long, default_value = "300")]
    pub timeout: u32,

    /// How many ports are probed at the same time. Every port of a batch
    /// settles before the next batch starts, so the worst case per host is
    /// (ports / batch size) * timeout. Depends on the open file limit of your OS.
    #[arg(short, long, default_value = "10")]
    pub batch_size: u16,

    /// Write one record per host to the open and closed port log files.
    #[arg(short, long)]
    pub log: bool,

    /// Directory holding the log files.
    #[arg(long, default_value = "./log")]
    pub log_dir: PathBuf,

    /// How existing log files are treated when logging is enabled.
    #[arg(long, value_enum, ignore_case = true, default_value = "overwrite")]
    pub log_mode: LogMode,

    /// CSV file of service names, with "Port" and "Service" columns
    /// (the IANA "Port Number" / "Service Name" headers work too).
    #[arg(long, value_parser)]
    pub services: Option<PathBuf>,

    /// Greppable mode. Only output the open ports of each host.
    #[arg(short, long)]
    pub greppable: bool,

    /// Accessible mode. Turns off features which negatively affect screen readers.
    #[arg(long)]
    pub accessible: bool,

    /// Print the run summary as JSON instead of the console report.
    #[arg(long)]
    pub json: bool,

    /// Hide the banner
    #[arg(long)]
    pub no_banner: bool,

    /// Automatically ups the ULIMIT with the value you provided.
    #[arg(short, long)]
    pub ulimit: Option<u64>,

    /// Whether to ignore the configuration file or not.
    #[arg(short, long)]
    pub no_config: bool,

    /// Custom path to config file
    #[arg(short, long, value_parser)]
    pub config_path: Option<PathBuf>,
}

#[cfg(not(tarpaulin_include))]
impl Opts {
    /// Parses the process arguments.
    pub fn read() -> Self {
        Self::parse()
    }

    /// Merge values found within the user configuration file into the
    /// options read from the command line.
    pub fn merge(&mut self, config: &Config) {
        if !self.no_config {
            self.merge_required(config);
            self.merge_optional(config);
        }
    }

    fn merge_required(&mut self, config: &Config) {
        macro_rules! merge_required {
            ($($field: ident),+) => {
                $(
                    if let Some(e) = &config.$field {
                        self.$field = e.clone();
                    }
                )+
            }
        }

        merge_required!(
            start_host, end_host, start_port, end_port, timeout, batch_size, log, log_dir,
            log_mode, greppable, accessible, json
        );
    }

    fn merge_optional(&mut self, config: &Config) {
        macro_rules! merge_optional {
            ($($field: ident),+) => {
                $(
                    if config.$field.is_some() {
                        self.$field = config.$field.clone();
                    }
                )+
            }
        }

        merge_optional!(services, ulimit);
    }
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            start_host: "127.0.0.1".to_owned(),
            end_host: "127.0.0.1".to_owned(),
            start_port: 80,
            end_port: 443,
            timeout: 300,
            batch_size: 10,
            log: false,
            log_dir: PathBuf::from("./log"),
            log_mode: LogMode::Overwrite,
            services: None,
            greppable: true,
            accessible: false,
            json: false,
            no_banner: false,
            ulimit: None,
            no_config: true,
            config_path: None,
        }
    }
}

/// Struct used to deserialize the options specified within our config file.
/// These will be further merged with our command line arguments in order to
/// generate the final Opts struct.
#[cfg(not(tarpaulin_include))]
#[derive(Debug, Deserialize)]
pub struct Config {
    start_host: Option<String>,
    end_host: Option<String>,
    start_port: Option<u16>,
    end_port: Option<u16>,
    timeout: Option<u32>,
    batch_size: Option<u16>,
    log: Option<bool>,
    log_dir: Option<PathBuf>,
    log_mode: Option<LogMode>,
    services: Option<PathBuf>,
    greppable: Option<bool>,
    accessible: Option<bool>,
    json: Option<bool>,
    ulimit: Option<u64>,
}

#[cfg(not(tarpaulin_include))]
impl Config {
    /// Reads the configuration file with TOML format and parses it into a
    /// Config struct. A missing file yields an empty configuration.
    ///
    /// # Format
    ///
    /// start_host = "192.168.0.1"
    /// end_host = "192.168.0.254"
    /// start_port = 1
    /// end_port = 1024
    /// batch_size = 500
    /// log_mode = "new"
    ///
    pub fn read(custom_config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let config_path = match custom_config_path {
            Some(path) => path,
            None => default_config_path()?,
        };

        let content = match fs::read_to_string(&config_path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("could not read {}", config_path.display())))
            }
        };

        Self::parse(&content)
            .map_err(|e| e.context(format!("in configuration file {}", config_path.display())))
    }

    fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Constructs default path to config toml
pub fn default_config_path() -> anyhow::Result<PathBuf> {
    let Some(mut config_path) = dirs::home_dir() else {
        anyhow::bail!("Could not infer config file path.");
    };
    config_path.push(".rangescan.toml");
    Ok(config_path)
}

/// The validated, immutable parameters of one run.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    start_host: Address,
    end_host: Address,
    strategy: PortStrategy,
    timeout: Duration,
    logging: bool,
}

impl ScanConfig {
    /// Validates the raw run parameters.
    ///
    /// Both hosts must parse, `start_host <= end_host`, `1 <= start_port <= end_port`,
    /// and the timeout and batch width must be non-zero.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        start_host: &str,
        end_host: &str,
        start_port: u16,
        end_port: u16,
        timeout_ms: u64,
        batch_width: u16,
        logging: bool,
    ) -> Result<Self, ScanError> {
        let start: Address = start_host.parse()?;
        let end: Address = end_host.parse()?;
        if start > end {
            return Err(ScanError::HostRangeReversed { start, end });
        }

        let range = PortRange::new(start_port, end_port)?;
        let batch_width = NonZeroU16::new(batch_width).ok_or(ScanError::ZeroBatchWidth)?;
        if timeout_ms == 0 {
            return Err(ScanError::ZeroTimeout);
        }

        Ok(Self {
            start_host: start,
            end_host: end,
            strategy: PortStrategy::new(range, batch_width),
            timeout: Duration::from_millis(timeout_ms),
            logging,
        })
    }

    /// Builds the run configuration from the merged command line options.
    pub fn from_opts(opts: &Opts) -> Result<Self, ScanError> {
        Self::new(
            &opts.start_host,
            &opts.end_host,
            opts.start_port,
            opts.end_port,
            u64::from(opts.timeout),
            opts.batch_size,
            opts.log,
        )
    }

    /// First host of the range.
    pub const fn start_host(&self) -> Address {
        self.start_host
    }

    /// Last host of the range, inclusive.
    pub const fn end_host(&self) -> Address {
        self.end_host
    }

    /// How the port range of each host is cut into windows.
    pub const fn port_strategy(&self) -> PortStrategy {
        self.strategy
    }

    /// Ports probed on every host.
    pub const fn ports(&self) -> PortRange {
        self.strategy.range()
    }

    /// Most ports probed at the same time.
    pub const fn batch_width(&self) -> u16 {
        self.strategy.batch_width().get()
    }

    /// Per-probe connection timeout.
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether host records go to the log sink.
    pub const fn logging(&self) -> bool {
        self.logging
    }

    /// Hosts covered by the run, both ends inclusive.
    #[must_use]
    pub fn host_count(&self) -> u64 {
        self.start_host.host_count(self.end_host)
    }
}
