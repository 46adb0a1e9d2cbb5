mod report;

use clap::{Args, Parser, Subcommand, ValueEnum};
use ocsp_proto::{
    fetch_status, AllRespondersFailedError, Certificate, ConfigError, DecodeError, HashAlgorithm,
    NoncePolicy, OcspConfig,
};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// OCSP Client - RFC 6960 certificate status checker
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "ocsp-client")]
struct Cli {
    /// Log level filter (overridden by RUST_LOG)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch and validate the OCSP status of a certificate
    Fetch(FetchArgs),
}

#[derive(Args, Debug)]
struct FetchArgs {
    /// Certificate to check (PEM or DER)
    #[arg(value_name = "SUBJECT")]
    subject: PathBuf,

    /// Certificate of the subject's issuer (PEM or DER)
    #[arg(value_name = "ISSUER")]
    issuer: PathBuf,

    /// Skip TLS certificate validation of HTTPS responders
    #[arg(long)]
    insecure: bool,

    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// HTTP timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Do not send a nonce
    #[arg(long, conflicts_with = "require_nonce")]
    no_nonce: bool,

    /// Reject responses that do not echo the nonce
    #[arg(long)]
    require_nonce: bool,

    /// CertID hash algorithm
    #[arg(long, value_enum)]
    hash: Option<HashArg>,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum HashArg {
    Sha1,
    Sha256,
}

impl From<HashArg> for HashAlgorithm {
    fn from(value: HashArg) -> Self {
        match value {
            HashArg::Sha1 => HashAlgorithm::Sha1,
            HashArg::Sha256 => HashAlgorithm::Sha256,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to decode {}: {source}", .path.display())]
    Decode { path: PathBuf, source: DecodeError },

    #[error(transparent)]
    Fetch(#[from] AllRespondersFailedError),

    #[error("failed to render report: {0}")]
    Json(#[from] serde_json::Error),
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match cli.command {
        Command::Fetch(args) => run_fetch(&args),
    };

    if let Err(e) = result {
        error!("OCSP check failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run_fetch(args: &FetchArgs) -> Result<(), CliError> {
    let config = build_config(args)?;
    let subject = load_certificate(&args.subject)?;
    let issuer = load_certificate(&args.issuer)?;

    info!(
        subject = %subject.subject(),
        serial = %subject.serial_number(),
        responders = subject.ocsp_urls().len(),
        "Checking certificate status"
    );

    let response = fetch_status(&subject, &issuer, &config)?;

    match args.format {
        OutputFormat::Text => print!("{}", report::render_text(&response)),
        OutputFormat::Json => println!("{}", report::render_json(&response)?),
    }
    Ok(())
}

/// Load the configuration file (if any) and overlay command line flags
fn build_config(args: &FetchArgs) -> Result<OcspConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => OcspConfig::from_file(path)?,
        None => OcspConfig::default(),
    };

    if args.insecure {
        config.accept_invalid_tls_certs = true;
    }
    if let Some(timeout) = args.timeout {
        config.http_timeout_secs = timeout;
    }
    if args.no_nonce {
        config.include_nonce = false;
    }
    if args.require_nonce {
        config.include_nonce = true;
        config.nonce_policy = NoncePolicy::Require;
    }
    if let Some(hash) = args.hash {
        config.hash_algorithm = hash.into();
    }

    Ok(config)
}

fn load_certificate(path: &Path) -> Result<Certificate, CliError> {
    let bytes = std::fs::read(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Certificate::parse(&bytes).map_err(|source| CliError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn fetch_args(argv: &[&str]) -> FetchArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Command::Fetch(args) => args,
        }
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = fetch_args(&["ocsp-client", "fetch", "leaf.pem", "ca.pem"]);
        assert_eq!(args.subject, PathBuf::from("leaf.pem"));
        assert_eq!(args.format, OutputFormat::Text);

        let config = build_config(&args).unwrap();
        assert_eq!(config, OcspConfig::default());
    }

    #[test]
    fn test_flags_overlay_config() {
        let args = fetch_args(&[
            "ocsp-client",
            "fetch",
            "leaf.pem",
            "ca.pem",
            "--insecure",
            "--timeout",
            "3",
            "--require-nonce",
            "--hash",
            "sha256",
            "--format",
            "json",
        ]);

        let config = build_config(&args).unwrap();
        assert!(config.accept_invalid_tls_certs);
        assert_eq!(config.http_timeout_secs, 3);
        assert_eq!(config.nonce_policy, NoncePolicy::Require);
        assert_eq!(config.hash_algorithm, HashAlgorithm::Sha256);
        assert_eq!(args.format, OutputFormat::Json);
    }

    #[test]
    fn test_no_nonce() {
        let args = fetch_args(&["ocsp-client", "fetch", "a", "b", "--no-nonce"]);
        assert!(!build_config(&args).unwrap().include_nonce);
    }

    #[test]
    fn test_nonce_flags_conflict() {
        let result = Cli::try_parse_from([
            "ocsp-client",
            "fetch",
            "a",
            "b",
            "--no-nonce",
            "--require-nonce",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_log_level() {
        let cli = Cli::try_parse_from(["ocsp-client", "fetch", "a", "b", "--log-level", "debug"])
            .unwrap();
        assert_eq!(cli.log_level, "debug");
    }

    #[test]
    fn test_missing_certificate_file() {
        let path = PathBuf::from("/nonexistent/leaf.pem");
        let err = load_certificate(&path).unwrap_err();
        assert!(matches!(err, CliError::Read { .. }));
        assert!(err.to_string().contains("/nonexistent/leaf.pem"));
    }

    #[test]
    fn test_missing_config_file() {
        let args = fetch_args(&[
            "ocsp-client",
            "fetch",
            "a",
            "b",
            "--config",
            "/nonexistent/config.json",
        ]);
        assert!(matches!(build_config(&args), Err(CliError::Config(_))));
    }
}
