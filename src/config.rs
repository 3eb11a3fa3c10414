//! Global configuration management for skill402
//!
//! Configuration is merged from three layers, highest priority first:
//! - CLI flags and their environment variables
//! - A JSON config file or inline JSON string (`--config`)
//! - Built-in defaults
//!
//! Everything is read once at startup; nothing is reloaded while serving.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use clap::builder::BoolishValueParser;
use http::HeaderValue;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::catalog::{CatalogStore, ManifestEntry, PriceTable, builtin_manifest, load_manifest};
use crate::credential::CredentialIssuer;
use crate::lightning::{AnyBackend, LnbitsClient, MockBackend, TimeoutBackend};
use crate::logging::LogFormat;

pub const DEFAULT_PORT: u16 = 8402;
pub const DEFAULT_CONTENT_DIR: &str = "./skills";
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_RETENTION_SECS: u64 = 24 * 60 * 60;

// ============================================================================
// Configuration Arguments
// ============================================================================

/// Common configuration arguments (used across CLI commands)
#[derive(Args, Clone)]
pub struct ConfigArgs {
    /// Configuration file (JSON file path or JSON string).
    ///
    /// - A file path: --config skill402.json
    ///
    /// - Inline JSON: --config '{"prices":{"basic":60},"mock":true}'
    ///
    #[arg(long = "config", short = 'c', env = "SKILL402_CONFIG", value_name = "file.json or {json}")]
    pub config: Option<String>,

    /// LNbits base URL (e.g., http://lnbits:5000)
    #[arg(long = "backend-url", env = "LNBITS_URL", value_name = "http(s)://...")]
    pub backend_url: Option<String>,

    /// LNbits invoice/read key, used for payment status lookups
    #[arg(long = "invoice-key", env = "LNBITS_API_KEY", hide_env_values = true)]
    pub invoice_key: Option<String>,

    /// LNbits admin key, used to create invoices
    #[arg(long = "admin-key", env = "LNBITS_ADMIN_KEY", hide_env_values = true)]
    pub admin_key: Option<String>,

    /// Credential signing secret.
    ///
    /// If unset a random secret is generated, and credentials do not survive
    /// a restart. Generate one with `skill402 secret`.
    ///
    #[arg(long, env = "SERVER_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// Directory holding the markdown content files
    #[arg(long = "content-dir", env = "SKILLS_DIR", value_name = "DIR")]
    pub content_dir: Option<PathBuf>,

    /// Custom catalog manifest (JSON array of {id, title, tier, file})
    ///
    /// If not specified, uses the built-in skill registry.
    ///
    #[arg(long, env = "SKILL402_MANIFEST", value_name = "FILE")]
    pub manifest: Option<PathBuf>,

    /// Tier price override in sats (can be specified multiple times)
    ///
    /// Examples:
    ///
    ///   --price basic=60
    ///
    ///   --price trajectory=200
    ///
    #[arg(long, value_name = "tier=sats")]
    pub price: Vec<String>,

    /// Port to listen on (for server mode)
    #[arg(long, short = 'p', env = "PORT")]
    pub port: Option<u16>,

    /// Timeout for each payment backend call, in seconds
    #[arg(long = "backend-timeout", env = "SKILL402_BACKEND_TIMEOUT", value_name = "SECS")]
    pub backend_timeout_secs: Option<u64>,

    /// Use the in-process mock payment backend instead of LNbits.
    ///
    /// Challenges then include the invoice preimage so the flow can be
    /// completed without a Lightning wallet. Never use in production.
    ///
    #[arg(long, env = "MOCK_MODE", value_parser = BoolishValueParser::new())]
    pub mock: bool,

    /// With --mock, report every invoice as paid on its first status check
    #[arg(
        long = "mock-auto-settle",
        env = "SKILL402_MOCK_AUTO_SETTLE",
        value_parser = BoolishValueParser::new(),
        requires = "mock"
    )]
    pub mock_auto_settle: bool,

    /// Lifetime of LNbits invoices, in seconds
    #[arg(long = "invoice-expiry", env = "SKILL402_INVOICE_EXPIRY", value_name = "SECS")]
    pub invoice_expiry_secs: Option<u64>,

    /// Memo prefix on created invoices
    #[arg(long = "memo-prefix", env = "SKILL402_MEMO_PREFIX")]
    pub memo_prefix: Option<String>,

    /// Origin allowed to call the API from a browser (can be specified multiple times)
    ///
    /// If not specified, any origin is allowed.
    ///
    #[arg(long = "cors-origin", env = "SKILL402_CORS_ORIGINS", value_delimiter = ',', value_name = "ORIGIN")]
    pub cors_origins: Vec<String>,

    /// Reject credentials older than this many seconds (default: never expire)
    #[arg(long = "credential-ttl", env = "SKILL402_CREDENTIAL_TTL", value_name = "SECS")]
    pub credential_ttl_secs: Option<u64>,

    /// How long unsettled payment records are kept, in seconds
    #[arg(long = "retention", env = "SKILL402_RETENTION", value_name = "SECS")]
    pub retention_secs: Option<u64>,

    // -------------------------------------------------------------------------
    // Logging/Tracing Options
    // -------------------------------------------------------------------------

    /// Enable verbose output (INFO level logging)
    ///
    /// Default is WARN level. Use -v for INFO, -d for DEBUG.
    ///
    #[arg(short = 'v', long, env = "SKILL402_VERBOSE")]
    pub verbose: bool,

    /// Enable debug output (DEBUG level logging)
    #[arg(short = 'd', long, env = "SKILL402_DEBUG", conflicts_with = "verbose")]
    pub debug: bool,

    /// Quiet mode - only show errors
    #[arg(short = 'q', long, conflicts_with_all = ["verbose", "debug"])]
    pub quiet: bool,

    /// Silent mode - suppress all terminal log output
    ///
    /// Log file output (if configured) is unaffected.
    ///
    #[arg(long, short = 's', conflicts_with_all = ["verbose", "debug", "quiet"])]
    pub silent: bool,

    /// Log output format
    #[arg(long, short = 'L', default_value = "pretty", value_enum, env = "SKILL402_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Write debug logs to file
    #[arg(long, short = 'l', env = "SKILL402_LOG_FILE", value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

// ============================================================================
// Global Configuration
// ============================================================================

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

/// Merged configuration (file layer deserialized from JSON)
#[derive(Default, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// LNbits base URL
    pub backend_url: Option<String>,

    #[serde(deserialize_with = "deserialize_secret")]
    pub invoice_key: Option<SecretString>,

    #[serde(deserialize_with = "deserialize_secret")]
    pub admin_key: Option<SecretString>,

    /// Credential signing secret
    #[serde(deserialize_with = "deserialize_secret")]
    pub secret: Option<SecretString>,

    pub content_dir: Option<PathBuf>,

    /// Catalog manifest file; the built-in registry when unset
    pub manifest: Option<PathBuf>,

    /// Per-tier prices in sats
    pub prices: PriceTable,

    pub port: Option<u16>,

    pub backend_timeout_secs: Option<u64>,

    pub mock: bool,

    pub mock_auto_settle: bool,

    pub invoice_expiry_secs: Option<u64>,

    pub memo_prefix: Option<String>,

    /// Browser origins allowed by CORS; empty allows any
    pub cors_origins: Vec<String>,

    /// Credential lifetime; unset means pay once, use forever
    pub credential_ttl_secs: Option<u64>,

    pub retention_secs: Option<u64>,

    pub verbose: bool,
    pub debug: bool,
    pub quiet: bool,
    pub silent: bool,
    pub log_format: LogFormat,
    pub log_file: Option<PathBuf>,
}

impl std::fmt::Debug for GlobalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redacted = |s: &Option<SecretString>| s.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("GlobalConfig")
            .field("backend_url", &self.backend_url)
            .field("invoice_key", &redacted(&self.invoice_key))
            .field("admin_key", &redacted(&self.admin_key))
            .field("secret", &redacted(&self.secret))
            .field("content_dir", &self.content_dir)
            .field("manifest", &self.manifest)
            .field("prices", &self.prices)
            .field("port", &self.port)
            .field("backend_timeout_secs", &self.backend_timeout_secs)
            .field("mock", &self.mock)
            .field("invoice_expiry_secs", &self.invoice_expiry_secs)
            .field("memo_prefix", &self.memo_prefix)
            .field("cors_origins", &self.cors_origins)
            .field("credential_ttl_secs", &self.credential_ttl_secs)
            .field("retention_secs", &self.retention_secs)
            .finish_non_exhaustive()
    }
}

impl GlobalConfig {
    /// Load configuration from ConfigArgs, CLI values taking precedence over the file
    pub fn from_args(args: &ConfigArgs) -> Result<Self> {
        let mut global = if let Some(input) = &args.config {
            let json_str = load_json_string(input)?;
            serde_json::from_str(&json_str)
                .map_err(|e| anyhow::anyhow!("Failed to parse config JSON: {}", e))?
        } else {
            GlobalConfig::default()
        };

        if let Some(url) = &args.backend_url {
            global.backend_url = Some(url.clone());
        }
        if let Some(key) = &args.invoice_key {
            global.invoice_key = Some(SecretString::from(key.as_str()));
        }
        if let Some(key) = &args.admin_key {
            global.admin_key = Some(SecretString::from(key.as_str()));
        }
        if let Some(secret) = &args.secret {
            global.secret = Some(SecretString::from(secret.as_str()));
        }
        if let Some(dir) = &args.content_dir {
            global.content_dir = Some(dir.clone());
        }
        if let Some(manifest) = &args.manifest {
            global.manifest = Some(manifest.clone());
        }
        for spec in &args.price {
            global
                .prices
                .apply_override(spec)
                .map_err(|e| anyhow::anyhow!("--price {}: {}", spec, e))?;
        }
        if let Some(port) = args.port {
            global.port = Some(port);
        }
        if let Some(secs) = args.backend_timeout_secs {
            global.backend_timeout_secs = Some(secs);
        }
        if args.mock {
            global.mock = true;
        }
        if args.mock_auto_settle {
            global.mock_auto_settle = true;
        }
        if let Some(secs) = args.invoice_expiry_secs {
            global.invoice_expiry_secs = Some(secs);
        }
        if let Some(prefix) = &args.memo_prefix {
            global.memo_prefix = Some(prefix.clone());
        }
        if !args.cors_origins.is_empty() {
            global.cors_origins = args.cors_origins.clone();
        }
        if let Some(ttl) = args.credential_ttl_secs {
            global.credential_ttl_secs = Some(ttl);
        }
        if let Some(secs) = args.retention_secs {
            global.retention_secs = Some(secs);
        }

        // Override logging settings from CLI args
        if args.verbose {
            global.verbose = true;
        }
        if args.debug {
            global.debug = true;
        }
        if args.quiet {
            global.quiet = true;
        }
        if args.silent {
            global.silent = true;
        }
        // Always take log_format from CLI (it has a default value)
        global.log_format = args.log_format.clone();
        if let Some(log_file) = &args.log_file {
            global.log_file = Some(log_file.clone());
        }

        Ok(global)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn content_dir(&self) -> PathBuf {
        self.content_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONTENT_DIR))
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs.unwrap_or(DEFAULT_BACKEND_TIMEOUT_SECS))
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs.unwrap_or(DEFAULT_RETENTION_SECS))
    }

    pub fn cors_origins(&self) -> Result<Vec<HeaderValue>> {
        self.cors_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin.trim())
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin '{}': {}", origin, e))
            })
            .collect()
    }

    pub fn manifest_entries(&self) -> Result<Vec<ManifestEntry>> {
        match &self.manifest {
            Some(path) => Ok(load_manifest(path)?),
            None => Ok(builtin_manifest()),
        }
    }

    /// Load the catalog from the content directory with the configured prices
    pub fn build_catalog(&self) -> Result<Arc<CatalogStore>> {
        let manifest = self.manifest_entries()?;
        let dir = self.content_dir();
        let catalog = CatalogStore::load(&dir, &manifest, &self.prices)
            .map_err(|e| anyhow::anyhow!("Failed to load catalog from {}: {}", dir.display(), e))?;
        Ok(Arc::new(catalog))
    }

    /// Select the payment backend; every call is bounded by the backend timeout
    pub fn build_backend(&self) -> Result<TimeoutBackend<AnyBackend>> {
        let timeout = self.backend_timeout();
        let backend = if self.mock {
            tracing::warn!("Mock payment backend enabled, invoices are not real");
            if self.mock_auto_settle {
                AnyBackend::Mock(MockBackend::auto_settling())
            } else {
                AnyBackend::Mock(MockBackend::new())
            }
        } else {
            let Some(url) = &self.backend_url else {
                anyhow::bail!("No payment backend configured: set --backend-url (LNBITS_URL) or use --mock");
            };
            let (Some(invoice_key), Some(admin_key)) = (&self.invoice_key, &self.admin_key) else {
                anyhow::bail!("LNbits requires both --invoice-key (LNBITS_API_KEY) and --admin-key (LNBITS_ADMIN_KEY)");
            };
            let mut client = LnbitsClient::try_new(url, invoice_key.clone(), admin_key.clone())?
                .with_timeout(timeout);
            if let Some(secs) = self.invoice_expiry_secs {
                client = client.with_invoice_expiry(secs);
            }
            AnyBackend::Lnbits(client)
        };
        Ok(TimeoutBackend::new(backend, timeout))
    }

    /// Credential issuer keyed with the configured secret, or a random one
    pub fn build_issuer(&self) -> Result<CredentialIssuer> {
        match &self.secret {
            Some(secret) => Ok(CredentialIssuer::new(secret)?),
            None => {
                tracing::warn!("No signing secret configured, credentials will not survive a restart");
                Ok(CredentialIssuer::random())
            }
        }
    }

    /// Initialize tracing/logging based on configuration
    ///
    /// Call this once early in main(), after all merging is done.
    pub fn init_tracing(&self) {
        crate::logging::init_tracing(crate::logging::TracingConfig {
            verbose: self.verbose,
            debug: self.debug,
            quiet: self.quiet,
            silent: self.silent,
            format: self.log_format.clone(),
            log_file: self.log_file.clone(),
        });
    }
}

// ============================================================================
// Configuration Loading
// ============================================================================

/// Load JSON from either a file path or an inline JSON string
fn load_json_string(input: &str) -> Result<String> {
    if input.trim_start().starts_with('{') {
        return Ok(input.to_string());
    }
    let path = std::path::Path::new(input);
    if path.exists() {
        std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read file '{}': {}", path.display(), e))
    } else {
        anyhow::bail!("Config file '{}' not found", input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: ConfigArgs,
    }

    fn parse(args: &[&str]) -> GlobalConfig {
        let cli = TestCli::try_parse_from(std::iter::once("skill402").chain(args.iter().copied())).unwrap();
        GlobalConfig::from_args(&cli.config).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert_eq!(config.port(), DEFAULT_PORT);
        assert_eq!(config.content_dir(), PathBuf::from(DEFAULT_CONTENT_DIR));
        assert_eq!(config.prices, PriceTable::default());
        assert_eq!(config.credential_ttl_secs, None);
        assert_eq!(config.retention(), Duration::from_secs(DEFAULT_RETENTION_SECS));
    }

    #[test]
    fn test_cli_overrides_inline_json() {
        let config = parse(&[
            "--config",
            r#"{"port": 9000, "prices": {"basic": 10, "trajectory": 300}, "secret": "from-file"}"#,
            "--port",
            "9100",
            "--price",
            "basic=20",
            "--invoice-expiry",
            "600",
            "--memo-prefix",
            "shop",
        ]);
        assert_eq!(config.port(), 9100);
        assert_eq!(config.invoice_expiry_secs, Some(600));
        assert_eq!(config.memo_prefix.as_deref(), Some("shop"));
        assert_eq!(config.prices.basic, 20);
        assert_eq!(config.prices.trajectory, 300);
        assert!(config.secret.is_some());
    }

    #[test]
    fn test_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skill402.json");
        std::fs::write(&path, r#"{"mock": true, "credential_ttl_secs": 600}"#).unwrap();
        let config = parse(&["--config", path.to_str().unwrap()]);
        assert!(config.mock);
        assert_eq!(config.credential_ttl_secs, Some(600));
    }

    #[test]
    fn test_mock_mode_env_values() {
        use clap::{CommandFactory, FromArgMatches};

        let var = "SKILL402_TEST_MOCK_MODE_VALUES";
        let mock_from_env = |value: &str| -> Result<bool, clap::Error> {
            // SAFETY: no other test reads or writes this variable
            unsafe { std::env::set_var(var, value) };
            let matches = TestCli::command()
                .mut_arg("mock", |arg| arg.env(var))
                .try_get_matches_from(["skill402"])?;
            Ok(TestCli::from_arg_matches(&matches)?.config.mock)
        };

        for on in ["true", "True", "TRUE", "1", "yes"] {
            assert!(mock_from_env(on).unwrap(), "{on}");
        }
        for off in ["false", "False", "0", "no"] {
            assert!(!mock_from_env(off).unwrap(), "{off}");
        }
        assert!(mock_from_env("sometimes").is_err());
        unsafe { std::env::remove_var(var) };
    }

    #[test]
    fn test_cors_origins() {
        let config = parse(&[]);
        assert!(config.cors_origins().unwrap().is_empty());

        let config = parse(&[
            "--cors-origin",
            "https://agent.example",
            "--cors-origin",
            "http://localhost:3000",
        ]);
        let origins = config.cors_origins().unwrap();
        assert_eq!(
            origins,
            vec![
                HeaderValue::from_static("https://agent.example"),
                HeaderValue::from_static("http://localhost:3000"),
            ]
        );

        // A control character cannot appear in a header value
        let config = parse(&["--config", r#"{"cors_origins": ["bad\norigin"]}"#]);
        assert!(config.cors_origins().is_err());
    }

    #[test]
    fn test_bad_price_override() {
        let cli = TestCli::try_parse_from(["skill402", "--price", "gold=1"]).unwrap();
        assert!(GlobalConfig::from_args(&cli.config).is_err());
    }

    #[test]
    fn test_backend_selection() {
        let config = parse(&["--mock"]);
        assert!(config.build_backend().unwrap().inner().is_mock());

        let config = parse(&[]);
        assert!(config.build_backend().is_err());

        let config = parse(&[
            "--backend-url",
            "http://lnbits:5000",
            "--invoice-key",
            "inv",
            "--admin-key",
            "adm",
        ]);
        assert!(!config.build_backend().unwrap().inner().is_mock());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = parse(&["--secret", "super-secret-value", "--admin-key", "admin-value"]);
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret-value"));
        assert!(!debug.contains("admin-value"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_issuer_from_secret() {
        let config = parse(&["--secret", "abc"]);
        assert!(config.build_issuer().is_ok());
        let config = parse(&["--secret", ""]);
        assert!(config.build_issuer().is_err());
    }
}
