use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::{DevTokenTerm, LegacyCredentials};

/// docs-auth - keeps an API documentation UI authorized during development
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Base URL of the API serving the documentation UI
    #[arg(short = 'u', long, env = "DOCS_AUTH_BASE_URL", default_value = "http://localhost:8080")]
    pub base_url: String,

    /// Path to the SQLite token store
    #[arg(short = 's', long, env = "DOCS_AUTH_STORE")]
    pub store: Option<String>,

    /// Prefix required in front of the token in the authorization field
    #[arg(long, env = "DOCS_AUTH_PREFIX", default_value = "Bearer ")]
    pub prefix: String,

    /// Email used by the legacy login endpoint
    #[arg(long, env = "DOCS_AUTH_LEGACY_EMAIL", default_value = "test@autocoin.com")]
    pub legacy_email: String,

    /// Password used by the legacy login endpoint
    #[arg(long, env = "DOCS_AUTH_LEGACY_PASSWORD", default_value = "Test1234!")]
    pub legacy_password: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Check the stored token once and print its status
    Status,
    /// Log in (test login, then legacy login) and store the token
    Login,
    /// Apply the stored token to the in-memory authorization dialog and print the
    /// resulting Authorization header (no browser is driven)
    Apply,
    /// Fetch a development token and store it
    DevToken {
        #[arg(long, value_enum, default_value = "long")]
        term: TermArg,
    },
    /// Keep checking the token; read `apply`, `login`, `dialog` or `quit` from stdin.
    /// Applies go to the in-memory authorization dialog
    Watch,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq)]
pub enum TermArg {
    Long,
    Short,
}

impl From<TermArg> for DevTokenTerm {
    fn from(term: TermArg) -> Self {
        match term {
            TermArg::Long => DevTokenTerm::LongTerm,
            TermArg::Short => DevTokenTerm::ShortTerm,
        }
    }
}

/// Named waits of the lifecycle, each letting the UI settle after an action
#[derive(Clone, Debug, PartialEq)]
pub struct Timings {
    /// After load, before the first status check
    pub initial_settle: Duration,
    /// Between periodic status checks
    pub status_interval: Duration,
    /// After load, before applying an already stored token
    pub auto_apply_delay: Duration,
    /// After a failed test login, before trying the legacy login
    pub legacy_fallback_delay: Duration,
    /// After a successful login, before applying the new token
    pub apply_after_login_delay: Duration,
    /// After activating the authorize trigger, for the dialog to open
    pub dialog_open_delay: Duration,
    /// After confirming, before closing the dialog
    pub dialog_close_delay: Duration,
    /// How long "token applied" stays before the status is shown again
    pub applied_notice_duration: Duration,
    /// How long the focus hint stays next to the input
    pub hint_duration: Duration,
    /// Presence checks while waiting for a dialog element
    pub element_poll_attempts: u32,
    pub element_poll_interval: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            initial_settle: Duration::from_millis(1000),
            status_interval: Duration::from_millis(10_000),
            auto_apply_delay: Duration::from_millis(2000),
            legacy_fallback_delay: Duration::from_millis(2000),
            apply_after_login_delay: Duration::from_millis(1000),
            dialog_open_delay: Duration::from_millis(300),
            dialog_close_delay: Duration::from_millis(500),
            applied_notice_duration: Duration::from_millis(2000),
            hint_duration: Duration::from_millis(3000),
            element_poll_attempts: 10,
            element_poll_interval: Duration::from_millis(100),
        }
    }
}

impl Timings {
    /// Defaults, overridden by `*_MS` environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            initial_settle: env_millis("INITIAL_SETTLE_MS", defaults.initial_settle),
            status_interval: env_millis("STATUS_INTERVAL_MS", defaults.status_interval),
            auto_apply_delay: env_millis("AUTO_APPLY_DELAY_MS", defaults.auto_apply_delay),
            legacy_fallback_delay: env_millis(
                "LEGACY_FALLBACK_DELAY_MS",
                defaults.legacy_fallback_delay,
            ),
            apply_after_login_delay: env_millis(
                "APPLY_AFTER_LOGIN_DELAY_MS",
                defaults.apply_after_login_delay,
            ),
            dialog_open_delay: env_millis("DIALOG_OPEN_DELAY_MS", defaults.dialog_open_delay),
            dialog_close_delay: env_millis("DIALOG_CLOSE_DELAY_MS", defaults.dialog_close_delay),
            applied_notice_duration: env_millis(
                "APPLIED_NOTICE_MS",
                defaults.applied_notice_duration,
            ),
            hint_duration: env_millis("HINT_DURATION_MS", defaults.hint_duration),
            element_poll_attempts: std::env::var("ELEMENT_POLL_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.element_poll_attempts),
            element_poll_interval: env_millis(
                "ELEMENT_POLL_INTERVAL_MS",
                defaults.element_poll_interval,
            ),
        }
    }
}

fn env_millis(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

#[derive(Clone, Debug)]
pub struct Config {
    // Endpoints
    pub base_url: String,
    pub http_request_timeout: u64,

    // Token handling
    pub token_prefix: String,
    pub store_path: PathBuf,
    pub legacy_credentials: LegacyCredentials,

    // Timings
    pub timings: Timings,

    // Logging
    pub log_level: String,
}

impl Config {
    /// Build configuration with priority: CLI > ENV > defaults
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let store_path = match &args.store {
            Some(path) => expand_tilde(path),
            None => default_store_path().context(
                "Could not determine a data directory (use -s or set DOCS_AUTH_STORE)",
            )?,
        };

        Ok(Config {
            base_url: args.base_url.trim_end_matches('/').to_string(),
            http_request_timeout: args.http_timeout,
            token_prefix: args.prefix.clone(),
            store_path,
            legacy_credentials: LegacyCredentials {
                email: args.legacy_email.clone(),
                password: args.legacy_password.clone(),
            },
            timings: Timings::from_env(),
            log_level: args.log_level.clone(),
        })
    }

    /// Load `.env`, parse CLI arguments and build the configuration
    pub fn load() -> Result<(Self, Option<Command>)> {
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();
        let config = Self::from_args(&args)?;
        Ok((config, args.command))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            anyhow::bail!(
                "DOCS_AUTH_BASE_URL must start with http:// or https://: {}",
                self.base_url
            );
        }

        if self.token_prefix.is_empty() {
            anyhow::bail!("DOCS_AUTH_PREFIX cannot be empty");
        }

        if self.timings.status_interval.is_zero() {
            anyhow::bail!("STATUS_INTERVAL_MS must be greater than zero");
        }

        Ok(())
    }
}

/// Default store location under the user's data directory
fn default_store_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("docs-auth").join("store.sqlite3"))
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("docs-auth").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_expand_tilde() {
        let path = expand_tilde("~/test/store.sqlite3");
        assert!(path.to_string_lossy().contains("test/store.sqlite3"));
        assert!(!path.to_string_lossy().starts_with("~"));

        let path = expand_tilde("/absolute/path");
        assert_eq!(path, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_expand_tilde_just_tilde() {
        let path = expand_tilde("~");
        assert_eq!(path, PathBuf::from("~"));
    }

    #[test]
    fn test_default_timings() {
        let timings = Timings::default();
        assert_eq!(timings.status_interval, Duration::from_secs(10));
        assert_eq!(timings.initial_settle, Duration::from_secs(1));
        assert_eq!(timings.dialog_open_delay, Duration::from_millis(300));
        assert_eq!(timings.dialog_close_delay, Duration::from_millis(500));
        assert_eq!(timings.hint_duration, Duration::from_secs(3));
    }

    #[test]
    fn test_apply_help_names_in_memory_dialog() {
        use clap::CommandFactory;

        let cli = CliArgs::command();
        for name in ["apply", "watch"] {
            let about = cli
                .find_subcommand(name)
                .and_then(|sub| sub.get_about())
                .map(|about| about.to_string())
                .unwrap_or_default();
            assert!(about.contains("in-memory"), "{}: {}", name, about);
        }
    }

    #[test]
    fn test_timings_from_env_overrides() {
        std::env::set_var("DIALOG_OPEN_DELAY_MS", "750");
        std::env::set_var("ELEMENT_POLL_ATTEMPTS", "25");
        std::env::set_var("HINT_DURATION_MS", "not-a-number");

        let timings = Timings::from_env();

        std::env::remove_var("DIALOG_OPEN_DELAY_MS");
        std::env::remove_var("ELEMENT_POLL_ATTEMPTS");
        std::env::remove_var("HINT_DURATION_MS");

        assert_eq!(timings.dialog_open_delay, Duration::from_millis(750));
        assert_eq!(timings.element_poll_attempts, 25);
        // Unparseable values keep the default
        assert_eq!(timings.hint_duration, Duration::from_secs(3));
        assert_eq!(timings.status_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_cli_defaults() {
        let args = parse(&["--store", "/tmp/docs-auth.sqlite3", "status"]);
        let config = Config::from_args(&args).unwrap();

        assert_eq!(args.command, Some(Command::Status));
        assert_eq!(config.token_prefix, "Bearer ");
        assert_eq!(config.legacy_credentials.email, "test@autocoin.com");
        assert_eq!(config.store_path, PathBuf::from("/tmp/docs-auth.sqlite3"));
        config.validate().unwrap();
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let args = parse(&["-u", "http://localhost:9000/", "-s", "/tmp/x.sqlite3"]);
        let config = Config::from_args(&args).unwrap();
        assert_eq!(config.base_url, "http://localhost:9000");
    }

    #[test]
    fn test_dev_token_term() {
        let args = parse(&["-s", "/tmp/x.sqlite3", "dev-token", "--term", "short"]);
        assert_eq!(
            args.command,
            Some(Command::DevToken {
                term: TermArg::Short
            })
        );
        assert_eq!(DevTokenTerm::from(TermArg::Short), DevTokenTerm::ShortTerm);
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let args = parse(&["-u", "localhost:8080", "-s", "/tmp/x.sqlite3"]);
        let config = Config::from_args(&args).unwrap();
        assert!(config.validate().is_err());
    }
}
