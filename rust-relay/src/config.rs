//! Configuration module for environment variable parsing.
//!
//! Everything is read once at startup into an immutable [`Config`] that the
//! web layer shares behind an `Arc`. Request handling never mutates it.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// Default scope requested for the Graph client-credentials grant.
pub const GRAPH_DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// SMTP relay settings (STARTTLS + login).
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

/// Microsoft Graph client-credentials settings.
#[derive(Clone)]
pub struct GraphConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    /// Identity endpoint base, e.g. `https://login.microsoftonline.com`
    pub authority_url: String,
    /// Graph API base, e.g. `https://graph.microsoft.com/v1.0`
    pub api_url: String,
}

/// Which mail channel delivers notifications. Only one is ever active.
#[derive(Clone, Default)]
pub enum MailChannelConfig {
    #[default]
    Disabled,
    Smtp(SmtpConfig),
    Graph(GraphConfig),
}

impl MailChannelConfig {
    pub fn name(&self) -> &'static str {
        match self {
            MailChannelConfig::Disabled => "none",
            MailChannelConfig::Smtp(_) => "smtp",
            MailChannelConfig::Graph(_) => "graph",
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Path the event sender posts to
    pub webhook_path: String,

    /// Shared secret expected from the event sender
    pub api_key: Option<String>,

    /// Header carrying the shared secret (`x-api-key` or `Authorization`)
    pub api_key_header: String,

    /// Sender address for notifications
    pub email_from: String,

    /// Static recipient list for notifications
    pub email_to: Vec<String>,

    /// Active mail channel
    pub mail: MailChannelConfig,

    /// Directory downloaded documents are saved to
    pub storage_dir: PathBuf,

    /// Whether fetched documents are written to `storage_dir`
    pub save_documents: bool,

    /// Whether `GET /download/{filename}` serves `storage_dir`
    pub serve_downloads: bool,

    /// Timeout for every outbound call, in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 10000,
            webhook_path: "/safesend-webhook".to_string(),
            api_key: None,
            api_key_header: "x-api-key".to_string(),
            email_from: "noreply@yourfirm.com".to_string(),
            email_to: Vec::new(),
            mail: MailChannelConfig::Disabled,
            storage_dir: PathBuf::from("signed_returns"),
            save_documents: true,
            serve_downloads: false,
            request_timeout_ms: 30_000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            port: parse_env("PORT", defaults.port),

            // "/" is reserved for the liveness route
            webhook_path: non_empty_var("WEBHOOK_PATH")
                .map(|raw| normalize_path(&raw))
                .filter(|path| path != "/")
                .unwrap_or(defaults.webhook_path),

            api_key: non_empty_var("API_KEY"),

            api_key_header: non_empty_var("API_KEY_HEADER")
                .unwrap_or(defaults.api_key_header)
                .to_ascii_lowercase(),

            email_from: non_empty_var("EMAIL_FROM").unwrap_or(defaults.email_from),

            email_to: parse_csv("EMAIL_TO").unwrap_or_default(),

            mail: mail_channel_from_env(),

            storage_dir: non_empty_var("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),

            save_documents: parse_bool("SAVE_DOCUMENTS", defaults.save_documents),

            serve_downloads: parse_bool("SERVE_DOWNLOADS", defaults.serve_downloads),

            request_timeout_ms: parse_env("REQUEST_TIMEOUT_MS", defaults.request_timeout_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

// Secrets stay out of startup logs and panics.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("webhook_path", &self.webhook_path)
            .field("api_key_configured", &self.api_key.is_some())
            .field("api_key_header", &self.api_key_header)
            .field("email_from", &self.email_from)
            .field("email_to", &self.email_to)
            .field("mail_channel", &self.mail.name())
            .field("storage_dir", &self.storage_dir)
            .field("save_documents", &self.save_documents)
            .field("serve_downloads", &self.serve_downloads)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

/// Resolve the mail channel from `MAIL_CHANNEL`, or auto-detect it from
/// whichever credentials are present.
fn mail_channel_from_env() -> MailChannelConfig {
    let requested = non_empty_var("MAIL_CHANNEL").map(|v| v.to_ascii_lowercase());

    let channel = match requested.as_deref() {
        Some("smtp") => "smtp",
        Some("graph") => "graph",
        Some("none") => "none",
        Some(other) => {
            warn!(
                env_var = "MAIL_CHANNEL",
                value = %other,
                "Unknown mail channel, disabling delivery"
            );
            "none"
        }
        None if non_empty_var("SMTP_HOST").is_some() => "smtp",
        None if non_empty_var("GRAPH_TENANT_ID").is_some() => "graph",
        None => "none",
    };

    match channel {
        "smtp" => match non_empty_var("SMTP_HOST") {
            Some(host) => MailChannelConfig::Smtp(SmtpConfig {
                host,
                port: parse_env("SMTP_PORT", 587),
                username: env::var("SMTP_USERNAME").unwrap_or_default(),
                password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            }),
            None => {
                warn!(
                    env_var = "SMTP_HOST",
                    "SMTP channel selected without a host, disabling delivery"
                );
                MailChannelConfig::Disabled
            }
        },
        "graph" => {
            let tenant_id = non_empty_var("GRAPH_TENANT_ID");
            let client_id = non_empty_var("GRAPH_CLIENT_ID");
            let client_secret = non_empty_var("GRAPH_CLIENT_SECRET");

            match (tenant_id, client_id, client_secret) {
                (Some(tenant_id), Some(client_id), Some(client_secret)) => {
                    MailChannelConfig::Graph(GraphConfig {
                        tenant_id,
                        client_id,
                        client_secret,
                        authority_url: non_empty_var("GRAPH_AUTHORITY_URL")
                            .unwrap_or_else(|| "https://login.microsoftonline.com".to_string()),
                        api_url: non_empty_var("GRAPH_API_URL")
                            .unwrap_or_else(|| "https://graph.microsoft.com/v1.0".to_string()),
                    })
                }
                (tenant, client, secret) => {
                    warn!(
                        has_tenant_id = tenant.is_some(),
                        has_client_id = client.is_some(),
                        has_client_secret = secret.is_some(),
                        "Graph channel selected with incomplete credentials, disabling delivery"
                    );
                    MailChannelConfig::Disabled
                }
            }
        }
        _ => MailChannelConfig::Disabled,
    }
}

/// Read a variable, treating blank values as unset.
fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a variable into `T`, falling back to `default` when unset or invalid.
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                warn!(env_var = name, value = %raw, "Invalid value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// Parse a boolean flag such as "true", "1", "yes", "off".
fn parse_bool(name: &str, default: bool) -> bool {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => {
            warn!(env_var = name, value = %raw, "Invalid boolean, using default");
            default
        }
    }
}

/// Parse a comma-separated list of strings.
fn parse_csv(name: &str) -> Option<Vec<String>> {
    env::var(name).ok().map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

/// Ensure the webhook path starts with a single slash.
fn normalize_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    format!("/{}", trimmed)
}
