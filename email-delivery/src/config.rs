use anyhow::Result;
use std::str::FromStr;
use url::Url;

pub const DEFAULT_SUBJECT: &str = "News for you";
pub const DEFAULT_TEXT_PART: &str = "Here's what you need to know";

/// Deployment stage; only production actually sends mail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    Production,
    Beta,
    #[default]
    Local,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown stage '{0}', expected production, beta or local")]
pub struct UnknownStage(pub String);

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" => Ok(Stage::Production),
            "beta" => Ok(Stage::Beta),
            "local" => Ok(Stage::Local),
            other => Err(UnknownStage(other.to_string())),
        }
    }
}

impl Stage {
    /// Read `STAGE`, defaulting to local when unset.
    pub fn from_env() -> Result<Self> {
        match std::env::var("STAGE") {
            Ok(value) => Ok(value.parse()?),
            Err(_) => Ok(Stage::Local),
        }
    }
}

#[derive(Clone)]
pub struct EmailerConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub use_tls: bool,
    pub from_address: String,
    pub from_name: String,
    pub subject: String,
    pub text_part: String,
}

impl EmailerConfig {
    /// Parse an SMTP endpoint URI.
    /// Expected URI format: smtp://username@server:port?tls=true
    pub fn from_uri(uri: &str, password: &str, from_address: &str, from_name: &str) -> Result<Self> {
        let parsed_uri = Url::parse(uri)
            .map_err(|e| anyhow::anyhow!("Invalid SMTP URI '{}': {}", uri, e))?;

        if parsed_uri.scheme() != "smtp" {
            return Err(anyhow::anyhow!("URI must use 'smtp://' scheme, got: {}", parsed_uri.scheme()));
        }

        let server = parsed_uri.host_str()
            .ok_or_else(|| anyhow::anyhow!("No server specified in URI: {}", uri))?
            .to_string();

        // Submission port with STARTTLS unless told otherwise
        let port = parsed_uri.port().unwrap_or(587);

        let username = {
            let user = parsed_uri.username();
            if !user.is_empty() {
                user.to_string()
            } else {
                from_address.to_string()
            }
        };

        let use_tls = parsed_uri.query_pairs()
            .find(|(key, _)| key == "tls")
            .map(|(_, value)| value.parse().unwrap_or(true))
            .unwrap_or(true);

        Ok(Self {
            server,
            port,
            username,
            password: password.to_string(),
            use_tls,
            from_address: from_address.to_string(),
            from_name: from_name.to_string(),
            subject: DEFAULT_SUBJECT.to_string(),
            text_part: DEFAULT_TEXT_PART.to_string(),
        })
    }

    /// Build from `SMTP_URI`, `SMTP_PASSWORD`, `EMAIL_FROM` and `EMAIL_FROM_NAME`.
    pub fn from_env() -> Result<Self> {
        let uri = std::env::var("SMTP_URI")
            .map_err(|_| anyhow::anyhow!("SMTP_URI must be set to send email"))?;
        let password = std::env::var("SMTP_PASSWORD").unwrap_or_default();
        let from_address = std::env::var("EMAIL_FROM")
            .map_err(|_| anyhow::anyhow!("EMAIL_FROM must be set to send email"))?;
        let from_name = std::env::var("EMAIL_FROM_NAME").unwrap_or_else(|_| "Portfolio Digest".to_string());
        Self::from_uri(&uri, &password, &from_address, &from_name)
    }
}
