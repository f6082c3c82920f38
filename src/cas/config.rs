//! CAS validator configuration.

use serde::{Deserialize, Serialize};
use url::Url;

use super::error::ConfigError;

/// Wire format selected by the configured protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    /// CAS 1.0: `/validate`, plain-text `yes`/`no` body.
    V1,
    /// CAS 2.0 and later: `/serviceValidate`, XML `serviceResponse` body.
    V2,
}

impl ProtocolVersion {
    /// Map a numeric protocol version onto a wire format.
    pub fn from_number(version: f32) -> Result<Self, ConfigError> {
        if !version.is_finite() || version < 1.0 {
            return Err(ConfigError::UnsupportedProtocolVersion(version));
        }
        if version < 2.0 {
            Ok(Self::V1)
        } else {
            Ok(Self::V2)
        }
    }

    /// Validation endpoint path segment on the CAS server.
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::V1 => "validate",
            Self::V2 => "serviceValidate",
        }
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolVersion::V1 => write!(f, "1.0"),
            ProtocolVersion::V2 => write!(f, "2.0"),
        }
    }
}

/// CAS validator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidatorConfig {
    /// CAS server base URL. Must be HTTPS.
    /// Example: "https://cas.example.com/cas"
    #[serde(default)]
    pub base_url: String,

    /// CAS protocol version. Anything below 2.0 uses the v1 plain-text endpoint.
    #[serde(default = "default_protocol_version")]
    pub protocol_version: f32,

    /// Default service URL, used when a validation call does not name one.
    #[serde(default)]
    pub service: Option<String>,

    /// Accept self-signed or otherwise unverifiable server certificates.
    #[serde(default)]
    pub skip_tls_verify: bool,

    /// Whole-request timeout in seconds. 0 disables the timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_protocol_version() -> f32 {
    2.0
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            protocol_version: default_protocol_version(),
            service: None,
            skip_tls_verify: false,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ValidatorConfig {
    /// Config pointing at `base_url` with every other field defaulted.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.protocol()?;
        self.parsed_base_url()?;
        Ok(())
    }

    /// Wire format for the configured protocol version.
    pub fn protocol(&self) -> Result<ProtocolVersion, ConfigError> {
        ProtocolVersion::from_number(self.protocol_version)
    }

    /// Parse and check the base URL: HTTPS with a non-empty host.
    pub(crate) fn parsed_base_url(&self) -> Result<Url, ConfigError> {
        let raw = self.base_url.trim_end();
        if raw.is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }

        let url = Url::parse(raw)?;
        if url.scheme() != "https" {
            return Err(ConfigError::InsecureScheme(url.scheme().to_string()));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingHost);
        }

        Ok(url)
    }
}

/// JSON configuration overlay; every field is optional.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct ValidatorConfigJson {
    pub base_url: Option<String>,
    pub protocol_version: Option<f32>,
    pub service: Option<String>,
    pub skip_tls_verify: Option<bool>,
    pub request_timeout_secs: Option<u64>,
}

impl ValidatorConfigJson {
    /// Apply JSON config to existing config.
    pub fn apply_to(&self, config: &mut ValidatorConfig) {
        if let Some(ref base_url) = self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(version) = self.protocol_version {
            config.protocol_version = version;
        }
        if let Some(ref service) = self.service {
            config.service = Some(service.clone());
        }
        if let Some(skip) = self.skip_tls_verify {
            config.skip_tls_verify = skip;
        }
        if let Some(timeout) = self.request_timeout_secs {
            config.request_timeout_secs = timeout;
        }
    }
}
