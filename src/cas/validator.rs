//! CAS ticket validator.

use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::config::{ProtocolVersion, ValidatorConfig};
use super::error::{ConfigError, TransportError};
use super::response::{parse_response, ValidationOutcome};

/// Validates service tickets against a single CAS server.
///
/// Holds only immutable configuration and a pooled HTTP client, so one
/// instance can serve any number of concurrent validations.
#[derive(Debug, Clone)]
pub struct Validator {
    /// Parsed CAS server base URL
    base_url: Url,
    /// Wire format, fixed at construction
    protocol: ProtocolVersion,
    /// Default service URL
    service: Option<String>,
    /// HTTP client
    http_client: reqwest::Client,
}

impl Validator {
    /// Create a validator. Fails if the base URL is missing, not HTTPS,
    /// or has no host.
    pub fn new(config: ValidatorConfig) -> Result<Self, ConfigError> {
        let base_url = config.parsed_base_url()?;
        Self::from_parts(&config, base_url)
    }

    fn from_parts(config: &ValidatorConfig, base_url: Url) -> Result<Self, ConfigError> {
        let protocol = config.protocol()?;

        // One GET per validation: a 3xx is reported, never followed.
        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .danger_accept_invalid_certs(config.skip_tls_verify);
        if config.request_timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.request_timeout_secs));
        }
        let http_client = builder.build().map_err(ConfigError::HttpClient)?;

        if config.skip_tls_verify {
            warn!(
                base_url = %base_url,
                "TLS certificate verification disabled for CAS server"
            );
        }

        Ok(Self {
            base_url,
            protocol,
            service: config.service.clone(),
            http_client,
        })
    }

    /// Wire format in use.
    pub fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    /// CAS server base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build the validation request URL:
    /// `{base}/{validate|serviceValidate}?ticket=..&service=..[&renew=1]`.
    ///
    /// An empty `service` falls back to the configured default.
    pub fn validation_url(
        &self,
        ticket: &str,
        service: Option<&str>,
        renew: bool,
    ) -> Result<Url, ConfigError> {
        if ticket.is_empty() {
            return Err(ConfigError::EmptyTicket);
        }

        let service = service
            .filter(|s| !s.is_empty())
            .or(self.service.as_deref())
            .ok_or(ConfigError::MissingService)?;

        let mut url = self.base_url.clone();
        let path = format!(
            "{}/{}",
            self.base_url.path().trim_end_matches('/'),
            self.protocol.endpoint()
        );
        url.set_path(&path);
        url.set_query(None);
        url.set_fragment(None);

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("ticket", ticket);
            query.append_pair("service", service);
            if renew {
                query.append_pair("renew", "1");
            }
        }

        Ok(url)
    }

    /// Validate a service ticket.
    ///
    /// `Err` is returned only for call-time configuration problems, before
    /// any request is made. Every other result, including network failures,
    /// is reported through the returned [`ValidationOutcome`].
    pub async fn validate(
        &self,
        ticket: &str,
        service: Option<&str>,
        renew: bool,
    ) -> Result<ValidationOutcome, ConfigError> {
        let url = self.validation_url(ticket, service, renew)?;

        debug!(
            endpoint = %self.protocol.endpoint(),
            protocol = %self.protocol,
            host = ?url.host_str(),
            renew = renew,
            "Validating CAS service ticket"
        );

        let outcome = match self.fetch(url).await {
            Ok(body) => parse_response(self.protocol, &body),
            Err(e) => e.into(),
        };

        match &outcome {
            ValidationOutcome::Success(principal) => {
                info!(
                    username = %principal.username,
                    attributes = principal.attributes.len(),
                    "CAS ticket validated"
                );
            }
            ValidationOutcome::Failure { code, message } => {
                warn!(code = ?code, message = ?message, "CAS ticket rejected");
            }
            ValidationOutcome::TransportError(e) => {
                warn!(error = %e, "CAS ticket validation failed");
            }
        }

        Ok(outcome)
    }

    /// Issue the GET and read the whole body. Non-2xx statuses are errors.
    async fn fetch(&self, url: Url) -> Result<String, TransportError> {
        let response = self.http_client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            // Best-effort body read
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status { status, body });
        }

        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{any, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SERVICE: &str = "https://app.example.com/auth/cas/login";

    const SUCCESS: &str = r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
    <cas:authenticationSuccess>
        <cas:user>alice</cas:user>
        <cas:attributes>
            <cas:email>alice@example.com</cas:email>
        </cas:attributes>
    </cas:authenticationSuccess>
</cas:serviceResponse>"#;

    const FAILURE: &str = r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
    <cas:authenticationFailure code="INVALID_TICKET">Ticket ST-1 not recognized</cas:authenticationFailure>
</cas:serviceResponse>"#;

    fn test_config(base_url: String, protocol_version: f32) -> ValidatorConfig {
        ValidatorConfig {
            protocol_version,
            service: Some(SERVICE.to_string()),
            ..ValidatorConfig::new(base_url)
        }
    }

    /// Validator against a plain-HTTP mock server, bypassing the scheme check.
    fn mock_validator(server: &MockServer, protocol_version: f32) -> Validator {
        let config = test_config(format!("{}/cas", server.uri()), protocol_version);
        let base_url = Url::parse(&config.base_url).unwrap();
        Validator::from_parts(&config, base_url).unwrap()
    }

    #[test]
    fn test_rejects_insecure_base_url() {
        let result = Validator::new(test_config("http://cas.example.com".to_string(), 2.0));
        assert!(matches!(result, Err(ConfigError::InsecureScheme(_))));

        let result = Validator::new(ValidatorConfig::default());
        assert!(matches!(result, Err(ConfigError::MissingBaseUrl)));
    }

    #[test]
    fn test_construction() {
        let validator =
            Validator::new(test_config("https://cas.example.com/cas".to_string(), 2.0)).unwrap();
        assert_eq!(validator.protocol(), ProtocolVersion::V2);
        assert_eq!(validator.base_url().port_or_known_default(), Some(443));

        let mut config = test_config("https://cas.example.com:8443/cas".to_string(), 1.0);
        config.skip_tls_verify = true;
        let validator = Validator::new(config).unwrap();
        assert_eq!(validator.protocol(), ProtocolVersion::V1);
        assert_eq!(validator.base_url().port(), Some(8443));
    }

    #[test]
    fn test_validation_url() {
        let validator =
            Validator::new(test_config("https://cas.example.com/cas/".to_string(), 2.0)).unwrap();

        let url = validator.validation_url("ST-1", None, false).unwrap();
        assert_eq!(
            url.as_str(),
            "https://cas.example.com/cas/serviceValidate?ticket=ST-1&service=https%3A%2F%2Fapp.example.com%2Fauth%2Fcas%2Flogin"
        );

        let url = validator
            .validation_url("ST-1", Some("https://other.example.com/"), true)
            .unwrap();
        assert_eq!(
            url.query(),
            Some("ticket=ST-1&service=https%3A%2F%2Fother.example.com%2F&renew=1")
        );

        let validator =
            Validator::new(test_config("https://cas.example.com".to_string(), 1.0)).unwrap();
        let url = validator.validation_url("ST-2", None, false).unwrap();
        assert_eq!(url.path(), "/validate");
    }

    #[test]
    fn test_validation_url_requires_ticket_and_service() {
        let validator =
            Validator::new(ValidatorConfig::new("https://cas.example.com/cas")).unwrap();

        assert!(matches!(
            validator.validation_url("", Some(SERVICE), false),
            Err(ConfigError::EmptyTicket)
        ));
        assert!(matches!(
            validator.validation_url("ST-1", None, false),
            Err(ConfigError::MissingService)
        ));
        assert!(matches!(
            validator.validation_url("ST-1", Some(""), false),
            Err(ConfigError::MissingService)
        ));
    }

    #[tokio::test]
    async fn test_v2_success() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/cas/serviceValidate"))
            .and(query_param("ticket", "ST-1"))
            .and(query_param("service", SERVICE))
            .and(query_param_is_missing("renew"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SUCCESS))
            .expect(1)
            .mount(&server)
            .await;

        let validator = mock_validator(&server, 2.0);
        let outcome = validator.validate("ST-1", None, false).await.unwrap();

        let principal = outcome.principal().expect("success");
        assert_eq!(principal.username, "alice");
        assert_eq!(principal.attribute("email"), Some("alice@example.com"));
    }

    #[tokio::test]
    async fn test_v2_failure() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/cas/serviceValidate"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FAILURE))
            .expect(1)
            .mount(&server)
            .await;

        let validator = mock_validator(&server, 2.0);
        match validator.validate("ST-1", None, false).await.unwrap() {
            ValidationOutcome::Failure { code, message } => {
                assert_eq!(code.as_deref(), Some("INVALID_TICKET"));
                assert_eq!(message.as_deref(), Some("Ticket ST-1 not recognized"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_v1_with_renew() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/cas/validate"))
            .and(query_param("ticket", "ST-2"))
            .and(query_param("service", "https://other.example.com/"))
            .and(query_param("renew", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("yes\nalice\n"))
            .expect(1)
            .mount(&server)
            .await;

        let validator = mock_validator(&server, 1.0);
        let outcome = validator
            .validate("ST-2", Some("https://other.example.com/"), true)
            .await
            .unwrap();

        assert_eq!(outcome.username(), Some("alice"));
    }

    #[tokio::test]
    async fn test_v1_no() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/cas/validate"))
            .respond_with(ResponseTemplate::new(200).set_body_string("no\n"))
            .expect(1)
            .mount(&server)
            .await;

        let validator = mock_validator(&server, 1.0);
        let outcome = validator.validate("ST-3", None, false).await.unwrap();

        assert!(matches!(
            outcome,
            ValidationOutcome::Failure {
                code: None,
                message: None
            }
        ));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/cas/serviceValidate"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .expect(1)
            .mount(&server)
            .await;

        let validator = mock_validator(&server, 2.0);
        match validator.validate("ST-1", None, false).await.unwrap() {
            ValidationOutcome::TransportError(TransportError::Status { status, body }) => {
                assert_eq!(status.as_u16(), 500);
                assert_eq!(body, "Internal Server Error");
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_redirect_is_transport_error() {
        let server = MockServer::start().await;
        let elsewhere = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/cas/serviceValidate"))
            .respond_with(ResponseTemplate::new(302).insert_header(
                "Location",
                format!("{}/cas/serviceValidate?ticket=ST-1", elsewhere.uri()).as_str(),
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_body_string(SUCCESS))
            .expect(0)
            .mount(&elsewhere)
            .await;

        let validator = mock_validator(&server, 2.0);
        match validator.validate("ST-1", None, false).await.unwrap() {
            ValidationOutcome::TransportError(TransportError::Status { status, .. }) => {
                assert_eq!(status.as_u16(), 302);
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_transport_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops"))
            .mount(&server)
            .await;

        let validator = mock_validator(&server, 2.0);
        let outcome = validator.validate("ST-1", None, false).await.unwrap();

        match outcome {
            ValidationOutcome::TransportError(err) => assert_eq!(err.body(), Some("<html>oops")),
            other => panic!("expected transport error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_error() {
        let config = test_config("http://127.0.0.1:1/cas".to_string(), 2.0);
        let base_url = Url::parse(&config.base_url).unwrap();
        let validator = Validator::from_parts(&config, base_url).unwrap();

        let outcome = validator.validate("ST-1", None, false).await.unwrap();
        assert!(matches!(
            outcome,
            ValidationOutcome::TransportError(TransportError::Request(_))
        ));
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(SUCCESS)
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let mut config = test_config(format!("{}/cas", server.uri()), 2.0);
        config.request_timeout_secs = 1;
        let base_url = Url::parse(&config.base_url).unwrap();
        let validator = Validator::from_parts(&config, base_url).unwrap();

        match validator.validate("ST-1", None, false).await.unwrap() {
            ValidationOutcome::TransportError(TransportError::Request(e)) => {
                assert!(e.is_timeout())
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_config_errors_issue_no_request() {
        let server = MockServer::start().await;

        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_body_string(SUCCESS))
            .expect(0)
            .mount(&server)
            .await;

        let validator = mock_validator(&server, 2.0);
        assert!(matches!(
            validator.validate("", None, false).await,
            Err(ConfigError::EmptyTicket)
        ));

        let mut config = ValidatorConfig::new(format!("{}/cas", server.uri()));
        config.service = None;
        let base_url = Url::parse(&config.base_url).unwrap();
        let validator = Validator::from_parts(&config, base_url).unwrap();
        assert!(matches!(
            validator.validate("ST-1", None, false).await,
            Err(ConfigError::MissingService)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_validations() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("ticket", "ST-good"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SUCCESS))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("ticket", "ST-bad"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FAILURE))
            .expect(1)
            .mount(&server)
            .await;

        let validator = mock_validator(&server, 2.0);
        let other = validator.clone();

        let (good, bad) = tokio::join!(
            validator.validate("ST-good", None, false),
            other.validate("ST-bad", None, false),
        );

        assert_eq!(good.unwrap().username(), Some("alice"));
        assert!(matches!(bad.unwrap(), ValidationOutcome::Failure { .. }));
    }
}
