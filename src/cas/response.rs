//! CAS validation response parsing.
//!
//! Protocol v1 answers with a plain-text body (`no\n` or `yes\n<user>\n`).
//! Protocol v2 answers with an XML `cas:serviceResponse` document holding
//! either `cas:authenticationSuccess` or `cas:authenticationFailure`.

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fmt;

use super::config::ProtocolVersion;
use super::error::TransportError;

/// Authenticated principal extracted from a successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CasPrincipal {
    pub username: String,
    /// Extended attributes (v2 `cas:attributes`). Empty for v1.
    pub attributes: HashMap<String, Vec<String>>,
}

impl CasPrincipal {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            attributes: HashMap::new(),
        }
    }

    /// First value of an attribute.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// Result of one validation attempt.
#[derive(Debug)]
pub enum ValidationOutcome {
    /// The CAS server accepted the ticket.
    Success(CasPrincipal),
    /// The CAS server rejected the ticket (`no` or `authenticationFailure`).
    Failure {
        code: Option<String>,
        message: Option<String>,
    },
    /// No definitive answer could be obtained from the CAS server.
    TransportError(TransportError),
}

impl ValidationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ValidationOutcome::Success(_))
    }

    pub fn principal(&self) -> Option<&CasPrincipal> {
        match self {
            ValidationOutcome::Success(principal) => Some(principal),
            _ => None,
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.principal().map(|p| p.username.as_str())
    }

    fn rejected() -> Self {
        ValidationOutcome::Failure {
            code: None,
            message: None,
        }
    }
}

impl From<TransportError> for ValidationOutcome {
    fn from(err: TransportError) -> Self {
        ValidationOutcome::TransportError(err)
    }
}

/// Parse a validation response body for the given protocol version.
///
/// A v1 body that is neither `no` nor `yes` followed by a username is
/// re-parsed as XML, which then reports what is wrong with it.
pub fn parse_response(protocol: ProtocolVersion, body: &str) -> ValidationOutcome {
    if protocol == ProtocolVersion::V1 {
        if let Some(outcome) = parse_plain_text(body) {
            return outcome;
        }
    }

    match parse_service_response(body) {
        Ok(outcome) => outcome,
        Err(err) => err.into(),
    }
}

/// Parse a v1 plain-text body. `None` when the body matches neither form.
fn parse_plain_text(body: &str) -> Option<ValidationOutcome> {
    let mut lines = body.split('\n').map(|line| line.trim_end_matches('\r'));

    match lines.next() {
        Some("no") => Some(ValidationOutcome::rejected()),
        Some("yes") => lines
            .next()
            .filter(|username| !username.is_empty())
            .map(|username| ValidationOutcome::Success(CasPrincipal::new(username))),
        _ => None,
    }
}

/// `cas:serviceResponse` document. Element names match by local name, so
/// any prefix bound to the CAS namespace is accepted.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceResponse {
    authentication_success: Option<AuthenticationSuccess>,
    authentication_failure: Option<AuthenticationFailure>,
}

#[derive(Debug, Deserialize)]
struct AuthenticationSuccess {
    user: Option<String>,
    #[serde(default)]
    attributes: CasAttributes,
}

#[derive(Debug, Deserialize)]
struct AuthenticationFailure {
    #[serde(rename = "@code", default)]
    code: Option<String>,
    #[serde(rename = "$text", default)]
    message: Option<String>,
}

/// Children of `cas:attributes`, keyed by element name. Repeated elements
/// accumulate into one list.
#[derive(Debug, Default)]
struct CasAttributes(HashMap<String, Vec<String>>);

impl<'de> Deserialize<'de> for CasAttributes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AttributesVisitor;

        impl<'de> Visitor<'de> for AttributesVisitor {
            type Value = CasAttributes;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a cas:attributes element")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut attributes: HashMap<String, Vec<String>> = HashMap::new();
                while let Some(name) = map.next_key::<String>()? {
                    let values: Vec<String> = map.next_value()?;
                    // XML attributes and namespace bindings on the element itself
                    if name.starts_with('@') {
                        continue;
                    }
                    attributes
                        .entry(name)
                        .or_default()
                        .extend(values.into_iter().map(|v| v.trim().to_string()));
                }
                Ok(CasAttributes(attributes))
            }
        }

        deserializer.deserialize_map(AttributesVisitor)
    }
}

/// Parse a v2 `serviceResponse` document.
fn parse_service_response(body: &str) -> Result<ValidationOutcome, TransportError> {
    let response: ServiceResponse =
        quick_xml::de::from_str(body).map_err(|e| TransportError::MalformedBody {
            reason: e.to_string(),
            body: body.to_string(),
        })?;

    if let Some(success) = response.authentication_success {
        let username = success
            .user
            .as_deref()
            .map(str::trim)
            .filter(|username| !username.is_empty())
            .ok_or(TransportError::MissingUsername)?;

        return Ok(ValidationOutcome::Success(CasPrincipal {
            username: username.to_string(),
            attributes: success.attributes.0,
        }));
    }

    if let Some(failure) = response.authentication_failure {
        let message = failure
            .message
            .as_deref()
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .map(str::to_string);
        return Ok(ValidationOutcome::Failure {
            code: failure.code,
            message,
        });
    }

    Err(TransportError::UnrecognizedShape {
        body: body.to_string(),
    })
}
