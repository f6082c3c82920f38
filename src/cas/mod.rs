//! CAS service-ticket validation.
//!
//! Validates service tickets against a CAS server using either the
//! protocol v1 plain-text endpoint (`/validate`) or the v2 XML endpoint
//! (`/serviceValidate`).

pub mod config;
pub mod error;
pub mod response;
pub mod validator;

pub use config::{ProtocolVersion, ValidatorConfig, ValidatorConfigJson};
pub use error::{ConfigError, TransportError};
pub use response::{CasPrincipal, ValidationOutcome};
pub use validator::Validator;
