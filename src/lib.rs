//! CAS Ticket Validator
//!
//! Client side of the Central Authentication Service validation protocol:
//! confirms a service ticket with the CAS server and extracts the
//! authenticated username and any extended attributes.

pub mod cas;

pub use cas::{
    CasPrincipal, ConfigError, ProtocolVersion, TransportError, ValidationOutcome, Validator,
    ValidatorConfig, ValidatorConfigJson,
};
