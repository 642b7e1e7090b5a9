//! Acquire temporary AWS credentials by logging into Okta with Duo push as
//! the second factor and exchanging the resulting SAML assertion with STS.

pub mod aws;
pub mod cli;
pub mod commands;
pub mod config;
pub mod constants;
pub mod error;
pub mod idp;
pub mod provider;
pub mod saml;

pub use error::{Error, Result};
pub use provider::{CredentialsResult, Provider};
