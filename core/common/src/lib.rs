//! Common utilities and types shared across GenPwd modules.
//!
//! This module provides the error taxonomy and the secret-holding
//! types used throughout the codebase.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{SecretBytes, SecretString};
