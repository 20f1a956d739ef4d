//! # Pushcamp Core
//!
//! Shared foundation for the pushcamp campaign runner: the immutable run
//! configuration, the error taxonomy, the directory snapshot types, and the
//! `ProviderGateway` contract every identity-provider backend implements.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{PushCampError, Result};
pub use traits::ProviderGateway;
