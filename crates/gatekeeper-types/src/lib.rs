//! Core type definitions for the gatekeeper content store.
//!
//! Shared by the storage engine and by anything sitting in front of it:
//! the record pointer ([`Location`]), store construction parameters
//! ([`StoreConfig`]), and the URL key transform ([`normalize_url`]).

pub mod config;
pub mod key;
pub mod location;

pub use config::StoreConfig;
pub use key::normalize_url;
pub use location::Location;
