#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Address search and resolution for the location-edit screen.
//!
//! Turns free text into ranked address candidates and map positions into
//! short labels:
//!
//! - [`search::AddressSearch`] runs the cache and the provider waterfall,
//!   then ranks with [`scorer`]
//! - [`reverse::ReverseResolver`] formats reverse-geocoded placemarks
//! - [`debounce::Debouncer`] keeps both paths to one live query each
//! - [`session::LocationSession`] ties them to the search box and map, and
//!   hands the confirmed location back through [`handoff::Handoff`]
//!
//! Provider failures never surface as errors here; they show up as empty
//! results. [`LocateError`] covers the conditions the user has to act on.

pub mod cache;
pub mod config;
pub mod debounce;
pub mod handoff;
pub mod location;
pub mod reverse;
pub mod scorer;
pub mod search;
pub mod session;

#[cfg(test)]
mod testing;

pub use config::EngineConfig;
pub use handoff::{Handoff, LocationOutcome};
pub use reverse::ReverseResolver;
pub use search::{AddressSearch, SearchQuery};
pub use session::{LocationSession, SessionEvents};

use thiserror::Error;

/// Errors surfaced to the location-edit screen.
#[derive(Debug, Error)]
pub enum LocateError {
    /// The user refused location permission.
    #[error("Location permission denied")]
    PermissionDenied,

    /// An explicit search or selection found nothing.
    #[error("No address found for '{query}'")]
    GeocodeNotFound {
        /// The text or label that was searched.
        query: String,
    },

    /// The device could not produce a position.
    #[error("Current position unavailable: {message}")]
    PositionUnavailable {
        /// Platform-provided reason.
        message: String,
    },

    /// The visit already ended with a confirm or cancel.
    #[error("Location was already handed off")]
    HandoffSettled,

    /// The session was closed.
    #[error("Location session closed")]
    Closed,
}
