//! Shared plumbing for the bridge workspace.
//!
//! This crate contains the pieces every other crate in the workspace leans
//! on. It has no business logic of its own.
//!
//! ## Architecture
//!
//! - **common** (this crate): shared error plumbing
//! - **bridge-core**: connection manager and wire protocol
//! - **bridge-monitor**: CLI wiring everything together
//!
//! This layered architecture keeps concerns separated and makes testing easier.

pub mod error;

pub use error::error_location::ErrorLocation;

#[cfg(test)]
mod tests;
