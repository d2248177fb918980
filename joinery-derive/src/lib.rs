//! Derive macros for Joinery.
//!
//! Re-exports [`Component`](macro@Component) from `joinery-macros`.

pub use joinery_macros::Component;
