//! # Joinery Support
//!
//! Shared utilities for the Joinery crates.
//!
//! This crate provides:
//! - Type-name shortening and lookup-name derivation
//! - Text rendering for error messages

pub mod naming;
pub mod rendering;
