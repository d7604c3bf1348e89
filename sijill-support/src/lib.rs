//! # Sijill Support
//!
//! Shared utilities for the Sijill registry crates.
//!
//! This crate provides:
//! - Text rendering for build and resolution error messages
//! - Type-name shortening and "did you mean?" suggestions

pub mod rendering;
