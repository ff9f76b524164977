//! Generic filesystem structures
//!
//! Implements generic filesystem structures.

pub mod attributes;
pub mod cluster;
pub mod filename;
pub mod files;

/// Path separator.
pub const SEPARATOR: char = '/';

/// Directory depth a path may have.
pub const MAX_DEPTH: usize = 20;
