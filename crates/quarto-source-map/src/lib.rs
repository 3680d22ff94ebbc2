//! Source positions for Quarto's text parsers
//!
//! This crate provides the position types shared by parsers that need to
//! report errors against raw text: a [`Location`] (byte offset plus row and
//! column), a [`Range`] between two locations, and the conversion from byte
//! offsets to full locations.
//!
//! # Example
//!
//! ```rust
//! use quarto_source_map::{offset_to_location, Location};
//!
//! let source = "# Hello\nWorld";
//! let loc = offset_to_location(source, 9).unwrap();
//! assert_eq!(loc, Location { offset: 9, row: 1, column: 1 });
//! ```

pub mod types;
pub mod utils;

// Re-export main types
pub use types::{Location, Range};
pub use utils::{offset_to_location, range_from_offsets};
