//! HTTP handlers for the federation surface.

pub mod federation;

pub use federation::*;
