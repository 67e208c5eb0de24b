//! Centralized configuration constants.
//!
//! Import constants from this module rather than defining them locally:
//!
//! ```ignore
//! use crate::config::{ALIGNMENT, DEFAULT_BUFFER_CAPACITY};
//! ```

mod constants;

pub use constants::*;
