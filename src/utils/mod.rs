//! Shared helpers for input validation and numeric conversion.

pub mod validation;
