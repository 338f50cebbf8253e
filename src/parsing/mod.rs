//! Readers for reconstruction files.
//!
//! Reconstructions are stored in the SWC format: one sample point per line,
//! seven whitespace separated fields.
//!
//! | Field | Description | Form |
//! |-------|-------------|------|
//! | id    | Sample identifier | unsigned integer |
//! | type  | Structure type (soma, axon, dendrite, ...) | unsigned integer |
//! | x y z | Position | decimal, optionally negative |
//! | radius | Radius at the sample | unsigned decimal |
//! | parent | Identifier of the parent sample, `-1` for the root | integer |
//!
//! Lines starting with `#` are comments.
//!
//! ## Example
//!
//! ```rust
//! use diadem_metric::parsing::swc::parse_swc_text;
//!
//! let text = "# soma\n1 1 0 0 0 2.5 -1\n2 3 10 0 0 1 1\n";
//! let records = parse_swc_text(text, "inline.swc", 1.0).unwrap();
//! assert_eq!(records.len(), 2);
//! assert_eq!(records[1].parent_id, 1);
//! ```

pub mod swc;
