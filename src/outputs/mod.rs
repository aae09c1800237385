//! Digest outputs.
//!
//! - [`html`]: the e-mail document
//! - [`json`]: a dated JSON copy for archiving

pub mod html;
pub mod json;
