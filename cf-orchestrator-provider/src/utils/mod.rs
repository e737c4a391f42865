//! Utility modules.

/// Log sanitization so response bodies and tokens never land in logs verbatim.
pub mod log_sanitizer;
