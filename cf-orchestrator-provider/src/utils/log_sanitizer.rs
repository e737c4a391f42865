//! Log sanitization utilities
//!
//! Keeps API tokens and large response bodies (rule expressions, record
//! listings) out of debug/error logs.

/// Maximum number of bytes kept by [`truncate_for_log`].
const TRUNCATE_LIMIT: usize = 256;

/// Visible prefix length for [`mask_token`].
const TOKEN_VISIBLE_PREFIX: usize = 4;

/// MSRV-compatible replacement for `str::floor_char_boundary`.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        s.len()
    } else {
        let mut i = index;
        while i > 0 && !s.is_char_boundary(i) {
            i -= 1;
        }
        i
    }
}

/// Truncate a string for safe logging, noting the original length.
pub fn truncate_for_log(s: &str) -> String {
    if s.len() <= TRUNCATE_LIMIT {
        s.to_string()
    } else {
        format!(
            "{}... [truncated, total {} bytes]",
            &s[..floor_char_boundary(s, TRUNCATE_LIMIT)],
            s.len()
        )
    }
}

/// Mask an API token, keeping a short prefix so operators can tell tokens apart.
pub fn mask_token(token: &str) -> String {
    if token.len() <= TOKEN_VISIBLE_PREFIX * 2 {
        return "****".to_string();
    }
    format!(
        "{}****",
        &token[..floor_char_boundary(token, TOKEN_VISIBLE_PREFIX)]
    )
}
