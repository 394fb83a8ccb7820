//! Validation of names used as path components and URL segments.

/// Characters that may never appear in a name that ends up in a path or URL.
const UNSAFE_CHARS: &[char] = &['.', '/', '\\', ':', '$', '"', '\'', '`', '%'];

/// Returns `true` if `s` can be used as a single path component and URL
/// segment without escaping.
///
/// # Example
///
/// ```
/// use wheelvend_schema::is_safe_name;
///
/// assert!(is_safe_name("cffi"));
/// assert!(is_safe_name("linux-gnu"));
/// assert!(!is_safe_name("../etc"));
/// assert!(!is_safe_name("a$b"));
/// ```
pub fn is_safe_name(s: &str) -> bool {
    !s.contains(UNSAFE_CHARS)
}
