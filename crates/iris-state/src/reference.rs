//! Claim references.

/// Next claim reference for a normalized record id.
///
/// A trailing `-NN` numeric suffix is incremented; anything else gets
/// `-02`, the original counting as the first. Suffixes below 10 are
/// zero-padded to two digits.
///
/// ```
/// use iris_state::generate_next_reference;
///
/// assert_eq!(generate_next_reference("123XLAS"), ("123XLAS-02".to_string(), 2));
/// assert_eq!(generate_next_reference("123XLAS-09"), ("123XLAS-10".to_string(), 10));
/// ```
pub fn generate_next_reference(reference: &str) -> (String, u32) {
    let (base, next) = match reference.rsplit_once('-') {
        Some((base, suffix)) if !base.is_empty() && is_number(suffix) => {
            match suffix.parse::<u32>() {
                Ok(n) => (base, n.saturating_add(1)),
                Err(_) => (reference, 2),
            }
        }
        _ => (reference, 2),
    };
    (format!("{base}-{next:02}"), next)
}

fn is_number(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
