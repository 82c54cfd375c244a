//! Cache key generation.
//!
//! Keys have the form `<namespace>::<discriminator>::<fingerprint>`:
//!
//! - `namespace` partitions keys by data-source family (see
//!   [`Namespace`](super::Namespace)),
//! - `discriminator` is the normalised logical subject (a keyword, symbol or
//!   query identifier),
//! - `fingerprint` is the first 16 hex digits of an md5 digest over the
//!   normalised subject, namespace and sorted discriminators.
//!
//! Normalisation trims and lowercases every component and sorts the
//! discriminators, so logically identical requests always map to the same
//! key regardless of case or parameter order. md5 is used for its stable,
//! process-independent output (keys are persisted to disk), not for any
//! security property.

/// Separator between key components.
pub const KEY_SEPARATOR: &str = "::";

/// Length of the hex fingerprint.
pub const FINGERPRINT_LEN: usize = 16;

/// Trim and lowercase.
pub fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Deterministic fingerprint of a request.
pub fn fingerprint(subject: &str, namespace: &str, discriminators: &[&str]) -> String {
    let mut parts: Vec<String> = discriminators.iter().map(|d| normalize(d)).collect();
    parts.sort();
    let composite = format!(
        "{}|{}|{}",
        normalize(subject),
        normalize(namespace),
        parts.join(",")
    );
    let digest = format!("{:x}", md5::compute(composite.as_bytes()));
    digest[..FINGERPRINT_LEN].to_string()
}

/// Full namespaced key for a request.
///
/// ```rust
/// # use raven::cache::generate_key;
/// let a = generate_key("Bitcoin ", "reasoning", &["limit=5", "sort=gs"]);
/// let b = generate_key("bitcoin", "reasoning", &["SORT=gs", "limit=5"]);
/// assert_eq!(a, b);
/// assert!(a.starts_with("reasoning::bitcoin::"));
/// ```
pub fn generate_key(subject: &str, namespace: &str, discriminators: &[&str]) -> String {
    let discriminator = match normalize(subject) {
        s if s.is_empty() => "general".to_string(),
        s => s.replace(KEY_SEPARATOR, ":"),
    };
    format!(
        "{}{KEY_SEPARATOR}{discriminator}{KEY_SEPARATOR}{}",
        normalize(namespace),
        fingerprint(subject, namespace, discriminators)
    )
}

/// Namespace prefix of a key, or `""` for keys without one.
pub fn namespace_of(key: &str) -> &str {
    key.split_once(KEY_SEPARATOR).map_or("", |(ns, _)| ns)
}
