//! Ready-made key hashers for [`LimiterBuilder::hasher`](crate::LimiterBuilder::hasher).
//!
//! A hasher turns a key into the string that follows `label:` in the bucket id. Anything that
//! is `Fn(&K) -> String + Send + Sync` works; these cover the common cases.

/// Use the key's own text as the id suffix.
///
/// ```rust
/// assert_eq!(bucketeer::hash::identity(&String::from("alice")), "alice");
/// ```
pub fn identity<K>(key: &K) -> String
where
    K: AsRef<str> + ?Sized,
{
    key.as_ref().to_owned()
}

/// Use the key's `Display` form as the id suffix.
///
/// ```rust
/// assert_eq!(bucketeer::hash::display(&42u32), "42");
/// ```
pub fn display<K>(key: &K) -> String
where
    K: std::fmt::Display + ?Sized,
{
    key.to_string()
}
