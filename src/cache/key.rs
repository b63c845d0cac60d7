//! Cache Key Module
//!
//! Derives the cache key of an evaluation from its flag key and user id.

/// Placeholder written into the key when no user id is given.
pub const ANONYMOUS_USER: &str = "null";

/// Treats an empty user id as absent.
///
/// The evaluation API cannot tell the two apart (the `user` query parameter
/// is omitted either way), so neither can the cache.
pub fn normalize_user_id(user_id: Option<&str>) -> Option<&str> {
    user_id.filter(|id| !id.is_empty())
}

/// Builds the cache key `"{flag_key}:{user_id}"`.
///
/// An absent or empty user id is written as `null`. A caller whose real user
/// id is the literal string `"null"` therefore shares the anonymous entry;
/// this aliasing is kept so keys stay compatible with other SDKs.
pub fn cache_key(flag_key: &str, user_id: Option<&str>) -> String {
    format!(
        "{}:{}",
        flag_key,
        normalize_user_id(user_id).unwrap_or(ANONYMOUS_USER)
    )
}
