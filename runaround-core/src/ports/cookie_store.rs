//! Cookie store port

/// Request-scoped cookie access
///
/// `set` is visible to later `get` calls on the same store, the way a
/// response cookie shadows the request cookie of the same name.
pub trait CookieStore: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;

    fn set(&self, name: &str, value: &str);
}
