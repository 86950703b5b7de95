//! Cache key derivation for outbound calls.

use serde::Serialize;

/// Cache key identifying one outbound call.
///
/// Two calls share a key when they name the same action and their parameters
/// serialize to the same compact JSON. Field order follows the parameter
/// type's `Serialize` impl, so use structs or ordered maps for stable keys.
///
/// # Example
/// ```
/// use request_governor::CacheKey;
/// use serde_json::json;
///
/// let key = CacheKey::derive("generate_image", &json!({"prompt": "a cat"})).unwrap();
/// assert_eq!(key.as_str(), r#"generate_image:{"prompt":"a cat"}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive a key from an action name and its parameters.
    ///
    /// # Errors
    /// Returns the serialization error if `params` cannot be encoded as JSON.
    pub fn derive<P: Serialize + ?Sized>(action: &str, params: &P) -> Result<Self, serde_json::Error> {
        let params = serde_json::to_string(params)?;
        let mut key = String::with_capacity(action.len() + 1 + params.len());
        key.push_str(action);
        key.push(':');
        key.push_str(&params);
        Ok(Self(key))
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the key, returning the underlying string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}
