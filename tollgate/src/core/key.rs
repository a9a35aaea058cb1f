//! Bucket key composition
//!
//! Keys must be collision-resistant: a collision silently merges two
//! principals' quotas. Both components are length-prefixed so no choice of
//! identity and resource strings can render the same key.

use std::fmt;

/// Storage key for one (identity, resource) bucket
///
/// The tier is a runtime parameter, not part of the key, so changing an
/// identity's tier takes effect on its existing bucket immediately.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey(String);

impl BucketKey {
    /// Render the storage key for an identity/resource pair
    ///
    /// Pure and deterministic: `rl:<len>:<identity>:<len>:<resource>`.
    /// The length prefixes keep `("a:b", "c")` and `("a", "b:c")` distinct
    /// even though both contain the same separator bytes.
    pub fn new(identity: &str, resource: &str) -> Self {
        BucketKey(format!(
            "rl:{}:{}:{}:{}",
            identity.len(),
            identity,
            resource.len(),
            resource
        ))
    }

    /// The rendered key string handed to the store
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
