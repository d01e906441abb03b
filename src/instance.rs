//! Tenant identity (spec.md §3 `InstanceKey`).

use smol_str::SmolStr;
use std::fmt;

/// Opaque tenant identity. Cheap to clone and hash — every domain cache
/// embeds one in its composite keys (spec.md §3: "the substrate itself is
/// not multi-tenant aware").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct InstanceKey(SmolStr);

impl InstanceKey {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(SmolStr::new(raw.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl From<&str> for InstanceKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for InstanceKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
