//! Archive targets.
//!
//! A target is the idempotence key of the whole tool: once a file named
//! `<base_name>.<anything>` exists under `<site>/<item>/`, the target is
//! considered captured and is never downloaded again.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one archived file by (site, item, base name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArchiveTarget {
    /// Configured site name (first directory below the archive root)
    pub site: String,

    /// Purchased item name (second directory below the archive root)
    pub item: String,

    /// Descriptive file name without extension
    pub base_name: String,
}

impl ArchiveTarget {
    /// Create a new target
    pub fn new(
        site: impl Into<String>,
        item: impl Into<String>,
        base_name: impl Into<String>,
    ) -> Self {
        Self {
            site: site.into(),
            item: item.into(),
            base_name: base_name.into(),
        }
    }
}

impl fmt::Display for ArchiveTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.site, self.item, self.base_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_joins_components() {
        let target = ArchiveTarget::new("busy-boxx", "005-modern-titles", "intro-clip");
        assert_eq!(target.to_string(), "busy-boxx/005-modern-titles/intro-clip");
    }
}
