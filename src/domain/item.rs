//! Purchased items.

use serde::{Deserialize, Serialize};

/// One purchase listed on the "My Downloads" page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchasedItem {
    /// URL of the item's download page
    pub url: String,

    /// Archive directory name, e.g. `005-modern-titles`
    pub name: String,
}

/// Keep only the explicitly requested item, or everything when none was named
pub fn filter_items(items: Vec<PurchasedItem>, wanted: Option<&str>) -> Vec<PurchasedItem> {
    match wanted {
        None => items,
        Some(name) => items.into_iter().filter(|item| item.name == name).collect(),
    }
}
