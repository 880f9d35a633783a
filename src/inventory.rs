use crate::catalog::{
    GiftDefinition,
    Rarity,
};
use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

/// Unique per acquisition: the same gift won twice yields two ids.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(gift_id: &str, seq: u64) -> Self {
        Self(format!("{gift_id}-{seq}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of a gift taken when it was won; later catalog edits do not
/// reach owned items.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: ItemId,
    pub gift_id: String,
    pub case_id: String,
    pub name: String,
    pub rarity: Rarity,
    pub image_url: String,
    pub value: u64,
    pub obtained_at: DateTime<Utc>,
}

impl InventoryItem {
    pub fn from_gift(
        id: ItemId,
        case_id: &str,
        gift: &GiftDefinition,
        obtained_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            gift_id: gift.id.clone(),
            case_id: case_id.to_string(),
            name: gift.name.clone(),
            rarity: gift.rarity,
            image_url: gift.image_url.clone(),
            value: gift.value,
            obtained_at,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Inventory {
    items: Vec<InventoryItem>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<InventoryItem>) -> Self {
        Self { items }
    }

    pub fn add(&mut self, item: InventoryItem) {
        self.items.push(item);
    }

    /// Insertion order, oldest first.
    pub fn list(&self) -> &[InventoryItem] {
        &self.items
    }

    pub fn newest_first(&self) -> impl Iterator<Item = &InventoryItem> {
        self.items.iter().rev()
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn total_value(&self) -> u64 {
        self.items
            .iter()
            .fold(0u64, |acc, item| acc.saturating_add(item.value))
    }
}
