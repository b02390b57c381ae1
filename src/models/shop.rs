use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A purchasable catalog item, persisted in `shop_items.json`.
///
/// The catalog is an ordered list: substring matches resolve to the first
/// item in list order, so the order users see is the order that wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopItem {
    pub id: String,
    pub name: String,
    pub price: i64,
    pub description: String,
}

/// One (user, item) inventory slot, persisted in `user_inventory.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub quantity: u32,
    pub acquired_at: DateTime<Utc>,
}

/// Transient overlay notification for a used item.
///
/// Lives for five seconds; expired notices are pruned lazily whenever a new
/// one is added and filtered out of every snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ItemUseNotice {
    pub username: String,
    pub item_name: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of a successful purchase, for the chat reply
#[derive(Debug, Clone)]
pub struct PurchaseReceipt {
    pub item_name: String,
    pub price: i64,
    pub balance: i64,
}
