use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::engine::{GameError, PointLedger};
use crate::models::{InventoryEntry, ItemUseNotice, PurchaseReceipt, ShopItem};

/// How long an item-use notice stays on the overlay
const NOTICE_LIFETIME_SECS: i64 = 5;

/// Catalog, per-user inventories, and transient item-use notices.
///
/// The catalog keeps insertion order so substring matches resolve
/// deterministically to the earliest-added item.
#[derive(Debug, Default)]
pub struct Shop {
    items: Vec<ShopItem>,
    inventories: HashMap<String, HashMap<String, InventoryEntry>>,
    notices: Vec<ItemUseNotice>,
}

impl Shop {
    pub fn new() -> Self {
        Shop::default()
    }

    /// Rebuild from the persisted catalog and inventory documents
    pub fn from_records(
        items: Vec<ShopItem>,
        inventories: HashMap<String, HashMap<String, InventoryEntry>>,
    ) -> Self {
        Shop {
            items,
            inventories,
            notices: Vec::new(),
        }
    }

    pub fn items(&self) -> &[ShopItem] {
        &self.items
    }

    pub fn inventories(&self) -> &HashMap<String, HashMap<String, InventoryEntry>> {
        &self.inventories
    }

    /// Resolve a query against the catalog: case-insensitive exact name
    /// match first, then case-insensitive substring, first match in catalog
    /// order.
    pub fn find_item(&self, query: &str) -> Option<&ShopItem> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        self.items
            .iter()
            .find(|item| item.name.to_lowercase() == needle)
            .or_else(|| {
                self.items
                    .iter()
                    .find(|item| item.name.to_lowercase().contains(&needle))
            })
    }

    /// Buy one unit of the item matching `query`, debiting the ledger
    pub fn purchase(
        &mut self,
        user: &str,
        query: &str,
        ledger: &mut PointLedger,
        now: DateTime<Utc>,
    ) -> Result<PurchaseReceipt, GameError> {
        let item = self
            .find_item(query)
            .cloned()
            .ok_or_else(|| GameError::ItemNotFound(query.trim().to_string()))?;

        ledger.debit(user, item.price)?;

        let slot = self
            .inventories
            .entry(user.to_string())
            .or_default()
            .entry(item.id.clone())
            .or_insert(InventoryEntry {
                quantity: 0,
                acquired_at: now,
            });
        slot.quantity += 1;
        slot.acquired_at = now;

        Ok(PurchaseReceipt {
            item_name: item.name,
            price: item.price,
            balance: ledger.balance(user),
        })
    }

    /// Use one unit of an owned item matching `query`.
    ///
    /// Resolution runs against the user's own inventory only: exact name
    /// match among owned items first, then substring. The entry disappears
    /// when the quantity reaches zero, and an overlay notice is recorded.
    pub fn use_item(
        &mut self,
        user: &str,
        username: &str,
        query: &str,
        now: DateTime<Utc>,
    ) -> Result<String, GameError> {
        let item_id = self
            .find_owned_item(user, query)
            .ok_or_else(|| GameError::NotOwned(query.trim().to_string()))?;

        let item_name = self
            .items
            .iter()
            .find(|i| i.id == item_id)
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "알 수 없는 아이템".to_string());

        let Some(inventory) = self.inventories.get_mut(user) else {
            return Err(GameError::NotOwned(query.trim().to_string()));
        };
        let Some(entry) = inventory.get_mut(&item_id) else {
            return Err(GameError::NotOwned(query.trim().to_string()));
        };
        entry.quantity -= 1;
        if entry.quantity == 0 {
            inventory.remove(&item_id);
            if inventory.is_empty() {
                self.inventories.remove(user);
            }
        }

        self.push_notice(username, &item_name, now);

        Ok(item_name)
    }

    fn find_owned_item(&self, user: &str, query: &str) -> Option<String> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        let inventory = self.inventories.get(user)?;
        let owned: Vec<&ShopItem> = self
            .items
            .iter()
            .filter(|item| inventory.get(&item.id).map(|e| e.quantity > 0) == Some(true))
            .collect();

        owned
            .iter()
            .find(|item| item.name.to_lowercase() == needle)
            .or_else(|| {
                owned
                    .iter()
                    .find(|item| item.name.to_lowercase().contains(&needle))
            })
            .map(|item| item.id.clone())
    }

    /// Per-user inventory listing as (name, quantity) in catalog order
    pub fn inventory_of(&self, user: &str) -> Vec<(String, u32)> {
        let Some(inventory) = self.inventories.get(user) else {
            return Vec::new();
        };

        self.items
            .iter()
            .filter_map(|item| {
                inventory
                    .get(&item.id)
                    .filter(|e| e.quantity > 0)
                    .map(|e| (item.name.clone(), e.quantity))
            })
            .collect()
    }

    /// Operator: add a new catalog item
    pub fn add_item(
        &mut self,
        name: &str,
        price: i64,
        description: &str,
        now: DateTime<Utc>,
    ) -> Result<ShopItem, GameError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GameError::Validation("item name is empty".to_string()));
        }
        if price <= 0 {
            return Err(GameError::Validation("item price must be positive".to_string()));
        }
        if self
            .items
            .iter()
            .any(|i| i.name.to_lowercase() == name.to_lowercase())
        {
            return Err(GameError::StateConflict(format!(
                "item '{name}' already exists"
            )));
        }

        let mut id = now.timestamp_millis().to_string();
        while self.items.iter().any(|i| i.id == id) {
            id.push('0');
        }

        let item = ShopItem {
            id,
            name: name.to_string(),
            price,
            description: description.trim().to_string(),
        };
        self.items.push(item.clone());

        Ok(item)
    }

    /// Operator: update name/price/description of an existing item
    pub fn update_item(
        &mut self,
        id: &str,
        name: &str,
        price: i64,
        description: &str,
    ) -> Result<(), GameError> {
        if price <= 0 {
            return Err(GameError::Validation("item price must be positive".to_string()));
        }

        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| GameError::ItemNotFound(id.to_string()))?;

        item.name = name.trim().to_string();
        item.price = price;
        item.description = description.trim().to_string();
        Ok(())
    }

    /// Operator: delete an item and cascade it out of every inventory.
    ///
    /// Returns the number of users whose inventory held the item.
    pub fn delete_item(&mut self, id: &str) -> Result<usize, GameError> {
        let index = self
            .items
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| GameError::ItemNotFound(id.to_string()))?;
        self.items.remove(index);

        let mut affected = 0;
        self.inventories.retain(|_, inventory| {
            if inventory.remove(id).is_some() {
                affected += 1;
            }
            !inventory.is_empty()
        });

        Ok(affected)
    }

    fn push_notice(&mut self, username: &str, item_name: &str, now: DateTime<Utc>) {
        self.notices.retain(|n| n.expires_at > now);
        self.notices.push(ItemUseNotice {
            username: username.to_string(),
            item_name: item_name.to_string(),
            expires_at: now + Duration::seconds(NOTICE_LIFETIME_SECS),
        });
    }

    /// Non-expired item-use notices for the overlay
    pub fn active_notices(&self, now: DateTime<Utc>) -> Vec<ItemUseNotice> {
        self.notices
            .iter()
            .filter(|n| n.expires_at > now)
            .cloned()
            .collect()
    }
}
