use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::config::Settings;
use crate::engine::BotState;
use crate::models::{InventoryEntry, RoundRecord, ShopItem, UserRecord};

const SETTINGS_FILE: &str = "settings.json";
const USERS_FILE: &str = "user_data.json";
const SHOP_FILE: &str = "shop_items.json";
const INVENTORY_FILE: &str = "user_inventory.json";
const HISTORY_FILE: &str = "betting_history.json";

/// One JSON document per state family under the data directory.
///
/// Loads tolerate missing files (fresh start); writes are best-effort and
/// the callers log failures without rolling back in-memory state.
pub struct JsonStore {
    data_dir: PathBuf,
}

impl JsonStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

        info!("Data directory: {}", data_dir.display());
        Ok(JsonStore { data_dir })
    }

    fn path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }

    fn read<T: DeserializeOwned>(&self, file: &str) -> Result<Option<T>> {
        let path = self.path(file);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(value))
    }

    fn write<T: Serialize>(&self, file: &str, value: &T) -> Result<()> {
        let path = self.path(file);
        let content =
            serde_json::to_string_pretty(value).context("Failed to serialize document")?;
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn load_settings(&self) -> Result<Option<Settings>> {
        self.read(SETTINGS_FILE)
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.write(SETTINGS_FILE, settings)
    }

    pub fn load_users(&self) -> Result<HashMap<String, UserRecord>> {
        Ok(self.read(USERS_FILE)?.unwrap_or_default())
    }

    pub fn save_users(&self, users: &HashMap<String, UserRecord>) -> Result<()> {
        self.write(USERS_FILE, users)
    }

    pub fn load_shop_items(&self) -> Result<Vec<ShopItem>> {
        Ok(self.read(SHOP_FILE)?.unwrap_or_default())
    }

    pub fn save_shop_items(&self, items: &[ShopItem]) -> Result<()> {
        self.write(SHOP_FILE, &items)
    }

    pub fn load_inventories(&self) -> Result<HashMap<String, HashMap<String, InventoryEntry>>> {
        Ok(self.read(INVENTORY_FILE)?.unwrap_or_default())
    }

    pub fn save_inventories(
        &self,
        inventories: &HashMap<String, HashMap<String, InventoryEntry>>,
    ) -> Result<()> {
        self.write(INVENTORY_FILE, inventories)
    }

    pub fn load_history(&self) -> Result<Vec<RoundRecord>> {
        Ok(self.read(HISTORY_FILE)?.unwrap_or_default())
    }

    pub fn save_history(&self, history: &[RoundRecord]) -> Result<()> {
        self.write(HISTORY_FILE, &history)
    }
}

/// Which documents a dispatch touched; the worker persists only those.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dirty {
    pub settings: bool,
    pub users: bool,
    pub shop: bool,
    pub inventory: bool,
    pub history: bool,
}

impl Dirty {
    pub fn any(&self) -> bool {
        self.settings || self.users || self.shop || self.inventory || self.history
    }
}

/// Best-effort persistence of the touched documents; failures are logged
/// by the caller, never propagated into engine state.
pub fn persist_dirty(store: &JsonStore, state: &BotState, dirty: Dirty) -> Result<()> {
    if dirty.settings {
        store.save_settings(&state.settings)?;
    }
    if dirty.users {
        store.save_users(state.ledger.records())?;
    }
    if dirty.shop {
        store.save_shop_items(state.shop.items())?;
    }
    if dirty.inventory {
        store.save_inventories(state.shop.inventories())?;
    }
    if dirty.history {
        store.save_history(state.betting.history())?;
    }
    Ok(())
}
