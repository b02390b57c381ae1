use std::collections::HashMap;

use crate::config::Settings;
use crate::engine::{BettingEngine, PointLedger, Shop};
use crate::models::{InventoryEntry, RoundRecord, ShopItem, UserRecord};

/// The whole mutable state of the bot, owned behind one lock.
///
/// The chat worker and the round timer mutate it; the HTTP handlers read
/// snapshots from it. Nothing in here touches the network.
pub struct BotState {
    pub settings: Settings,
    pub ledger: PointLedger,
    pub shop: Shop,
    pub betting: BettingEngine,
}

impl BotState {
    pub fn new(
        settings: Settings,
        users: HashMap<String, UserRecord>,
        items: Vec<ShopItem>,
        inventories: HashMap<String, HashMap<String, InventoryEntry>>,
        history: Vec<RoundRecord>,
    ) -> Self {
        BotState {
            settings,
            ledger: PointLedger::from_records(users),
            shop: Shop::from_records(items, inventories),
            betting: BettingEngine::from_history(history),
        }
    }
}
