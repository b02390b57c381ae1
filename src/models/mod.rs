pub mod betting;
pub mod chat;
pub mod points;
pub mod shop;

pub use betting::{
    Bet, BetAmount, BetReceipt, BettingRound, HistoryEntry, OptionSnapshot, RoundPhase,
    RoundRecord, RoundSnapshot, SettlementOutcome, WinnerRecord,
};
pub use chat::{ChatEvent, ChatEventPayload};
pub use points::{RewardGrant, UserRecord};
pub use shop::{InventoryEntry, ItemUseNotice, PurchaseReceipt, ShopItem};
