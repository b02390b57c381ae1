pub mod chat_worker;
pub mod round_timer;
pub mod sender;

pub use chat_worker::ChatWorker;
pub use round_timer::RoundTimer;
pub use sender::{ChatSender, Outbox};
