pub mod auth;
pub mod chzzk;
pub mod feed;

pub use chzzk::ChzzkClient;
pub use feed::ChatFeed;
