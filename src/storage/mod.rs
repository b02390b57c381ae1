pub mod files;

pub use files::{persist_dirty, Dirty, JsonStore};
