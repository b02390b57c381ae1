use std::env;
use std::path::PathBuf;

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Bot settings, persisted as `settings.json` in the data directory.
///
/// Every field has a default so documents written by older builds (or an
/// empty `{}`) load cleanly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Chzzk channel to listen to and speak in
    pub channel_id: String,

    /// OAuth access token used for chat send / event subscription
    pub access_token: String,

    /// Open API application credentials
    pub client_id: String,
    pub client_secret: String,

    /// Chat reward range (inclusive)
    pub min_points: i64,
    pub max_points: i64,

    /// Jackpot reward and its probability in percent
    pub jackpot_points: i64,
    pub jackpot_chance: u32,

    /// Minimum gap between rewards for one user
    pub cooldown_minutes: i64,

    /// Event multiplier applied to every chat reward; 1.0 means no event
    pub point_multiplier: f64,

    /// Whether reward / betting announcements are sent to chat
    pub show_point_messages: bool,
    pub show_betting_messages: bool,

    /// Port for the overlay / dashboard server
    pub server_port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            channel_id: String::new(),
            access_token: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            min_points: 50,
            max_points: 200,
            jackpot_points: 500,
            jackpot_chance: 5,
            cooldown_minutes: 10,
            point_multiplier: 1.0,
            show_point_messages: true,
            show_betting_messages: true,
            server_port: 5000,
        }
    }
}

impl Settings {
    /// Reward cooldown as a duration
    pub fn cooldown(&self) -> Duration {
        Duration::minutes(self.cooldown_minutes)
    }
}

/// Resolve the data directory from the environment, defaulting to `data`
pub fn data_dir() -> PathBuf {
    dotenvy::dotenv().ok();

    env::var("POINT_BOT_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();

        assert_eq!(settings.min_points, 50);
        assert_eq!(settings.max_points, 200);
        assert_eq!(settings.jackpot_points, 500);
        assert_eq!(settings.jackpot_chance, 5);
        assert_eq!(settings.cooldown_minutes, 10);
        assert_eq!(settings.point_multiplier, 1.0);
        assert!(settings.show_point_messages);
        assert!(settings.show_betting_messages);
        assert_eq!(settings.server_port, 5000);
    }

    #[test]
    fn test_absent_fields_fall_back() {
        let settings: Settings = serde_json::from_str(r#"{"channel_id": "abc"}"#).unwrap();

        assert_eq!(settings.channel_id, "abc");
        assert_eq!(settings.min_points, 50);
        assert_eq!(settings.server_port, 5000);
    }
}
