use gloo_storage::Storage;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";
const DEFAULT_LOG_LEVEL: &str = "info";

pub const NORMAL_POLL_MS: u32 = 1_000;
pub const AWAITING_GEOGRAPHY_POLL_MS: u32 = 250;
pub const POLL_BACKOFF_MAX_EXPONENT: u32 = 3;
pub const POLL_BACKOFF_CAP_MS: u32 = 8_000;

pub const MAX_ZOOM: u32 = 9;
/// Fraction of the view box trimmed per zoom level.
pub const ZOOM_STEP_FRACTION: f64 = 0.1;

/// Pointer travel below which a press/release counts as a click rather than a drag.
pub const CLICK_SLOP_PX: f64 = 5.0;

/// Terrain glyphs fetched at startup; anything else is fetched when a board uses it.
pub const KNOWN_TERRAIN_KINDS: &[&str] =
    &["DESERT", "MOUNTAIN", "ALPINE", "JUNGLE", "FOREST", "CHUNNEL"];

pub const GEOGRAPHIES: &[&str] = &["africa"];

const SETTINGS_KEY: &str = "trainmap_settings";

/// Base URL of the game server, baked in at build time.
pub fn server_url() -> &'static str {
    option_env!("TRAIN_SERVER_URL").unwrap_or(DEFAULT_SERVER_URL)
}

pub fn log_level() -> &'static str {
    option_env!("TRAIN_LOG_LEVEL").unwrap_or(DEFAULT_LOG_LEVEL)
}

pub fn map_asset_url(geography: &str) -> String {
    format!("data/{geography}/map.svg")
}

pub fn glyph_asset_url(asset_name: &str) -> String {
    format!("data/mileposts/{asset_name}.svg")
}

/// Menu choices remembered between visits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub handle: String,
    pub color: String,
    pub geography: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            handle: String::new(),
            color: "aqua".to_string(),
            geography: GEOGRAPHIES[0].to_string(),
        }
    }
}

impl Settings {
    pub fn load() -> Self {
        gloo_storage::LocalStorage::get(SETTINGS_KEY).unwrap_or_default()
    }

    pub fn save(&self) {
        if let Err(e) = gloo_storage::LocalStorage::set(SETTINGS_KEY, self) {
            tracing::debug!(error = %e, "could not persist settings");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_paths() {
        assert_eq!(map_asset_url("africa"), "data/africa/map.svg");
        assert_eq!(glyph_asset_url("desert"), "data/mileposts/desert.svg");
    }

    #[test]
    fn settings_fill_missing_fields() {
        let s: Settings = serde_json::from_str(r#"{"handle":"huey"}"#).unwrap();
        assert_eq!(s.handle, "huey");
        assert_eq!(s.color, "aqua");
        assert_eq!(s.geography, "africa");
    }
}
