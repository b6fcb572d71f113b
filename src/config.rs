//! Environment configuration
use super::auth::AdminAllowList;
use std::{env, path::PathBuf};
use tracing::info;

pub const DEFAULT_DB_PATH: &str = "snack.db";
pub const DEFAULT_PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/300x200?text=Snack";

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub admins: AdminAllowList,
    pub placeholder_image_url: String,
}

impl Config {
    /// Reads `.env` if present, then `SNACK_DB_PATH`, `SNACK_ADMIN_EMAILS`
    /// and `SNACK_PLACEHOLDER_IMAGE`.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            db_path: load_or("SNACK_DB_PATH", DEFAULT_DB_PATH).into(),
            admins: AdminAllowList::from_csv(&load_or("SNACK_ADMIN_EMAILS", "")),
            placeholder_image_url: load_or("SNACK_PLACEHOLDER_IMAGE", DEFAULT_PLACEHOLDER_IMAGE),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.into(),
            admins: AdminAllowList::default(),
            placeholder_image_url: DEFAULT_PLACEHOLDER_IMAGE.to_string(),
        }
    }
}

fn load_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default:?}");
        default.to_string()
    })
}
