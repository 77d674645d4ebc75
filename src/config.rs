use std::sync::Arc;

use chrono::Duration;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::{
    clock::SystemClock,
    store::{MemoryStore, MongoStore, Store},
    voting::Voting,
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Clone, Deserialize)]
pub struct Config {
    // non-secrets
    #[serde(default = "default_session_duration")]
    default_session_duration: u32,
    // secrets
    hmac_secret: String,
}

impl Config {
    /// Create a config from its parts.
    pub fn new(default_session_duration: u32, hmac_secret: impl Into<String>) -> Self {
        Self {
            default_session_duration,
            hmac_secret: hmac_secret.into(),
        }
    }

    /// How long a session stays open when the caller gives no duration.
    pub fn default_session_duration(&self) -> Duration {
        Duration::seconds(self.default_session_duration.into())
    }

    /// Secret key used to digest voter identifiers.
    pub fn hmac_secret(&self) -> &[u8] {
        self.hmac_secret.as_bytes()
    }
}

fn default_session_duration() -> u32 {
    60
}

/// A fairing that loads the application config and puts it in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!(
            "Sessions default to {} seconds",
            config.default_session_duration
        );

        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Which storage backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Mongodb,
    Memory,
}

/// Configuration for the store.
#[derive(Deserialize)]
struct StoreConfig {
    // non-secrets
    store: StoreKind,
    // secrets
    db_uri: Option<String>,
}

/// A fairing that loads the store config, connects to the database if one is
/// configured, and places a `Voting` into managed state.
/// This fairing needs the `Config` in managed state, and so must be attached
/// after `ConfigFairing`.
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let store_config = match rocket.figment().extract::<StoreConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load store config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        let config = match rocket.state::<Config>() {
            Some(config) => config.clone(),
            None => {
                error!("Config was not available when setting up the store");
                return Err(rocket);
            }
        };

        let store: Arc<dyn Store> = match store_config.store {
            StoreKind::Memory => {
                warn!("Using the in-memory store; nothing will survive a restart");
                Arc::new(MemoryStore::new())
            }
            StoreKind::Mongodb => {
                let Some(db_uri) = store_config.db_uri else {
                    error!("`db_uri` must be set when `store = \"mongodb\"`");
                    return Err(rocket);
                };
                info!("Loaded database config, connecting...");
                match MongoStore::connect(&db_uri, &get_database_name()).await {
                    Ok(store) => {
                        info!("...database connection online!");
                        Arc::new(store)
                    }
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                }
            }
        };

        rocket = rocket.manage(Voting::new(store, Arc::new(SystemClock), config));
        Ok(rocket)
    }
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
fn get_database_name() -> String {
    "voting".to_string()
}

/// Get the name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
pub(crate) fn get_database_name() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}
