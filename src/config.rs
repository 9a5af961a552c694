use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::poll::users::ensure_judge_exists;
use crate::store::{memory::MemoryStore, mongo::MongoStore, Store};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    judge_username: String,
    #[serde(default)]
    closing_date: Option<DateTime<Utc>>,
    // secrets
    jwt_secret: String,
    judge_password: String,
}

impl Config {
    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Secret key used to sign JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Username of the judge account guaranteed to exist at launch.
    pub fn judge_username(&self) -> &str {
        &self.judge_username
    }

    /// Password given to the bootstrap judge if it has to be created.
    pub fn judge_password(&self) -> &str {
        &self.judge_password
    }

    /// When voting closes, if announced.
    pub fn closing_date(&self) -> Option<DateTime<Utc>> {
        self.closing_date
    }
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
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Which entity store backend to run on.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process memory; everything is lost on shutdown.
    #[default]
    Memory,
    /// A MongoDB replica set (transactions are required).
    Mongodb,
}

/// Configuration for the entity store.
#[derive(Deserialize)]
struct StoreConfig {
    #[serde(default)]
    store: StoreBackend,
    // secrets
    #[serde(default)]
    db_uri: Option<String>,
    #[serde(default = "default_db_name")]
    db_name: String,
}

fn default_db_name() -> String {
    "queen_poll".to_string()
}

/// A fairing that selects and connects the entity store, ensures the
/// bootstrap judge exists, and places the [`Store`] into managed state.
///
/// A store that is already managed is kept as-is.
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Entity store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let store = match rocket.state::<Store>() {
            Some(store) => store.clone(),
            None => match connect_store(&rocket).await {
                Some(store) => {
                    rocket = rocket.manage(store.clone());
                    store
                }
                None => return Err(rocket),
            },
        };

        // Ensure there is at least one judge.
        let seeded = match rocket.state::<Config>() {
            Some(config) => ensure_judge_exists(&store, config)
                .await
                .map_err(|e| format!("Failed to create the bootstrap judge: {e}")),
            None => Err("Application config must be loaded before the store".to_string()),
        };
        if let Err(msg) = seeded {
            error!("{msg}");
            return Err(rocket);
        }

        Ok(rocket)
    }
}

/// Build the configured store backend.
async fn connect_store(rocket: &Rocket<Build>) -> Option<Store> {
    let config = match rocket.figment().extract::<StoreConfig>() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load store config");
            rocket::config::pretty_print_error(e);
            return None;
        }
    };

    match config.store {
        StoreBackend::Memory => {
            info!("Using the in-memory store");
            Some(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Mongodb => {
            let Some(db_uri) = config.db_uri else {
                error!("`db_uri` must be set to use the MongoDB store");
                return None;
            };
            info!("Loaded database config, connecting...");
            match MongoStore::connect(&db_uri, &config.db_name).await {
                Ok(store) => {
                    info!("...database connection online!");
                    Some(Arc::new(store))
                }
                Err(e) => {
                    error!("Failed to connect to database: {e}");
                    None
                }
            }
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Config {
        pub fn example() -> Self {
            Self {
                auth_ttl: 3600,
                judge_username: "judge1".to_string(),
                closing_date: None,
                jwt_secret: "test-secret".to_string(),
                judge_password: "juez123".to_string(),
            }
        }

        pub fn with_closing_date(mut self, closing_date: DateTime<Utc>) -> Self {
            self.closing_date = Some(closing_date);
            self
        }
    }
}
