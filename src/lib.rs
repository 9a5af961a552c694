#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::{ConfigFairing, StoreFairing};
use crate::logging::LoggerFairing;

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod poll;
pub mod store;

/// Build the server from `Rocket.toml` and the environment.
pub fn build() -> Rocket<Build> {
    assemble(rocket::build())
}

/// Mount the API and attach the fairings. The config must be loaded before
/// the store fairing runs, since that seeds the judge account.
fn assemble(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/api", api::routes())
        .register("/api", catchers![error::default_catcher])
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(StoreFairing)
}

/// A server backed by the given store, with fixed test credentials for the
/// bootstrap judge.
#[cfg(test)]
pub(crate) fn rocket_for_store(store: store::Store) -> Rocket<Build> {
    let figment = rocket::Config::figment()
        .merge(("log_level", "off"))
        .merge(("auth_ttl", 3600))
        .merge(("jwt_secret", "test-secret"))
        .merge(("judge_username", "judge1"))
        .merge(("judge_password", "juez123"))
        .merge(("store", "memory"));
    assemble(rocket::custom(figment)).manage(store)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rocket::{http::Status, local::asynchronous::Client, serde::json::serde_json};

    use crate::store::{memory::MemoryStore, Store};

    use super::*;

    #[rocket::async_test]
    async fn judge_is_seeded_once() {
        log4rs_test_utils::test_logging::init_logging_once_for(["queen_poll_backend"], None, None);

        let store: Store = Arc::new(MemoryStore::new());
        for _ in 0..2 {
            let client = Client::tracked(rocket_for_store(store.clone()))
                .await
                .unwrap();
            drop(client);
        }
        let users = store.users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "judge1");
        assert!(!users[0].is_student());
    }

    #[rocket::async_test]
    async fn unknown_routes_get_json_errors() {
        let store: Store = Arc::new(MemoryStore::new());
        let client = Client::tracked(rocket_for_store(store)).await.unwrap();
        let response = client.get("/api/nothing-here").dispatch().await;
        assert_eq!(Status::NotFound, response.status());
        let body: serde_json::Value = response.into_json().await.unwrap();
        assert_eq!(body["message"], "Not Found");
    }
}
