#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod store;
pub mod voting;

pub use config::Config;
pub use voting::Voting;

use config::{ConfigFairing, StoreFairing};
use logging::LoggerFairing;

/// Every route is mounted beneath this prefix.
pub const API_BASE: &str = "/api/v1";

/// Build the server, loading configuration and connecting to the configured store
/// during ignition.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount(API_BASE, api::routes())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(StoreFairing)
}

/// Build a server around an already-constructed `Voting` instance.
/// No configuration is loaded beyond Rocket's own.
pub fn rocket_for_voting(voting: Voting) -> Rocket<Build> {
    rocket::build()
        .mount(API_BASE, api::routes())
        .attach(LoggerFairing)
        .manage(voting)
}
