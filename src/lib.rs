pub mod config;
pub mod display;
pub mod error;
pub mod events;
pub mod fingerprint;
pub mod manifest;
pub mod reconcile;
pub mod state;
pub mod web;
pub mod tasks {
    pub mod loader;
    pub mod poller;
}
