#![doc = "The `taskpilot` library crate."]
#![doc = ""]
#![doc = "Contains the authentication and authorization token lifecycle at the heart of"]
#![doc = "the TaskPilot backend: credential verification, JWT issuance, refresh-token"]
#![doc = "rotation and revocation, and the per-request auth gate, together with the"]
#![doc = "collaborator interfaces (credential store, refresh-token store, email sender),"]
#![doc = "their production implementations, error handling and routing configuration."]
#![doc = "It is used by the main binary (`main.rs`) to construct and run the application."]

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod stores;
