//! # API crate: request flows for profiles and institutions
//!
//! Everything between a parsed HTTP request and the data store. The `web` crate
//! only extracts form fields and the session, calls one function from here, and maps
//! the [`Error`] it gets back to a status code.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`access`] | Authorization gate: owner, member and privilege checks, field and email visibility |
//! | [`auth`] | Local email + password accounts, Argon2 hashing, the session accessor |
//! | [`db`] | PostgreSQL pool, embedded migrations and [`db::PgBackend`] |
//! | [`institutions`] | Create, view and rename institutions; add members |
//! | [`profiles`] | Landing page, profile page, owner edits |
//! | [`settings`] | Layered configuration (`config.toml` + environment) |
//! | [`views`] | Viewer-specific read projections returned by `GET` routes |
//!
//! Every flow takes the backend as `&dyn store::Backend`, so the same code runs
//! against Postgres in production and [`store::MemoryBackend`] in tests. Flows issue
//! their backend calls one after another and never retry.

pub mod access;
pub mod auth;
pub mod db;
pub mod error;
pub mod institutions;
pub mod profiles;
pub mod settings;
pub mod views;

pub use auth::Identity;
pub use error::{Error, Result};
pub use settings::{EmailVisibility, Settings};
