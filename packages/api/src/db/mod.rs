//! # Database module: PostgreSQL pool and the SQL `Backend`
//!
//! - [`connect`] opens a pool from [`crate::settings::Database`]. The pool is created
//!   once at start-up and handed to whoever needs it; there is no global.
//! - [`migrate`] applies the embedded migrations in `packages/api/migrations`.
//! - [`PgBackend`] implements [`store::Backend`] on top of the pool.

mod pool;
mod postgres;

pub use pool::{connect, migrate};
pub use postgres::PgBackend;
