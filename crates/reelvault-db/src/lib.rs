//! Reelvault-DB: Database schema, migrations, and query operations
//!
//! This crate provides persistence for reelvault using SQLite with rusqlite
//! and r2d2 connection pooling.
//!
//! # Modules
//!
//! - `migrations` - Database schema migrations
//! - `pool` - Connection pool management
//! - `models` - Rust models matching the database schema
//! - `queries` - Database query operations
//!
//! # Example
//!
//! ```no_run
//! use reelvault_db::pool::{init_pool, get_conn};
//! use reelvault_db::queries::media_links;
//!
//! let pool = init_pool("/var/lib/reelvault/db.sqlite").unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! let roots = media_links::list_roots(&conn).unwrap();
//! println!("{} library roots registered", roots.len());
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
