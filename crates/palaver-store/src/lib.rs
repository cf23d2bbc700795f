//! # palaver-store
//!
//! Persisted conversation storage for the palaver service, backed by
//! SQLite. The crate exposes a synchronous [`Database`] handle wrapping a
//! `rusqlite::Connection`, typed message CRUD, the group membership check
//! consumed by the history resolver, and the resolver itself.
//!
//! Historical rows may store sender/recipient identifiers either as the
//! legacy bare string or as the structured `user:<id>` form; every reader
//! in this crate treats the two forms as equal (see
//! [`palaver_shared::PeerRef`]).

pub mod database;
pub mod groups;
pub mod history;
pub mod messages;
pub mod migrations;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
