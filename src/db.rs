//! SeaORM-backed banner storage.
pub mod driver;
pub mod entity;
pub mod migrations;
pub mod store;

pub use store::DbStore;
