//! Music store persistence layer

pub mod db;
pub mod models;

pub use db::StoreDb;
