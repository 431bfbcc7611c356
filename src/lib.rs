pub mod auction;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod listing;
pub mod reconcile;
pub mod store;
