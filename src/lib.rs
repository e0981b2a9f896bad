//! Discerno - a personalized news reader
//!
//! This crate holds both halves of the reader: the REST backend that stores
//! users, their category preferences and the headline catalog, and the
//! client core that logs in, keeps the session on the device and builds the
//! personalized feed from the user's preferences.

pub mod aggregator;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod password;
pub mod reader;
pub mod routes;
pub mod session;
pub mod validation;
