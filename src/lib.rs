pub mod api;
pub mod chance;
pub mod chat;
pub mod classifier;
pub mod config;
pub mod inference;
pub mod responses;
