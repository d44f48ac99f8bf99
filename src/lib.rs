pub mod config;
pub mod evaluator;
pub mod http_client;
pub mod lineup;
pub mod market_score;
pub mod models;
pub mod odds_api;
pub mod platform;
pub mod store;
pub mod waivers;
