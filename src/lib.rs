pub mod bot;
pub mod config;
pub mod database;
pub mod gateway;
pub mod report;
pub mod utils;
