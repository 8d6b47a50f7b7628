pub mod api;
pub mod app;
pub mod config;
pub mod db;
pub mod fetch_error;
pub mod services;
pub mod weather_api;
