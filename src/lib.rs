pub mod access;
pub mod config;
pub mod economics;
pub mod fleet;
pub mod geocode;
pub mod model;
pub mod output;
pub mod routes;
pub mod server;
pub mod validate;
