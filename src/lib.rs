// Library exports for Together
// This allows integration tests and the API client to share types with the server

pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod display;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;
