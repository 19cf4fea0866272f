//! Job search service: query normalization, predicate building, cached job
//! queries, salary estimation and the JSON API on top of them.

pub mod analytics;
pub mod config;
pub mod db;
pub mod errors;
pub mod jobs;
pub mod models;
pub mod routes;
pub mod salary;
pub mod search;
pub mod state;
pub mod submissions;
