pub mod config;
pub mod db;
pub mod error;
pub mod eval;
pub mod extract;
pub mod llm;
pub mod models;
pub mod prompts;
pub mod repository;
pub mod routes;
pub mod schema;
pub mod state;
pub mod storage;
pub mod utils;
