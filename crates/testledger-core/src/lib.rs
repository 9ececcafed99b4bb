pub mod auth;
pub mod config;
pub mod engine;
pub mod errors;
pub mod evidence;
pub mod model;
pub mod storage;
pub mod view;
