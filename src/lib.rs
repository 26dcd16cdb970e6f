pub mod api;
pub mod backend;
pub mod classifier;
pub mod config;
pub mod data_models;
pub mod document;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod normalizer;
pub mod page_meta;
pub mod pool;
pub mod renderer;
pub mod sanitizer;
pub mod search;
pub mod truncator;
