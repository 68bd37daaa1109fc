pub mod analyzer;
pub mod api;
pub mod batch;
pub mod config;
pub mod crawler;
pub mod data_models;
pub mod error;
pub mod evidence;
pub mod extractor;
pub mod fetcher;
pub mod pipeline;
pub mod renderer;
pub mod retry;
pub mod search;
pub mod technical;
pub mod text;
pub mod urls;
