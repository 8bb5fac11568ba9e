pub mod app;
pub mod cache;
pub mod classify;
pub mod cli;
pub mod config;
pub mod extensions;
pub mod git;
pub mod interrupt;
pub mod orchestrator;
pub mod processor;
pub mod progress;
pub mod render;
pub mod scan;
pub mod summary;
