pub mod api;
pub mod archive;
pub mod config;
pub mod humanize;
pub mod jobs;
pub mod observability;
pub mod retention;
pub mod storage;
