pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod frame;
pub mod metadata;
pub mod ncbi;
pub mod nextclade;
pub mod output;
pub mod package;
pub mod s3;
pub mod snapshot;
