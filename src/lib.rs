pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod jobs;
pub mod metrics;
pub mod models;
pub mod sheet;
pub mod update;
pub mod util;
pub mod xref;
