//! Orchestration driver for survey-subsample: configuration, argument
//! parsing and the end-to-end pipeline.
pub mod cli;
pub mod config;
pub mod pipeline;
