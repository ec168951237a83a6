//! CLI module for the boundary adherence evaluator
//!
//! This module is only available when the "cli" feature is enabled.

mod config;
#[path = "main.rs"]
mod main_impl;

pub use main_impl::{
    main, Cli, CliLogFormat, CliStrategy, Command, EvaluateArgs, GenerateArgs, MetricArgs,
    PairArgs, SummarizeArgs,
};
