//! appstack-lib: declarative resource graphs with deferred values
//!
//! This crate provides the building blocks used by the `appstack` CLI:
//! - `Output`: single-assignment deferred values with `map`/`all`/`zip` combinators
//! - `Context` and `ResourceDag`: resource declarations and their dependency graph
//! - `engine`: wave-by-wave provisioning against a `Provider`
//! - `resources`: typed resource declarations (storage, SQL, web, insights)
//! - `Stack`: per-stack configuration, state and the `up`/`preview` entry points
//! - `appservice`: the App Service topology program

pub mod appservice;
pub mod assemble;
pub mod config;
pub mod consts;
pub mod engine;
pub mod graph;
pub mod output;
pub mod package;
pub mod platform;
pub mod provider;
pub mod resource;
pub mod resources;
pub mod secret;
pub mod stack;
pub mod state;
pub mod util;
