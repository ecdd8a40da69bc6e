//! regharvest - regulatory filing harvester.
//!
//! Watches an agency docket for filings of interest, politely retrieves
//! signed orders and well documents from two legacy portal front-ends,
//! and hands validated PDFs to a downstream extraction pipeline. All
//! harvest state is durable and keyed by case number, so overlapping or
//! interrupted runs converge instead of duplicating work.

pub mod cli;
pub mod config;
pub mod harvest;
pub mod models;
pub mod pipeline;
pub mod portal;
pub mod repository;
pub mod server;
pub mod utils;
