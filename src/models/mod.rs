//! Domain models for the harvest pipeline.

mod case;
mod docket;
mod document;
mod stats;

pub use case::{HarvestCase, HarvestStatus};
pub use docket::DocketCase;
pub use document::{DocumentMetadata, RetrievedDocument, SourceKind};
pub use stats::{DailyStat, HarvestReport, StatusTotals, SweepOutcome, SweepStop};
