//! Choosing an extractor for a page and interpreting what it reports.
//!
//! - [`strategy::select_plan`]: URL → [`strategy::ExtractionPlan`], pure
//! - [`report`]: article validation, failure wording and title fallbacks
pub mod report;
pub mod strategy;

pub use report::{ExtractorReport, article_from_selection, default_title, validate_article};
pub use strategy::{ExtractionPlan, ExtractionReason, select_plan};
