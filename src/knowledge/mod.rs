//! Document collection, keyword ranking and the question pipeline.

pub mod document;
pub mod ingest;
pub mod prompt;
pub mod ranking;
pub mod session;
pub mod store;
