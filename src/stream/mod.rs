//! Streaming statement processor.
//!
//! Scripts are split lazily on top-level semicolons, then converted either
//! inline or in fixed-size chunks on a bounded tokio worker pool. Output
//! order always follows input order.

mod processor;
mod splitter;

pub use processor::{
    choose_strategy, process_in_chunks, ChunkProgress, ChunkResult, ProcessingResult, ProcessingStrategy,
    StreamProcessor,
};
pub use splitter::{estimate_statement_count, split_statements, StatementSplitter};
