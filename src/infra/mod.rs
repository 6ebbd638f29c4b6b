//! Infrastructure adapters backing the dispatch engines.

pub mod queue;
