//! kindxml Datastore - entity export to sharded XML text
//!
//! Reads Datastore-style entities of one kind, extracts their properties and
//! writes one XML fragment per entity through a [`RecordSink`].
//!
//! # Example
//!
//! ```ignore
//! use kindxml_core::{TextShardSink, TextSinkConfig};
//! use kindxml_datastore::{Config, ExportSource, Pipeline, Query};
//!
//! let query = Query::new("User", "my-project", None)?;
//! let source = ExportSource::open("users.jsonl")?;
//! let mut sink = TextShardSink::create(&TextSinkConfig::new("out/users"))?;
//!
//! let summary = Pipeline::new(&Config::default())?.run(&query, &source, &mut sink)?;
//! println!("Wrote {} records", summary.records_written);
//! ```
//!
//! [`RecordSink`]: kindxml_core::RecordSink

pub mod config;
pub mod entity;
pub mod error;
pub mod query;
pub mod runner;
pub mod source;

// Re-exports
pub use config::{Config, ErrorPolicy};
pub use entity::Entity;
pub use error::SourceError;
pub use query::Query;
pub use runner::{Pipeline, Summary};
pub use source::{ExportSource, InputFormat, RecordSource, VecSource};
