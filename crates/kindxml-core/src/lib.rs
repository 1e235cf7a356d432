//! kindxml Core - record model, XML serialization and text output
//!
//! This crate holds the pieces of the entity export job that do not depend
//! on where records come from: the ordered property model, the
//! record-to-XML serializer, and sharded text sinks.

pub mod error;
pub mod logging;
pub mod progress;
pub mod record;
pub mod shutdown;
pub mod sink;
pub mod xml;

// Re-exports for convenience
pub use error::SerializeError;
pub use logging::{IndicatifLogger, Verbosity, init_logging};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use record::{EntityKey, PathElement, Record, Value};
pub use shutdown::{install_signal_handlers, is_shutdown_requested, request_shutdown};
pub use sink::{MemorySink, RecordSink, TextShardSink, TextSinkConfig, cleanup_tmp_shards};
pub use xml::{DEFAULT_MAX_DEPTH, XmlSerializer, sanitize_name, serialize};
