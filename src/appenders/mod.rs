//! Appender implementations

pub mod console;
pub mod database;
pub mod rotating_file;
pub mod search_index;
pub mod worker;

pub use console::ConsoleAppender;
pub use database::{DatabaseAppender, FnReceiver, RecordReceiver};
pub use rotating_file::{RotatingFileAppender, RotationPolicy, RotationStrategy};
pub use search_index::{
    bulk_body, index_template, HttpIndexTransport, IndexDocument, IndexTransport,
    SearchIndexAppender,
};
pub use worker::{BackgroundWorker, BatchHandler, WorkerConfig};

pub use crate::core::Appender;
