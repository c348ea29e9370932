#![forbid(unsafe_code)]

//! Persistence for topic mastery records and adaptive test summaries.

pub mod repository;
pub mod sqlite;

pub use repository::{
    InMemoryRepository, MasteryRepository, Storage, StorageError, SummaryRow,
    TestSummaryRepository,
};
