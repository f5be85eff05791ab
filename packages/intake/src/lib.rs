//! AII Whitelist Intake - Library interface
//!
//! Accepts whitelist signups over HTTP, validates and normalizes them,
//! attaches request metadata and forwards one record per submission to a
//! Notion database.

pub mod config;
pub mod context;
pub mod error;
pub mod metrics;
pub mod redact;
pub mod server;
pub mod store;
pub mod submission;

pub use config::Config;
pub use error::IntakeError;
pub use server::{router, AppState};
pub use store::{NotionStore, RecordStore, StoreError};
pub use submission::{parse_submission, SignupSubmission};
