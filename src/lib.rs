//! `resilient-fetch` runs HTTP requests under a shared deadline with a
//! linear-backoff retry budget, and ships a handful of small client-side
//! helpers alongside it.
//!
//! The core entry points:
//! - [`Executor::execute`]
//! - [`fetch_with_retry`]
//!
//! Peer utilities live in their own modules: [`debounce`], [`throttle`],
//! [`clipboard`], [`delegate`], [`form`], [`storage`], [`id`], [`log_pane`],
//! and the generic [`retry`] loop the executor is built on.

mod client;
mod error;
mod options;
mod request;

pub mod clipboard;
pub mod debounce;
pub mod delegate;
pub mod form;
pub mod id;
pub mod log_pane;
pub mod retry;
pub mod storage;
pub mod throttle;

pub use client::{fetch_with_retry, Executor};
pub use error::FetchError;
pub use options::ExecutorOptions;
pub use request::RequestSpec;
pub use reqwest::Method;

pub use clipboard::{ClipboardChain, ClipboardError, CopyReceipt};
pub use debounce::Debouncer;
pub use delegate::{Delegation, Tree};
pub use form::{serialize_form, FieldValue, FormFields};
pub use log_pane::LogPane;
pub use storage::{FileStore, JsonStorage, KeyValueStore, MemoryStore, StorageError};
pub use throttle::Throttler;

pub type Result<T> = std::result::Result<T, FetchError>;
