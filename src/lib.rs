//! Parley, a document-grounded realtime voice agent.
//!
//! Builds a system prompt from a directory of reference documents, keeps a
//! bounded conversation window in sync with a remote realtime session, and
//! answers typed messages on the session's data channel with a chat model.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod logging;

pub mod context;
pub mod documents;
pub mod prompt;

pub mod bridge;
pub mod providers;
pub mod realtime;
pub mod session;
