//! # Core Application Logic
//!
//! The streaming pipeline and the business state around it. Nothing here
//! knows about ratatui or crossterm.
//!
//! ```text
//!   generation thread                       UI thread (one per frame)
//!  ┌──────────────────┐                  ┌─────────────────────────────┐
//!  │ StreamingSession │   PendingUpdate  │ UpdateQueue::drain          │
//!  │   on_chunk()     │ ───────────────▶ │   → MessageStore mutation   │
//!  │   on_terminal()  │   (UpdateQueue)  │   → ContentRenderer passes  │
//!  │ ToolRunner       │                  │ → tui scroll view + draw    │
//!  └──────────────────┘                  └─────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`message`]: messages, tool executions, rendered lines, the store
//! - [`queue`]: the producer → UI thread update queue
//! - [`streaming`]: the single-request streaming state machine
//! - [`state`]: the `App` struct, all application state in one place
//! - [`action`]: the `Action` enum, slash commands and `update()`
//! - [`config`]: file / env / CLI configuration
//! - [`tools`]: tools the model can call

pub mod action;
pub mod config;
pub mod message;
pub mod queue;
pub mod state;
pub mod streaming;
pub mod tools;
