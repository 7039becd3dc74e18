// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Durable at-least-once job queue.
//!
//! Jobs are rows in SQLite (see `pulse_server_db::queue`), so they
//! survive process restarts. Workers claim jobs atomically, retry up to
//! three attempts with exponential backoff starting at two seconds, and
//! keep the terminal backlog bounded (last 100 completed, last 50
//! failed).

pub mod error;
pub mod queue;

pub use error::{JobError, Result};
pub use queue::{JobHandler, JobQueue};
