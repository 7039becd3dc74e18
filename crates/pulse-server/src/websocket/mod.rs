// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

pub mod handler;

pub use handler::ws_upgrade_handler;
