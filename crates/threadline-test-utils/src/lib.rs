// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Threadline integration tests.
//!
//! # Components
//!
//! - [`ScriptedProvider`] - assistant provider replaying a scripted run
//! - [`TestStore`] - temp SQLite store seeded with a business, agent and conversation

pub mod scripted_provider;
pub mod store;

pub use scripted_provider::{ScriptedProvider, Step};
pub use store::TestStore;
