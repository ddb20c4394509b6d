//! Shared test harness modules for the Periplus CLI.
#![expect(
    clippy::panic,
    reason = "Tests assert panic branches to surface unexpected CLI outcomes"
)]

use super::*;

#[cfg(feature = "store-sqlite")]
mod helpers;
#[cfg(feature = "store-sqlite")]
mod sync_steps;
