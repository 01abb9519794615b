// SPDX-License-Identifier: GPL-3.0-only
pub mod poller;

pub use poller::{JobOutcome, PollSettings, wait_for_job};
