// SPDX-License-Identifier: GPL-3.0-only
pub mod report;
pub mod synchronizer;

pub use report::{ChangeReport, ChangeStatus, MemberOperation, MemberOutcome};
pub use synchronizer::{MembershipSynchronizer, SyncSettings};
