// SPDX-License-Identifier: GPL-3.0-only
pub mod models;
pub mod sqlite;
pub mod traits;

pub use models::{Refset, VersionStatus, WorkflowStatus};
pub use sqlite::SqliteRefsetStore;
pub use traits::RefsetStore;
