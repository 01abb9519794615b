// SPDX-License-Identifier: GPL-3.0-only
pub mod branch_cache;

pub use branch_cache::{BranchCache, Cache, Partition};
