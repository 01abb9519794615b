// SPDX-License-Identifier: GPL-3.0-only
pub mod batch;
pub mod paginator;

pub use batch::{BatchCap, dedup_preserving_order, split};
pub use paginator::{Paged, collect_all};
