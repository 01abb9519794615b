// SPDX-License-Identifier: GPL-3.0-only
pub mod branching;
pub mod cache;
pub mod config;
pub mod enrich;
pub mod jobs;
pub mod logging;
pub mod membership;
pub mod paging;
pub mod store;
pub mod terminology;

#[cfg(test)]
pub mod test_helpers;
