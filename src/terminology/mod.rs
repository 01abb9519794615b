// SPDX-License-Identifier: GPL-3.0-only
pub mod client;
pub mod error;
pub mod models;
pub mod traits;

pub use client::{RemoteResponse, RestClient, RestTerminology};
pub use error::RemoteError;
pub use models::{Concept, JobHandle, JobState, JobStatus, Page, RefsetMember};
pub use traits::Terminology;
