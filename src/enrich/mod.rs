// SPDX-License-Identifier: GPL-3.0-only
pub mod enricher;

pub use enricher::{ConceptEnricher, EnrichSettings, EnrichmentKind};
