// SPDX-License-Identifier: GPL-3.0-only
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::terminology::error::RemoteError;
use crate::terminology::models::Concept;
use crate::terminology::traits::Terminology;

/// What a unit of enrichment work fetches and writes back.
#[derive(Debug, Clone)]
pub enum EnrichmentKind {
    Descriptions,
    LeafFlags,
    Membership { refset_id: String },
}

/// Tunables for the enrichment fan-out.
#[derive(Debug, Clone)]
pub struct EnrichSettings {
    pub batch_size: usize,
    pub pool_size: usize,
    /// Overall join budget. On expiry the call proceeds with whatever
    /// completed; unfinished batches fall back to their un-enriched form.
    pub join_timeout: Duration,
}

impl Default for EnrichSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            pool_size: 16,
            join_timeout: Duration::from_secs(300),
        }
    }
}

/// Bounded fan-out of enrichment calls over disjoint concept batches.
/// Batches are owned by exactly one unit of work at a time, so no
/// locking is needed on the concepts themselves; results are matched
/// back by concept identifier, never by position.
pub struct ConceptEnricher {
    terminology: Arc<dyn Terminology>,
    settings: EnrichSettings,
}

impl ConceptEnricher {
    pub fn new(terminology: Arc<dyn Terminology>, settings: EnrichSettings) -> Self {
        Self {
            terminology,
            settings,
        }
    }

    /// Enrich `concepts` in place. The list is repartitioned into
    /// fixed-size batches, fanned out over a bounded pool, and
    /// reassembled in input order before returning. A failing unit does
    /// not stop the others; the first failure is surfaced after every
    /// unit has been awaited.
    pub async fn enrich(
        &self,
        branch: &str,
        concepts: &mut Vec<Concept>,
        kind: EnrichmentKind,
    ) -> anyhow::Result<()> {
        if concepts.is_empty() {
            return Ok(());
        }
        let input = std::mem::take(concepts);
        let batch_size = self.settings.batch_size.max(1);

        let mut batches: Vec<Vec<Concept>> = Vec::new();
        let mut rest = input;
        while rest.len() > batch_size {
            let tail = rest.split_off(batch_size);
            batches.push(rest);
            rest = tail;
        }
        batches.push(rest);

        // Fallback copies so a timed-out or panicked unit cannot lose its
        // slice of the input.
        let mut fallbacks: Vec<Vec<Concept>> = batches.clone();
        let mut slots: Vec<Option<Vec<Concept>>> = Vec::new();
        slots.resize_with(batches.len(), || None);

        let semaphore = Arc::new(Semaphore::new(self.settings.pool_size.max(1)));
        let deadline = Instant::now() + self.settings.join_timeout;
        let mut handles = Vec::new();
        let mut errors: Vec<RemoteError> = Vec::new();

        for (index, batch) in batches.into_iter().enumerate() {
            match Arc::clone(&semaphore).try_acquire_owned() {
                Ok(permit) => {
                    let terminology = Arc::clone(&self.terminology);
                    let branch = branch.to_string();
                    let kind = kind.clone();
                    handles.push((
                        index,
                        tokio::spawn(async move {
                            let out = run_unit(terminology, &branch, &kind, batch).await;
                            drop(permit);
                            out
                        }),
                    ));
                }
                Err(_) => {
                    // Pool saturated: degrade to running this unit on the
                    // submitting task instead of queueing or dropping it.
                    let (batch, result) =
                        run_unit(Arc::clone(&self.terminology), branch, &kind, batch).await;
                    if let Err(e) = result {
                        errors.push(e);
                    }
                    slots[index] = Some(batch);
                }
            }
        }

        for (index, mut handle) in handles {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, &mut handle).await {
                Ok(Ok((batch, result))) => {
                    if let Err(e) = result {
                        errors.push(e);
                    }
                    slots[index] = Some(batch);
                }
                Ok(Err(join_error)) => {
                    warn!(error = %join_error, batch = index, "Enrichment unit did not finish");
                }
                Err(_) => {
                    handle.abort();
                    warn!(batch = index, "Enrichment join budget exhausted, keeping batch un-enriched");
                }
            }
        }

        for (index, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(batch) => concepts.extend(batch),
                None => concepts.extend(std::mem::take(&mut fallbacks[index])),
            }
        }

        match errors.into_iter().next() {
            Some(first) => Err(anyhow::anyhow!(first).context("concept enrichment failed")),
            None => Ok(()),
        }
    }
}

/// One unit of work: fetch enrichment data for the batch and write it
/// back into the owned concepts by identifier match. Concepts the
/// server did not return stay un-enriched.
async fn run_unit(
    terminology: Arc<dyn Terminology>,
    branch: &str,
    kind: &EnrichmentKind,
    mut batch: Vec<Concept>,
) -> (Vec<Concept>, Result<(), RemoteError>) {
    let ids: Vec<String> = batch.iter().map(|c| c.concept_id.clone()).collect();

    let result = match kind {
        EnrichmentKind::Descriptions => match terminology.fetch_descriptions(branch, &ids).await {
            Ok(terms) => {
                for concept in batch.iter_mut() {
                    match terms.get(&concept.concept_id) {
                        Some(term) => concept.preferred_term = Some(term.clone()),
                        None => {
                            debug!(concept = %concept.concept_id, "No description returned for concept")
                        }
                    }
                }
                Ok(())
            }
            Err(e) => Err(e),
        },
        EnrichmentKind::LeafFlags => match terminology.fetch_leaf_flags(branch, &ids).await {
            Ok(flags) => {
                for concept in batch.iter_mut() {
                    match flags.get(&concept.concept_id) {
                        Some(leaf) => concept.leaf = Some(*leaf),
                        None => {
                            debug!(concept = %concept.concept_id, "No leaf flag returned for concept")
                        }
                    }
                }
                Ok(())
            }
            Err(e) => Err(e),
        },
        EnrichmentKind::Membership { refset_id } => {
            match terminology
                .fetch_membership_flags(branch, refset_id, &ids)
                .await
            {
                Ok(member_ids) => {
                    for concept in batch.iter_mut() {
                        concept.member_of_target = Some(member_ids.contains(&concept.concept_id));
                    }
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
    };

    (batch, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedTerminology;
    use std::sync::atomic::Ordering;

    fn concepts(ids: &[&str]) -> Vec<Concept> {
        ids.iter().map(|id| Concept::new(*id)).collect()
    }

    fn settings(batch_size: usize, pool_size: usize) -> EnrichSettings {
        EnrichSettings {
            batch_size,
            pool_size,
            join_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_descriptions_matched_by_identifier() {
        let terminology = Arc::new(
            ScriptedTerminology::new()
                .with_concept("100", Some("Asthma"))
                .with_concept("200", Some("Fracture")),
        );
        let enricher = ConceptEnricher::new(terminology, settings(1, 4));

        // "300" is unknown to the server and must stay un-enriched
        let mut list = concepts(&["100", "300", "200"]);
        enricher
            .enrich("MAIN", &mut list, EnrichmentKind::Descriptions)
            .await
            .unwrap();

        assert_eq!(list.len(), 3);
        assert_eq!(list[0].preferred_term.as_deref(), Some("Asthma"));
        assert!(list[1].preferred_term.is_none());
        assert_eq!(list[2].preferred_term.as_deref(), Some("Fracture"));
    }

    #[tokio::test]
    async fn test_input_order_is_preserved_across_batches() {
        let mut scripted = ScriptedTerminology::new();
        for i in 0..25 {
            scripted = scripted.with_concept(&format!("{}", i), Some("t"));
        }
        let enricher = ConceptEnricher::new(Arc::new(scripted), settings(4, 2));

        let ids: Vec<String> = (0..25).map(|i| format!("{}", i)).collect();
        let mut list: Vec<Concept> = ids.iter().map(Concept::new).collect();
        enricher
            .enrich("MAIN", &mut list, EnrichmentKind::Descriptions)
            .await
            .unwrap();

        let out: Vec<String> = list.iter().map(|c| c.concept_id.clone()).collect();
        assert_eq!(out, ids);
    }

    #[tokio::test]
    async fn test_membership_flags_set_for_all_concepts() {
        let terminology = ScriptedTerminology::new()
            .with_concept("100", None)
            .with_concept("200", None);
        terminology.add_member("900001", "100", true, false);
        let enricher = ConceptEnricher::new(Arc::new(terminology), settings(10, 4));

        let mut list = concepts(&["100", "200"]);
        enricher
            .enrich(
                "MAIN",
                &mut list,
                EnrichmentKind::Membership {
                    refset_id: "900001".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(list[0].member_of_target, Some(true));
        assert_eq!(list[1].member_of_target, Some(false));
    }

    #[tokio::test]
    async fn test_unit_failure_surfaces_after_all_units_complete() {
        let terminology = ScriptedTerminology::new().with_concept("100", Some("Asthma"));
        terminology.fail_descriptions.store(true, Ordering::SeqCst);
        let enricher = ConceptEnricher::new(Arc::new(terminology), settings(2, 2));

        let mut list = concepts(&["100", "200", "300"]);
        let result = enricher
            .enrich("MAIN", &mut list, EnrichmentKind::Descriptions)
            .await;

        assert!(result.is_err());
        // no concept is lost even when units fail
        assert_eq!(list.len(), 3);
    }

    #[tokio::test]
    async fn test_saturated_pool_runs_inline_without_losing_batches() {
        let mut scripted = ScriptedTerminology::new();
        for i in 0..12 {
            scripted = scripted.with_concept(&format!("{}", i), Some("t"));
        }
        // one permit forces most batches onto the submitting task
        let enricher = ConceptEnricher::new(Arc::new(scripted), settings(2, 1));

        let mut list: Vec<Concept> = (0..12).map(|i| Concept::new(format!("{}", i))).collect();
        enricher
            .enrich("MAIN", &mut list, EnrichmentKind::Descriptions)
            .await
            .unwrap();

        assert_eq!(list.len(), 12);
        assert!(list.iter().all(|c| c.preferred_term.is_some()));
    }

    #[tokio::test]
    async fn test_leaf_flags_enrichment() {
        let terminology = ScriptedTerminology::new().with_leaf_concept("100", true);
        let enricher = ConceptEnricher::new(Arc::new(terminology), settings(10, 2));

        let mut list = concepts(&["100"]);
        enricher
            .enrich("MAIN", &mut list, EnrichmentKind::LeafFlags)
            .await
            .unwrap();

        assert_eq!(list[0].leaf, Some(true));
    }
}
