//! Affinity grouping: batch work items that share operational context.
//!
//! Two tag signals are read from each item:
//! - an *environment* (`dev`, `staging`, `prod`, with common aliases),
//! - zero or more *contexts*, tags starting with a known infrastructure
//!   namespace (`aws.`, `terraform`, `k8s.`, ...).
//!
//! Items are bucketed by the key `<contexts joined by "+" or "misc">[:<env>]`.
//! Buckets with a single member are dropped since there is nothing to batch.
//!
//! # Usage
//! ```rust,ignore
//! use sprintplan_core::affinity::{AffinityCandidate, AffinityGrouper};
//! use sprintplan_core::narrative::DisabledAnnotator;
//!
//! let groups = AffinityGrouper::new().compute(&candidates, &DisabledAnnotator);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use crate::error::Result;
use crate::narrative::{MemberDescriptor, NarrativeAnnotator};
use crate::schedule::AffinityGroup;
use crate::store::{AffinityStore, Transactional, WorkItemStore};
use crate::work::{WorkItem, WorkItemQuery, WorkItemStatus};

/// Tag prefixes that mark an infrastructure context.
pub const CONTEXT_PREFIXES: [&str; 8] = [
    "aws.",
    "gcp.",
    "azure.",
    "terraform",
    "k8s.",
    "docker",
    "db.",
    "iam",
];

/// Key used when an item has no context tag.
pub const MISC_CONTEXT: &str = "misc";

/// Canonical deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Staging => "staging",
            Environment::Prod => "prod",
        }
    }

    /// Canonical environment for a normalized tag, if it names one.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "dev" | "development" => Some(Environment::Dev),
            "staging" | "stage" | "preprod" => Some(Environment::Staging),
            "prod" | "production" => Some(Environment::Prod),
            _ => None,
        }
    }
}

/// The fields of a work item the grouper looks at.
#[derive(Debug, Clone, PartialEq)]
pub struct AffinityCandidate {
    pub id: String,
    pub ticket_id: String,
    pub tags: Vec<String>,
    pub text: String,
}

impl From<&WorkItem> for AffinityCandidate {
    fn from(item: &WorkItem) -> Self {
        Self {
            id: item.id.clone(),
            ticket_id: item.ticket_id.clone(),
            tags: item.tags.clone(),
            text: item.text.clone(),
        }
    }
}

/// Signals extracted from one item's tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSignature {
    /// Sorted, deduplicated.
    pub contexts: Vec<String>,
    pub environment: Option<Environment>,
}

impl TagSignature {
    pub fn from_tags<S: AsRef<str>>(tags: &[S]) -> Self {
        let normalized: Vec<String> = tags.iter().map(|t| normalize_tag(t.as_ref())).collect();

        let environment = normalized.iter().find_map(|t| Environment::from_tag(t));

        let contexts: BTreeSet<String> = normalized
            .iter()
            .filter(|t| CONTEXT_PREFIXES.iter().any(|p| t.starts_with(p)))
            .map(|t| t.split(':').next().unwrap_or(t).to_string())
            .collect();

        Self {
            contexts: contexts.into_iter().collect(),
            environment,
        }
    }

    pub fn key(&self) -> String {
        let base = if self.contexts.is_empty() {
            MISC_CONTEXT.to_string()
        } else {
            self.contexts.join("+")
        };
        match self.environment {
            Some(env) => format!("{base}:{}", env.as_str()),
            None => base,
        }
    }

    /// Deterministic explanation of why the members share this key.
    pub fn rationale(&self) -> String {
        let mut why = Vec::new();
        if !self.contexts.is_empty() {
            why.push(format!("shared context: {}", self.contexts.join(", ")));
        }
        if let Some(env) = self.environment {
            why.push(format!("same environment: {}", env.as_str()));
        }
        if why.is_empty() {
            why.push("similar tags".to_string());
        }
        why.join("; ")
    }
}

/// Trim, lower-case, and turn inner whitespace into dots.
pub fn normalize_tag(tag: &str) -> String {
    tag.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '.' } else { c })
        .collect()
}

/// Options for [`AffinityGrouper::compute_with_store`].
#[derive(Debug, Clone, PartialEq)]
pub struct AffinityRun {
    /// Statuses to consider. Defaults to todo + in_progress.
    pub statuses: Vec<WorkItemStatus>,
    pub ticket_ids: Vec<String>,
    /// Remove every stored group before writing the new ones.
    pub clear_existing: bool,
}

impl Default for AffinityRun {
    fn default() -> Self {
        Self {
            statuses: WorkItemStatus::OPEN.to_vec(),
            ticket_ids: Vec::new(),
            clear_existing: true,
        }
    }
}

/// Stateless rule-based grouper.
#[derive(Debug, Clone, Copy, Default)]
pub struct AffinityGrouper;

impl AffinityGrouper {
    pub fn new() -> Self {
        Self
    }

    /// Group `candidates` by shared context and environment.
    ///
    /// Groups come back ordered by key; members keep input order. The
    /// annotator may extend each rationale but can never fail the run.
    pub fn compute(
        &self,
        candidates: &[AffinityCandidate],
        annotator: &dyn NarrativeAnnotator,
    ) -> Vec<AffinityGroup> {
        let mut buckets: BTreeMap<String, (TagSignature, Vec<&AffinityCandidate>)> = BTreeMap::new();
        for candidate in candidates {
            let signature = TagSignature::from_tags(&candidate.tags);
            buckets
                .entry(signature.key())
                .or_insert_with(|| (signature, Vec::new()))
                .1
                .push(candidate);
        }

        let mut groups = Vec::new();
        for (key, (signature, members)) in buckets {
            if members.len() < 2 {
                continue;
            }

            let mut rationale = signature.rationale();
            let descriptors: Vec<MemberDescriptor> = members
                .iter()
                .map(|m| MemberDescriptor {
                    item_id: m.id.clone(),
                    ticket_id: m.ticket_id.clone(),
                    detail: m.text.clone(),
                    due_date: None,
                })
                .collect();
            match annotator.describe_group(&key, &descriptors) {
                Ok(sentence) if !sentence.trim().is_empty() => {
                    rationale = format!("{rationale} | {}", sentence.trim());
                }
                Ok(_) | Err(crate::error::NarrativeError::NotConfigured) => {}
                Err(e) => tracing::warn!(key = %key, "affinity narrative failed: {e}"),
            }

            groups.push(AffinityGroup {
                key,
                rationale,
                member_ids: members.iter().map(|m| m.id.clone()).collect(),
            });
        }

        tracing::debug!(
            candidates = candidates.len(),
            groups = groups.len(),
            "affinity grouping complete"
        );
        groups
    }

    /// Load candidates from the store, group them, and persist the groups.
    pub fn compute_with_store<S>(
        &self,
        store: &S,
        run: &AffinityRun,
        annotator: &dyn NarrativeAnnotator,
    ) -> Result<Vec<AffinityGroup>>
    where
        S: WorkItemStore + AffinityStore + Transactional,
    {
        let query = WorkItemQuery {
            statuses: run.statuses.clone(),
            ticket_ids: run.ticket_ids.clone(),
        };
        let items = store.list_work_items(&query)?;
        let candidates: Vec<AffinityCandidate> = items.iter().map(AffinityCandidate::from).collect();
        let groups = self.compute(&candidates, annotator);

        store.atomically(|tx| {
            if run.clear_existing {
                tx.clear_affinity_groups()?;
            }
            tx.insert_affinity_groups(&groups)
        })?;

        tracing::info!(items = items.len(), groups = groups.len(), "affinity groups stored");
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrative::testing::{EchoAnnotator, FailingAnnotator};
    use crate::narrative::DisabledAnnotator;

    fn cand(id: &str, ticket: &str, tags: &[&str]) -> AffinityCandidate {
        AffinityCandidate {
            id: id.into(),
            ticket_id: ticket.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            text: format!("work {id}"),
        }
    }

    #[test]
    fn normalize_lowercases_and_dots_spaces() {
        assert_eq!(normalize_tag("  AWS Lambda "), "aws.lambda");
        assert_eq!(normalize_tag("db\tPostgres\nPrimary"), "db.postgres.primary");
    }

    #[test]
    fn environment_aliases_are_canonical() {
        for (tag, env) in [
            ("development", Environment::Dev),
            ("Stage", Environment::Staging),
            ("preprod", Environment::Staging),
            ("PRODUCTION", Environment::Prod),
        ] {
            assert_eq!(TagSignature::from_tags(&[tag]).environment, Some(env));
        }
    }

    #[test]
    fn contexts_sorted_deduped_and_qualifier_stripped() {
        let sig = TagSignature::from_tags(&["terraform.module:vpc", "aws.lambda", "AWS Lambda", "python"]);
        assert_eq!(sig.contexts, vec!["aws.lambda", "terraform.module"]);
        assert_eq!(sig.key(), "aws.lambda+terraform.module");
    }

    #[test]
    fn key_includes_environment() {
        let sig = TagSignature::from_tags(&["k8s.ingress", "prod"]);
        assert_eq!(sig.key(), "k8s.ingress:prod");
        assert_eq!(TagSignature::from_tags(&["staging"]).key(), "misc:staging");
        assert_eq!(TagSignature::from_tags::<&str>(&[]).key(), "misc");
    }

    #[test]
    fn rationale_lists_signals() {
        let sig = TagSignature::from_tags(&["aws.s3", "iam", "dev"]);
        assert_eq!(sig.rationale(), "shared context: aws.s3, iam; same environment: dev");
        assert_eq!(TagSignature::from_tags(&["python"]).rationale(), "similar tags");
    }

    #[test]
    fn singletons_are_not_materialized() {
        let groups = AffinityGrouper::new().compute(
            &[
                cand("a", "T1", &["aws.lambda"]),
                cand("b", "T2", &["aws.lambda"]),
                cand("c", "T3", &["docker"]),
            ],
            &DisabledAnnotator,
        );
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].key, "aws.lambda");
        assert_eq!(groups[0].member_ids, vec!["a", "b"]);
        assert!(groups.iter().all(|g| g.member_ids.len() >= 2));
    }

    #[test]
    fn groups_ordered_by_key() {
        let groups = AffinityGrouper::new().compute(
            &[
                cand("a", "T1", &["terraform"]),
                cand("b", "T1", &["aws.s3"]),
                cand("c", "T2", &["terraform"]),
                cand("d", "T2", &["aws.s3"]),
            ],
            &DisabledAnnotator,
        );
        let keys: Vec<_> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["aws.s3", "terraform"]);
    }

    #[test]
    fn narrative_appended_when_available() {
        let groups = AffinityGrouper::new().compute(
            &[cand("a", "T1", &["iam"]), cand("b", "T2", &["iam"])],
            &EchoAnnotator::default(),
        );
        assert_eq!(groups[0].rationale, "shared context: iam | about iam");
    }

    #[test]
    fn narrative_failure_keeps_deterministic_rationale() {
        let annotator = FailingAnnotator::default();
        let groups = AffinityGrouper::new().compute(
            &[cand("a", "T1", &["iam"]), cand("b", "T2", &["iam"])],
            &annotator,
        );
        assert_eq!(groups[0].rationale, "shared context: iam");
        assert_eq!(annotator.calls.get(), 1);
    }

    #[test]
    fn grouping_is_idempotent() {
        let input = vec![
            cand("a", "T1", &["aws.lambda", "prod"]),
            cand("b", "T2", &["aws.lambda", "production"]),
            cand("c", "T3", &["db.postgres"]),
            cand("d", "T3", &["db.postgres"]),
        ];
        let first = AffinityGrouper::new().compute(&input, &DisabledAnnotator);
        let second = AffinityGrouper::new().compute(&input, &DisabledAnnotator);
        assert_eq!(first, second);
    }
}
