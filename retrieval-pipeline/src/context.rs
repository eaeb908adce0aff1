use std::collections::HashSet;
use std::sync::Arc;

use async_openai::{config::OpenAIConfig, types::CreateEmbeddingRequestArgs, Client};
use tiktoken_rs::CoreBPE;
use tracing::debug;

use common::error::AppError;

use crate::artifacts::ArtifactTables;
use crate::vector::EntityVectorStore;

/// Context-selection policy. Proportions divide the total token budget
/// between raw source text, community summaries, and the graph neighbourhood.
#[derive(Debug, Clone)]
pub struct ContextParams {
    pub text_unit_prop: f64,
    pub community_prop: f64,
    pub conversation_history_max_turns: usize,
    pub top_k_entities: u64,
    pub top_k_relationships: usize,
    pub max_context_tokens: usize,
}

impl Default for ContextParams {
    fn default() -> Self {
        Self {
            text_unit_prop: 0.5,
            community_prop: 0.1,
            conversation_history_max_turns: 5,
            top_k_entities: 10,
            top_k_relationships: 10,
            max_context_tokens: 12_000,
        }
    }
}

/// Assembles a bounded prompt context for a query: embed the question, find
/// the nearest entities, then pull their relationships, claims, community
/// reports and source text under per-section token budgets.
pub struct MixedContextBuilder {
    tables: ArtifactTables,
    vector_store: EntityVectorStore,
    embedding_client: Client<OpenAIConfig>,
    embedding_model: String,
    bpe: Arc<CoreBPE>,
    params: ContextParams,
}

impl MixedContextBuilder {
    pub fn new(
        tables: ArtifactTables,
        vector_store: EntityVectorStore,
        embedding_client: Client<OpenAIConfig>,
        embedding_model: String,
        bpe: Arc<CoreBPE>,
        params: ContextParams,
    ) -> Self {
        Self {
            tables,
            vector_store,
            embedding_client,
            embedding_model,
            bpe,
            params,
        }
    }

    pub async fn build_context(&self, query: &str) -> Result<String, AppError> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(self.embedding_model.clone())
            .input([query])
            .build()?;
        let response = self.embedding_client.embeddings().create(request).await?;
        let embedding = response
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .ok_or_else(|| AppError::Engine("no embedding returned for query".to_string()))?;

        let entity_ids = self
            .vector_store
            .search_entity_ids(embedding, self.params.top_k_entities)
            .await?;
        debug!(mapped_entities = entity_ids.len(), "mapped query to entities");

        Ok(select_context(
            &self.tables,
            &self.params,
            &self.bpe,
            &entity_ids,
        ))
    }
}

// Shares of the graph-neighbourhood budget (the remainder after text units
// and community reports take their proportions).
const ENTITY_SHARE: f64 = 0.4;
const RELATIONSHIP_SHARE: f64 = 0.4;

/// Pure context assembly from already-resolved entity ids. Sections are
/// trimmed independently so one oversized table cannot starve the others.
pub fn select_context(
    tables: &ArtifactTables,
    params: &ContextParams,
    bpe: &CoreBPE,
    entity_ids: &[String],
) -> String {
    let selected: Vec<_> = entity_ids
        .iter()
        .filter_map(|id| tables.entities.iter().find(|e| e.id == *id))
        .collect();
    let selected_ids: HashSet<&str> = selected.iter().map(|e| e.id.as_str()).collect();
    let selected_titles: HashSet<&str> = selected.iter().map(|e| e.title.as_str()).collect();

    let total = params.max_context_tokens as f64;
    let text_budget = (total * params.text_unit_prop) as usize;
    let community_budget = (total * params.community_prop) as usize;
    let graph_budget = total * (1.0 - params.text_unit_prop - params.community_prop).max(0.0);
    let entity_budget = (graph_budget * ENTITY_SHARE) as usize;
    let relationship_budget = (graph_budget * RELATIONSHIP_SHARE) as usize;
    let claim_budget = (graph_budget * (1.0 - ENTITY_SHARE - RELATIONSHIP_SHARE)) as usize;

    let entity_lines = selected.iter().map(|e| {
        format!(
            "{}: {} (rank {:.0})",
            e.title,
            e.description.as_deref().unwrap_or("-"),
            e.degree
        )
    });

    let mut relationships: Vec<_> = tables
        .relationships
        .iter()
        .filter(|r| {
            selected_titles.contains(r.source.as_str()) || selected_titles.contains(r.target.as_str())
        })
        .collect();
    relationships.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    let relationship_lines = relationships
        .iter()
        .take(params.top_k_relationships)
        .map(|r| {
            format!(
                "{} -> {}: {}",
                r.source,
                r.target,
                r.description.as_deref().unwrap_or("-")
            )
        });

    let claim_lines = tables
        .claims
        .iter()
        .filter(|c| selected_ids.contains(c.subject_id.as_str()))
        .map(|c| c.description.clone().unwrap_or_else(|| c.id.clone()));

    let report_communities: HashSet<i64> = tables
        .communities
        .iter()
        .filter(|c| c.entity_ids.iter().any(|id| selected_ids.contains(id.as_str())))
        .map(|c| c.community)
        .collect();
    let mut reports: Vec<_> = tables
        .community_reports
        .iter()
        .filter(|r| report_communities.is_empty() || report_communities.contains(&r.community))
        .collect();
    reports.sort_by(|a, b| b.rank.total_cmp(&a.rank));
    let report_lines = reports.iter().map(|r| format!("{}: {}", r.title, r.summary));

    // Source text in entity-rank order, deduplicated.
    let mut seen = HashSet::new();
    let text_lines = selected
        .iter()
        .flat_map(|e| e.text_unit_ids.iter())
        .filter(|id| seen.insert(id.as_str()))
        .filter_map(|id| tables.text_units.iter().find(|t| t.id == *id))
        .map(|t| t.text.clone())
        .collect::<Vec<_>>();

    let sections = [
        ("Entities", take_within_budget(entity_lines, entity_budget, bpe)),
        (
            "Relationships",
            take_within_budget(relationship_lines, relationship_budget, bpe),
        ),
        ("Claims", take_within_budget(claim_lines, claim_budget, bpe)),
        (
            "Community Reports",
            take_within_budget(report_lines, community_budget, bpe),
        ),
        (
            "Sources",
            take_within_budget(text_lines.into_iter(), text_budget, bpe),
        ),
    ];

    sections
        .into_iter()
        .filter(|(_, lines)| !lines.is_empty())
        .map(|(title, lines)| format!("-----{title}-----\n{}", lines.join("\n")))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Accumulates lines until the token budget is exhausted.
fn take_within_budget(
    lines: impl Iterator<Item = String>,
    budget: usize,
    bpe: &CoreBPE,
) -> Vec<String> {
    let mut used = 0usize;
    let mut kept = Vec::new();
    for line in lines {
        let cost = bpe.encode_with_special_tokens(&line).len();
        if used.saturating_add(cost) > budget {
            break;
        }
        used = used.saturating_add(cost);
        kept.push(line);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{Claim, Community, CommunityReport, Entity, Relationship, TextUnit};
    use tiktoken_rs::cl100k_base;

    fn tables() -> ArtifactTables {
        ArtifactTables {
            entities: vec![
                Entity {
                    id: "e1".to_string(),
                    title: "DERIVATIVE".to_string(),
                    description: Some("Instantaneous rate of change".to_string()),
                    text_unit_ids: vec!["t1".to_string(), "t2".to_string()],
                    degree: 3.0,
                },
                Entity {
                    id: "e2".to_string(),
                    title: "LIMIT".to_string(),
                    description: Some("Value a function approaches".to_string()),
                    text_unit_ids: vec!["t2".to_string()],
                    degree: 2.0,
                },
            ],
            relationships: vec![
                Relationship {
                    id: "r1".to_string(),
                    source: "DERIVATIVE".to_string(),
                    target: "LIMIT".to_string(),
                    description: Some("defined via".to_string()),
                    weight: 2.0,
                },
                Relationship {
                    id: "r2".to_string(),
                    source: "INTEGRAL".to_string(),
                    target: "AREA".to_string(),
                    description: None,
                    weight: 9.0,
                },
            ],
            text_units: vec![
                TextUnit {
                    id: "t1".to_string(),
                    text: "The derivative measures how a function changes.".to_string(),
                    entity_ids: vec![],
                },
                TextUnit {
                    id: "t2".to_string(),
                    text: "Limits underpin derivatives.".to_string(),
                    entity_ids: vec![],
                },
            ],
            communities: vec![Community {
                id: "c1".to_string(),
                community: 0,
                level: 0,
                entity_ids: vec!["e1".to_string()],
            }],
            community_reports: vec![CommunityReport {
                id: "cr1".to_string(),
                community: 0,
                title: "Calculus basics".to_string(),
                summary: "Derivatives and limits".to_string(),
                rank: 7.0,
            }],
            claims: vec![Claim {
                id: "cl1".to_string(),
                subject_id: "e1".to_string(),
                description: Some("Introduced by Newton and Leibniz".to_string()),
            }],
        }
    }

    #[test]
    fn test_select_context_contains_expected_sections() {
        let bpe = cl100k_base().unwrap();
        let context = select_context(
            &tables(),
            &ContextParams::default(),
            &bpe,
            &["e1".to_string(), "e2".to_string()],
        );

        assert!(context.contains("-----Entities-----"));
        assert!(context.contains("DERIVATIVE: Instantaneous rate of change"));
        assert!(context.contains("DERIVATIVE -> LIMIT: defined via"));
        assert!(context.contains("Introduced by Newton and Leibniz"));
        assert!(context.contains("Calculus basics: Derivatives and limits"));
        assert!(context.contains("The derivative measures how a function changes."));
        // Relationship not touching a selected entity stays out.
        assert!(!context.contains("INTEGRAL"));
    }

    #[test]
    fn test_select_context_skips_unknown_entity_ids() {
        let bpe = cl100k_base().unwrap();
        let context = select_context(
            &tables(),
            &ContextParams::default(),
            &bpe,
            &["ghost".to_string()],
        );
        assert!(!context.contains("DERIVATIVE:"));
    }

    #[test]
    fn test_text_units_deduplicated_in_rank_order() {
        let bpe = cl100k_base().unwrap();
        let context = select_context(
            &tables(),
            &ContextParams::default(),
            &bpe,
            &["e1".to_string(), "e2".to_string()],
        );
        // t2 is referenced by both entities but appears once.
        assert_eq!(context.matches("Limits underpin derivatives.").count(), 1);
    }

    #[test]
    fn test_tiny_budget_trims_sections() {
        let bpe = cl100k_base().unwrap();
        let params = ContextParams {
            max_context_tokens: 10,
            ..ContextParams::default()
        };
        let context = select_context(&tables(), &params, &bpe, &["e1".to_string()]);
        assert!(!context.contains("-----Entities-----"));
    }

    #[test]
    fn test_take_within_budget_stops_at_limit() {
        let bpe = cl100k_base().unwrap();
        let lines = vec!["one two three".to_string(); 10];
        let kept = take_within_budget(lines.into_iter(), 7, &bpe);
        assert_eq!(kept.len(), 2);
    }
}
