use std::path::Path;

use serde::Deserialize;
use tokio::fs;
use tracing::{info, warn};

use common::error::AppError;

pub const ENTITY_TABLE: &str = "entities.json";
pub const RELATIONSHIP_TABLE: &str = "relationships.json";
pub const TEXT_UNIT_TABLE: &str = "text_units.json";
pub const COMMUNITY_TABLE: &str = "communities.json";
pub const COMMUNITY_REPORT_TABLE: &str = "community_reports.json";
pub const CLAIM_TABLE: &str = "claims.json";

const REQUIRED_TABLES: [&str; 5] = [
    ENTITY_TABLE,
    RELATIONSHIP_TABLE,
    TEXT_UNIT_TABLE,
    COMMUNITY_TABLE,
    COMMUNITY_REPORT_TABLE,
];

#[derive(Deserialize, Debug, Clone)]
pub struct Entity {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub text_unit_ids: Vec<String>,
    #[serde(default)]
    pub degree: f64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Relationship {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub weight: f64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TextUnit {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub entity_ids: Vec<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Community {
    pub id: String,
    pub community: i64,
    #[serde(default)]
    pub level: i64,
    #[serde(default)]
    pub entity_ids: Vec<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CommunityReport {
    pub id: String,
    pub community: i64,
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub rank: f64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Claim {
    pub id: String,
    pub subject_id: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// The loaded index artifacts the context builder selects from. Produced by
/// the external indexing process; read-only here.
#[derive(Debug, Clone, Default)]
pub struct ArtifactTables {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
    pub text_units: Vec<TextUnit>,
    pub communities: Vec<Community>,
    pub community_reports: Vec<CommunityReport>,
    pub claims: Vec<Claim>,
}

/// Checks that every required artifact table is present before attempting a
/// load, so a half-finished index run fails with one descriptive error.
pub fn verify_artifacts(output_dir: &Path) -> Result<(), AppError> {
    let missing: Vec<&str> = REQUIRED_TABLES
        .iter()
        .filter(|name| !output_dir.join(name).exists())
        .copied()
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::Engine(format!(
            "missing required index artifacts in {}: {}",
            output_dir.display(),
            missing.join(", ")
        )))
    }
}

impl ArtifactTables {
    pub async fn load(output_dir: &Path) -> Result<Self, AppError> {
        let entities: Vec<Entity> = read_table(&output_dir.join(ENTITY_TABLE)).await?;
        let relationships: Vec<Relationship> =
            read_table(&output_dir.join(RELATIONSHIP_TABLE)).await?;
        let text_units: Vec<TextUnit> = read_table(&output_dir.join(TEXT_UNIT_TABLE)).await?;
        let communities: Vec<Community> = read_table(&output_dir.join(COMMUNITY_TABLE)).await?;
        let community_reports: Vec<CommunityReport> =
            read_table(&output_dir.join(COMMUNITY_REPORT_TABLE)).await?;

        // Claims are an optional output of the indexer.
        let claim_path = output_dir.join(CLAIM_TABLE);
        let claims: Vec<Claim> = if claim_path.exists() {
            read_table(&claim_path).await?
        } else {
            warn!(
                "claims table '{}' not found in {}, skipping",
                CLAIM_TABLE,
                output_dir.display()
            );
            Vec::new()
        };

        info!(
            entities = entities.len(),
            relationships = relationships.len(),
            text_units = text_units.len(),
            reports = community_reports.len(),
            claims = claims.len(),
            "loaded index artifacts"
        );

        Ok(Self {
            entities,
            relationships,
            text_units,
            communities,
            community_reports,
            claims,
        })
    }
}

async fn read_table<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>, AppError> {
    let raw = fs::read_to_string(path).await?;
    serde_json::from_str(&raw).map_err(|e| {
        AppError::Engine(format!("malformed artifact table {}: {e}", path.display()))
    })
}
