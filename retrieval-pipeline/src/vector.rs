use qdrant_client::qdrant::{point_id::PointIdOptions, value::Kind, SearchPointsBuilder};
use qdrant_client::Qdrant;
use tracing::{debug, info};

use common::error::AppError;

/// Read-only view over the entity-description embedding collection the
/// external indexer populated.
pub struct EntityVectorStore {
    client: Qdrant,
    collection: String,
}

impl EntityVectorStore {
    /// Builds the client. The connection is lazy; [`Self::verify_collection`]
    /// is the first real round trip.
    pub fn connect(url: &str, collection: &str) -> Result<Self, AppError> {
        let client = Qdrant::from_url(url).build()?;
        Ok(Self {
            client,
            collection: collection.to_string(),
        })
    }

    /// Confirms the expected collection exists among the store's collections.
    /// A missing collection means indexing never ran (or ran elsewhere), so
    /// the error lists what is actually there.
    pub async fn verify_collection(&self) -> Result<(), AppError> {
        let collections = self.client.list_collections().await?;
        let names: Vec<String> = collections
            .collections
            .into_iter()
            .map(|c| c.name)
            .collect();

        if names.iter().any(|name| *name == self.collection) {
            info!(collection = %self.collection, "vector store collection check passed");
            Ok(())
        } else {
            Err(AppError::Engine(format!(
                "vector store collection '{}' not found, available: [{}]",
                self.collection,
                names.join(", ")
            )))
        }
    }

    /// Nearest-neighbour lookup returning the entity ids of the closest
    /// embedded descriptions.
    pub async fn search_entity_ids(
        &self,
        embedding: Vec<f32>,
        limit: u64,
    ) -> Result<Vec<String>, AppError> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, embedding, limit).with_payload(true),
            )
            .await?;

        let ids: Vec<String> = response
            .result
            .into_iter()
            .filter_map(|point| {
                // The indexer stores the entity id in the payload; fall back
                // to the point id when that field is absent.
                let payload_id = point.payload.get("id").and_then(|value| match &value.kind {
                    Some(Kind::StringValue(v)) => Some(v.clone()),
                    _ => None,
                });
                payload_id.or_else(|| {
                    point.id.and_then(|id| match id.point_id_options {
                        Some(PointIdOptions::Uuid(uuid)) => Some(uuid),
                        Some(PointIdOptions::Num(num)) => Some(num.to_string()),
                        None => None,
                    })
                })
            })
            .collect();

        debug!(hits = ids.len(), "vector search returned entity ids");
        Ok(ids)
    }
}
