use std::sync::Arc;

use tracing::{debug, info};

use storage::repository::ResourceRepository;
use study_core::model::{ResourceChunk, ResourceId, UserId};
use study_core::retrieval::{
    CHUNK_OVERLAP, CHUNK_SIZE, Candidate, RELEVANCE_THRESHOLD, SearchHit, chunk_words,
    format_context, rank,
};

use crate::ai::EmbeddingProvider;
use crate::error::DocumentError;

/// Embeds uploaded documents and finds the chunks closest to a query.
#[derive(Clone)]
pub struct RagService {
    resources: Arc<dyn ResourceRepository>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl RagService {
    #[must_use]
    pub fn new(resources: Arc<dyn ResourceRepository>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { resources, embedder }
    }

    /// Chunk a document's text, embed every chunk and store them.
    ///
    /// Returns the number of chunks stored.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::NoChunks` when the text is blank and
    /// `DocumentError::Embedding` when the provider fails.
    pub async fn generate_embeddings(&self, resource_id: ResourceId) -> Result<usize, DocumentError> {
        let resource = self.resources.get_resource(resource_id).await?;
        let texts = chunk_words(&resource.extracted_text, CHUNK_SIZE, CHUNK_OVERLAP);
        if texts.is_empty() {
            return Err(DocumentError::NoChunks);
        }

        let vectors = self.embedder.embed_batch(&texts).await?;
        let chunks: Vec<ResourceChunk> = texts
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(ordinal, (text, embedding))| ResourceChunk {
                resource_id,
                ordinal: u32::try_from(ordinal).unwrap_or(u32::MAX),
                text,
                embedding,
            })
            .collect();
        self.resources.store_chunks(resource_id, &chunks).await?;
        info!(
            resource_id = %resource_id,
            chunks = chunks.len(),
            provider = self.embedder.provider_name(),
            "stored document embeddings"
        );
        Ok(chunks.len())
    }

    /// Best matching chunks across the user's embedded documents.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::Embedding` when the query cannot be embedded.
    pub async fn search(&self, user_id: UserId, query: &str, top_k: usize) -> Result<Vec<SearchHit>, DocumentError> {
        let resources: Vec<_> = self
            .resources
            .list_resources(user_id)
            .await?
            .into_iter()
            .filter(|r| r.embeddings_generated)
            .collect();
        if resources.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query).await?;
        let mut loaded = Vec::with_capacity(resources.len());
        for resource in &resources {
            let chunks: Vec<(String, Vec<f32>)> = self
                .resources
                .list_chunks(resource.id)
                .await?
                .into_iter()
                .map(|c| (c.text, c.embedding))
                .collect();
            loaded.push(chunks);
        }
        let candidates: Vec<Candidate<'_>> = resources
            .iter()
            .zip(&loaded)
            .map(|(resource, chunks)| Candidate {
                resource_id: resource.id,
                filename: &resource.filename,
                chunks,
            })
            .collect();
        Ok(rank(&query_vector, &candidates, top_k, RELEVANCE_THRESHOLD))
    }

    /// Prompt block built from the best matches, `None` when nothing is
    /// relevant enough.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::Embedding` when the query cannot be embedded.
    pub async fn context_for_query(
        &self,
        user_id: UserId,
        query: &str,
        top_k: usize,
    ) -> Result<Option<String>, DocumentError> {
        let hits = self.search(user_id, query, top_k).await?;
        match format_context(&hits) {
            Some(context) => {
                info!(%user_id, hits = hits.len(), chars = context.len(), "found document context");
                Ok(Some(context))
            }
            None => {
                debug!(%user_id, "no relevant document context");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::Storage;
    use study_core::model::Resource;
    use study_core::retrieval::DEFAULT_TOP_K;
    use study_core::time::fixed_now;

    use crate::ai::HashingEmbeddingProvider;
    use crate::testing::learner;

    async fn resource(storage: &Storage, user_id: UserId, filename: &str, text: &str) -> ResourceId {
        let resource = Resource {
            id: ResourceId::generate(),
            user_id,
            filename: filename.into(),
            file_path: format!("/tmp/{filename}"),
            file_type: "pdf".into(),
            topic: None,
            extracted_text: text.into(),
            processed: true,
            embeddings_generated: false,
            uploaded_at: fixed_now(),
        };
        storage.resources.insert_resource(&resource).await.unwrap();
        resource.id
    }

    fn service(storage: &Storage) -> RagService {
        RagService::new(
            storage.resources.clone(),
            Arc::new(HashingEmbeddingProvider::new(384)),
        )
    }

    #[tokio::test]
    async fn embedded_documents_answer_related_queries() {
        let (storage, user) = learner(&["Biology"]).await;
        let plants = resource(
            &storage,
            user.id,
            "plants.pdf",
            "Photosynthesis converts sunlight into chemical energy inside plant leaves. \
             Chlorophyll absorbs light and leaves release oxygen.",
        )
        .await;
        let databases = resource(
            &storage,
            user.id,
            "databases.pdf",
            "Normalization organizes relational tables to reduce redundancy.",
        )
        .await;
        let service = service(&storage);
        assert_eq!(service.generate_embeddings(plants).await.unwrap(), 1);
        service.generate_embeddings(databases).await.unwrap();

        let hits = service
            .search(user.id, "how does photosynthesis work in plant leaves", DEFAULT_TOP_K)
            .await
            .unwrap();
        assert_eq!(hits[0].filename, "plants.pdf");

        let context = service
            .context_for_query(user.id, "photosynthesis in leaves", DEFAULT_TOP_K)
            .await
            .unwrap()
            .unwrap();
        assert!(context.starts_with("Relevant information from your uploaded materials:"));
        assert!(context.contains("[From plants.pdf]"));
    }

    #[tokio::test]
    async fn documents_without_embeddings_are_not_searched() {
        let (storage, user) = learner(&["Biology"]).await;
        resource(&storage, user.id, "notes.pdf", "Mitochondria produce energy.").await;
        let service = service(&storage);
        assert!(service.search(user.id, "mitochondria energy", 3).await.unwrap().is_empty());
        assert!(service.context_for_query(user.id, "mitochondria", 3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn blank_documents_have_no_chunks() {
        let (storage, user) = learner(&["Biology"]).await;
        let blank = resource(&storage, user.id, "blank.pdf", "   \n ").await;
        assert!(matches!(
            service(&storage).generate_embeddings(blank).await,
            Err(DocumentError::NoChunks)
        ));
    }
}
