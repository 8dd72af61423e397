use study_core::model::{Resource, ResourceChunk, ResourceId, UserId};

use super::SqliteRepository;
use super::mapping::{db, embedding_to_blob, map_chunk_row, map_resource_row};
use crate::repository::{ResourceRepository, StorageError};

const RESOURCE_COLUMNS: &str = "id, user_id, filename, file_path, file_type, topic, \
     extracted_text, processed, embeddings_generated, uploaded_at";

#[async_trait::async_trait]
impl ResourceRepository for SqliteRepository {
    async fn insert_resource(&self, resource: &Resource) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO resources (
                id, user_id, filename, file_path, file_type, topic,
                extracted_text, processed, embeddings_generated, uploaded_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
        )
        .bind(resource.id.to_string())
        .bind(resource.user_id.to_string())
        .bind(&resource.filename)
        .bind(&resource.file_path)
        .bind(&resource.file_type)
        .bind(&resource.topic)
        .bind(&resource.extracted_text)
        .bind(i64::from(resource.processed))
        .bind(i64::from(resource.embeddings_generated))
        .bind(resource.uploaded_at)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn get_resource(&self, id: ResourceId) -> Result<Resource, StorageError> {
        let row = sqlx::query(&format!("SELECT {RESOURCE_COLUMNS} FROM resources WHERE id = ?1"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?
            .ok_or(StorageError::NotFound)?;
        map_resource_row(&row)
    }

    async fn list_resources(&self, user_id: UserId) -> Result<Vec<Resource>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {RESOURCE_COLUMNS} FROM resources WHERE user_id = ?1 ORDER BY uploaded_at DESC"
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        rows.iter().map(map_resource_row).collect()
    }

    async fn delete_resource(&self, id: ResourceId) -> Result<(), StorageError> {
        // Chunks go with the row through ON DELETE CASCADE.
        let res = sqlx::query("DELETE FROM resources WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn store_chunks(&self, id: ResourceId, chunks: &[ResourceChunk]) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(db)?;

        let res = sqlx::query("UPDATE resources SET embeddings_generated = 1 WHERE id = ?1")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        sqlx::query("DELETE FROM resource_chunks WHERE resource_id = ?1")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(db)?;

        for chunk in chunks {
            sqlx::query(
                r"
                INSERT INTO resource_chunks (resource_id, ordinal, text, embedding)
                VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(id.to_string())
            .bind(i64::from(chunk.ordinal))
            .bind(&chunk.text)
            .bind(embedding_to_blob(&chunk.embedding))
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        }

        tx.commit().await.map_err(db)?;
        Ok(())
    }

    async fn list_chunks(&self, id: ResourceId) -> Result<Vec<ResourceChunk>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT resource_id, ordinal, text, embedding
            FROM resource_chunks
            WHERE resource_id = ?1
            ORDER BY ordinal ASC
            ",
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        rows.iter().map(map_chunk_row).collect()
    }
}
