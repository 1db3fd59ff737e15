use bson::{Document, oid::ObjectId};
use futures::TryStreamExt;
use mongodb::{Collection, Database};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaoError {
    #[error("resource not found")]
    NotFound,
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
    #[error(transparent)]
    Mongo(#[from] mongodb::error::Error),
}

pub type DaoResult<T> = Result<T, DaoError>;

/// Thin generic accessor over one MongoDB collection.
pub struct BaseDao<T: Send + Sync> {
    collection: Collection<T>,
}

impl<T> BaseDao<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(db: &Database, name: &str) -> Self {
        Self {
            collection: db.collection(name),
        }
    }

    pub async fn insert_one(&self, doc: &T) -> DaoResult<ObjectId> {
        let result = self.collection.insert_one(doc).await.map_err(map_mongo)?;
        result
            .inserted_id
            .as_object_id()
            .ok_or(DaoError::NotFound)
    }

    pub async fn find_many(
        &self,
        filter: Document,
        sort: Option<Document>,
        limit: Option<i64>,
    ) -> DaoResult<Vec<T>> {
        let mut find = self.collection.find(filter);
        if let Some(sort) = sort {
            find = find.sort(sort);
        }
        if let Some(limit) = limit {
            find = find.limit(limit);
        }
        let cursor = find.await?;
        Ok(cursor.try_collect().await?)
    }
}

fn map_mongo(err: mongodb::error::Error) -> DaoError {
    use mongodb::error::{ErrorKind, WriteFailure};
    if let ErrorKind::Write(WriteFailure::WriteError(ref we)) = *err.kind {
        // 11000: duplicate key
        if we.code == 11000 {
            return DaoError::DuplicateKey(we.message.clone());
        }
    }
    DaoError::Mongo(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use callpilot_db::models::{SuggestionRecord, TranscriptRecord};

    // Collection<T> demands Send + Sync document types; instantiating the
    // DAO with the real models keeps that bound honest.
    #[test]
    fn dao_is_shareable_across_tasks() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BaseDao<TranscriptRecord>>();
        assert_send_sync::<BaseDao<SuggestionRecord>>();
    }
}
