use bson::doc;
use mongodb::Database;

use callpilot_db::models::TranscriptRecord;

use super::base::{BaseDao, DaoResult};

pub struct TranscriptDao {
    base: BaseDao<TranscriptRecord>,
}

impl TranscriptDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, TranscriptRecord::COLLECTION),
        }
    }

    pub async fn insert(&self, record: &TranscriptRecord) -> DaoResult<bson::oid::ObjectId> {
        self.base.insert_one(record).await
    }

    /// Most recent transcripts for a call, oldest first.
    pub async fn recent(&self, call_id: &str, limit: i64) -> DaoResult<Vec<TranscriptRecord>> {
        let mut records = self
            .base
            .find_many(
                doc! { "call_id": call_id },
                Some(doc! { "created_at": -1 }),
                Some(limit),
            )
            .await?;
        records.reverse();
        Ok(records)
    }
}
