use bson::doc;
use mongodb::Database;

use callpilot_db::models::SuggestionRecord;

use super::base::{BaseDao, DaoResult};

pub struct SuggestionDao {
    base: BaseDao<SuggestionRecord>,
}

impl SuggestionDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, SuggestionRecord::COLLECTION),
        }
    }

    pub async fn insert(&self, record: &SuggestionRecord) -> DaoResult<bson::oid::ObjectId> {
        self.base.insert_one(record).await
    }

    /// Most recent suggestions for a call, oldest first.
    pub async fn recent(&self, call_id: &str, limit: i64) -> DaoResult<Vec<SuggestionRecord>> {
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
