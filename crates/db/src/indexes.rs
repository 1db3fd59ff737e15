use mongodb::{Database, IndexModel, options::IndexOptions};
use tracing::info;

use crate::models::{SuggestionRecord, TranscriptRecord};

pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    // Transcripts
    create_indexes(
        db,
        TranscriptRecord::COLLECTION,
        vec![
            index(bson::doc! { "call_id": 1, "created_at": -1 }),
            // Storage-level guard against duplicate deliveries that slip
            // past the in-memory filter (e.g. across restarts).
            index_unique(bson::doc! { "call_id": 1, "event_id": 1 }),
        ],
    )
    .await?;

    // Suggestions
    create_indexes(
        db,
        SuggestionRecord::COLLECTION,
        vec![index(bson::doc! { "call_id": 1, "created_at": -1 })],
    )
    .await?;

    info!("MongoDB indexes ensured");
    Ok(())
}

async fn create_indexes(
    db: &Database,
    collection: &str,
    models: Vec<IndexModel>,
) -> Result<(), mongodb::error::Error> {
    let coll = db.collection::<bson::Document>(collection);
    coll.create_indexes(models).await?;
    Ok(())
}

fn index(keys: bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn index_unique(keys: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}
