//! MongoDB client and provenance store
//!
//! Connection handling keeps a short server-selection timeout so an
//! unreachable MongoDB fails fast at startup instead of hanging.

use bson::{doc, DateTime};
use futures_util::StreamExt;
use mongodb::{Client, Collection, IndexModel};
use tracing::{error, info};

use crate::db::schemas::{ConversionRecord, CONVERSIONS_COLLECTION};
use crate::types::{ConvertError, Result};

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and verify with a ping
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB at {}", uri);

        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| ConvertError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| ConvertError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get the raw MongoDB client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Get the database name
    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Typed access to the conversions collection.
#[derive(Clone)]
pub struct ProvenanceStore {
    collection: Collection<ConversionRecord>,
}

impl ProvenanceStore {
    /// Open the collection and apply its indexes
    pub async fn new(client: &MongoClient) -> Result<Self> {
        let collection = client
            .inner()
            .database(client.db_name())
            .collection::<ConversionRecord>(CONVERSIONS_COLLECTION);

        let indices: Vec<IndexModel> = ConversionRecord::indices()
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        collection
            .create_indexes(indices)
            .await
            .map_err(|e| ConvertError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(Self { collection })
    }

    /// Insert one conversion record, stamping `created_at`
    pub async fn insert(&self, mut record: ConversionRecord) -> Result<()> {
        record.created_at = Some(DateTime::now());

        self.collection
            .insert_one(record)
            .await
            .map_err(|e| ConvertError::Database(format!("Insert failed: {}", e)))?;

        Ok(())
    }

    /// Most recent conversions for a license key within the recency window,
    /// newest first, capped at `limit`.
    pub async fn recent(
        &self,
        license_key: &str,
        window_hours: i64,
        limit: i64,
    ) -> Result<Vec<ConversionRecord>> {
        let cutoff = DateTime::from_millis(
            DateTime::now().timestamp_millis() - window_hours * 60 * 60 * 1000,
        );

        let filter = doc! {
            "license_key": license_key,
            "created_at": { "$gte": cutoff },
        };

        let cursor = self
            .collection
            .find(filter)
            .sort(doc! { "created_at": -1 })
            .limit(limit)
            .await
            .map_err(|e| ConvertError::Database(format!("Find failed: {}", e)))?;

        let records: Vec<ConversionRecord> = cursor
            .filter_map(|item| async {
                match item {
                    Ok(record) => Some(record),
                    Err(e) => {
                        error!("Error reading conversion record: {}", e);
                        None
                    }
                }
            })
            .collect()
            .await;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    // Store operations require a running MongoDB instance; covered by the
    // schema round-trip tests in db::schemas and deployment smoke tests.
}
