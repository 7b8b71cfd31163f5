//! Automatic reload-and-retry for unloaded collections
//!
//! The single recovery path in the crate: a backend failure whose
//! message carries the recognized "collection not loaded" marker
//! triggers one load-state reconciliation and a bounded retry. Every
//! other failure propagates immediately.

use crate::backend::VectorBackend;
use crate::error::Result;
use crate::schema::convert::load_status;
use crate::schema::registry::EntitySchema;
use std::future::Future;
use tracing::warn;

pub async fn execute_with_retry<T, F, Fut>(
    operation: F,
    schema: &EntitySchema,
    backend: &dyn VectorBackend,
    max_attempts: usize,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_collection_not_loaded() && attempt < max_attempts => {
                warn!(
                    collection = %schema.collection_name,
                    attempt,
                    "Collection not loaded, reloading and retrying"
                );
                load_status(schema, backend).await?;
            }
            Err(err) => return Err(err),
        }
    }
}
