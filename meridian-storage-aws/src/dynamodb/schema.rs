//! DynamoDB table schema for the feature store.
//!
//! One table holds every row family. The partition key is the dataset, the
//! sort key is the row key (`id!…`, `cell!…`, `metadata!…`), so prefix
//! range queries stay inside one partition.

/// Partition key attribute.
pub const ATTR_DATASET: &str = "dataset";

/// Sort key attribute.
pub const ATTR_ID: &str = "id";

/// Largest batch accepted by BatchGetItem.
pub const BATCH_GET_LIMIT: usize = 100;
