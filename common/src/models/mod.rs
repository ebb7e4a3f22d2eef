//! Shared data models for all services.

pub mod catalog;
pub mod query;
pub mod resource;

// Re-export commonly used types
pub use catalog::{DatabaseInfo, SchemaInfo, TableInfo, UserInfo};
pub use query::{ColumnInfo, QueryRequest, QueryResult};
pub use resource::{
    ColumnDef, ColumnType, CreateTableRequest, ExistsResult, LoadResult, LoadRowsRequest,
    MaterializeRequest, Outcome, ProvisionResult, ResourceKind, ResourceRef,
};
