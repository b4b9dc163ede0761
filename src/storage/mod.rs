pub mod postgres;
pub mod sqlite;
pub mod trait_def;

pub use postgres::PostgresStorage;
pub use sqlite::SqliteStorage;
pub use trait_def::{
    EventStore, Filter, FindOptions, Order, Source, StorageError, StorageResult, SumField,
};
