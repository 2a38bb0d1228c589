pub mod data_source;

pub use data_source::{
    Collection, DataSource, Predicate, QueryOptions, QueryResult, Range, RecordKey, SearchSpec,
    SortSpec,
};
