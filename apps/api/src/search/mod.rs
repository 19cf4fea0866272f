//! Query normalization, predicate construction and result caching.

pub mod cache;
pub mod filter;
pub mod normalize;
pub mod predicate;
pub mod query;
pub mod salary_query;

pub use cache::{CacheSettings, Clock, SystemClock, TtlCache};
pub use filter::JobFilter;
pub use predicate::{PlaceholderStyle, SqlParam, SqlQuery, SqlWriter};
pub use query::SearchQuery;
