pub mod handlers;
pub mod insights;
pub mod listing;
pub mod memory;
pub mod repository;
pub mod store;
pub mod text;

pub use insights::JobInsights;
pub use listing::JobListings;
pub use memory::MemoryJobStore;
pub use repository::JobRepository;
pub use store::{JobStore, SqlJobStore};
