pub mod job;

pub use job::{JobRow, NewJob, JOB_COLUMNS, PG_JOB_COLUMNS};
