pub mod estimator;
pub mod lookup;

pub use estimator::{estimate, passes_salary_floor, SalaryEstimate};
pub use lookup::{SalaryLookup, SalaryRecord, SqlSalaryLookup, StaticSalaryTable};
