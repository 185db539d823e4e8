pub mod rows;
mod shape;
pub mod value;

pub use rows::{ColumnSet, ResultSet, Row};
pub use value::{FromSqlValue, SqlValue};
