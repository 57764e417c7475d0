pub mod engine;
pub mod ordering;
pub mod pipeline;
pub mod typemap;

pub use crate::domain::model::{CopyPlan, CopyReport, Row, TableDef};
pub use crate::domain::ports::{ConfigProvider, Pipeline, TableSink, TableSource};
pub use crate::utils::error::Result;
