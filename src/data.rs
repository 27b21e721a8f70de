use crate::report::ReportType;
use datafusion::arrow::datatypes::{DataType, Field, Schema};
use std::sync::Arc;

/// Warehouse type of a report column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Utf8,
    Int64,
    Float64,
    Date32,
}

impl From<ColumnType> for DataType {
    fn from(column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::Utf8 => DataType::Utf8,
            ColumnType::Int64 => DataType::Int64,
            ColumnType::Float64 => DataType::Float64,
            ColumnType::Date32 => DataType::Date32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub column_type: ColumnType,
}

impl Column {
    pub const fn new(name: &'static str, column_type: ColumnType) -> Self {
        Column { name, column_type }
    }
}

/// Creates the schema a report's CSV is read with and its table is written with.
///
/// Every field is nullable since the service leaves cells empty when a metric
/// does not apply.
pub fn report_schema(report_type: ReportType) -> Arc<Schema> {
    Arc::new(Schema::new(
        report_type
            .columns()
            .iter()
            .map(|column| Field::new(column.name, column.column_type.into(), true))
            .collect::<Vec<_>>(),
    ))
}
