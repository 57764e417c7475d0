use crate::core::{Row, TableDef, TableSink};
use crate::domain::model::{ColumnType, SqlValue};
use crate::utils::error::Result;
use sqlx::mysql::{MySql, MySqlPool, MySqlPoolOptions};
use sqlx::query_builder::Separated;
use sqlx::QueryBuilder;
use std::time::Duration;

/// Placeholders the MySQL protocol allows in one prepared statement.
pub const MAX_BIND_PARAMETERS: usize = 65_535;

/// Longest VARCHAR that still fits a utf8mb4 row; longer strings become TEXT.
pub const MAX_VARCHAR_LENGTH: u32 = 16_383;

pub const MAX_DECIMAL_PRECISION: u32 = 65;
pub const MAX_DECIMAL_SCALE: u32 = 30;

pub struct MySqlSink {
    pool: MySqlPool,
}

impl MySqlSink {
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(timeout)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[async_trait::async_trait]
impl TableSink for MySqlSink {
    async fn recreate_table(&self, table: &TableDef) -> Result<()> {
        sqlx::query(&drop_table_sql(table))
            .execute(&self.pool)
            .await?;

        let ddl = create_table_sql(table);
        tracing::debug!(ddl = %ddl, "creating table");
        sqlx::query(&ddl).execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_rows(&self, table: &TableDef, rows: &[Row]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::<MySql>::new(insert_prefix(table));
        builder.push_values(rows, |mut values, row| {
            for value in row {
                bind_value(&mut values, value);
            }
        });

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    fn max_bind_parameters(&self) -> usize {
        MAX_BIND_PARAMETERS
    }
}

pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

pub fn column_type_sql(column_type: &ColumnType) -> String {
    match column_type {
        ColumnType::SmallInteger => "SMALLINT".to_string(),
        ColumnType::Integer => "INTEGER".to_string(),
        ColumnType::BigInteger => "BIGINT".to_string(),
        ColumnType::Float => "FLOAT".to_string(),
        ColumnType::Double => "DOUBLE".to_string(),
        ColumnType::Numeric {
            precision: Some(p),
            scale,
        } if *p <= MAX_DECIMAL_PRECISION && scale.unwrap_or(0) <= MAX_DECIMAL_SCALE => {
            format!("NUMERIC({}, {})", p, scale.unwrap_or(0))
        }
        // Wider than DECIMAL allows; the text form keeps every digit.
        ColumnType::Numeric { precision: Some(_), .. } => "TEXT".to_string(),
        // Unconstrained numerics would silently become DECIMAL(10, 0).
        ColumnType::Numeric { precision: None, .. } => "DECIMAL(65, 30)".to_string(),
        ColumnType::Boolean => "BOOL".to_string(),
        ColumnType::String { length: Some(n) } if *n <= MAX_VARCHAR_LENGTH => format!("VARCHAR({})", n),
        ColumnType::String { .. } | ColumnType::Text | ColumnType::Other(_) => "TEXT".to_string(),
        ColumnType::Date => "DATE".to_string(),
        ColumnType::Time => "TIME(6)".to_string(),
        ColumnType::DateTime { .. } => "DATETIME(6)".to_string(),
        ColumnType::Binary => "LONGBLOB".to_string(),
        ColumnType::Json => "JSON".to_string(),
        ColumnType::Uuid => "VARCHAR(36)".to_string(),
        ColumnType::Interval => "VARCHAR(64)".to_string(),
    }
}

pub fn drop_table_sql(table: &TableDef) -> String {
    format!("DROP TABLE IF EXISTS {}", quote_ident(&table.name))
}

pub fn create_table_sql(table: &TableDef) -> String {
    let columns: Vec<String> = table
        .columns
        .iter()
        .map(|column| {
            let null = if column.nullable { "" } else { " NOT NULL" };
            format!(
                "  {} {}{}",
                quote_ident(&column.name),
                column_type_sql(&column.column_type),
                null
            )
        })
        .collect();

    format!(
        "CREATE TABLE {} (\n{}\n)",
        quote_ident(&table.name),
        columns.join(",\n")
    )
}

fn insert_prefix(table: &TableDef) -> String {
    let columns: Vec<String> = table.column_names().map(quote_ident).collect();
    format!(
        "INSERT INTO {} ({}) ",
        quote_ident(&table.name),
        columns.join(", ")
    )
}

fn bind_value<'qb, 'args: 'qb>(values: &mut Separated<'qb, 'args, MySql, &'static str>, value: &SqlValue) {
    match value {
        SqlValue::Null => values.push_bind(None::<String>),
        SqlValue::Bool(v) => values.push_bind(*v),
        SqlValue::Int(v) => values.push_bind(*v),
        SqlValue::Float(v) => values.push_bind(*v),
        SqlValue::Text(v) => values.push_bind(v.clone()),
        SqlValue::Bytes(v) => values.push_bind(v.clone()),
        SqlValue::Date(v) => values.push_bind(*v),
        SqlValue::Time(v) => values.push_bind(*v),
        SqlValue::DateTime(v) => values.push_bind(*v),
        SqlValue::DateTimeTz(v) => values.push_bind(v.naive_utc()),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::ColumnDef;

    #[test]
    fn test_create_table_sql() {
        let table = TableDef::new(
            "dbin_users",
            vec![
                ColumnDef::new("id", ColumnType::String { length: Some(36) }).not_null(),
                ColumnDef::new("num", ColumnType::Integer),
                ColumnDef::new("full_name", ColumnType::String { length: Some(512) }),
            ],
        );
        assert_eq!(
            create_table_sql(&table),
            "CREATE TABLE `dbin_users` (\n  `id` VARCHAR(36) NOT NULL,\n  `num` INTEGER,\n  `full_name` VARCHAR(512)\n)"
        );
        assert_eq!(drop_table_sql(&table), "DROP TABLE IF EXISTS `dbin_users`");
    }

    #[test]
    fn test_column_types() {
        assert_eq!(
            column_type_sql(&ColumnType::Numeric {
                precision: Some(12),
                scale: Some(4)
            }),
            "NUMERIC(12, 4)"
        );
        assert_eq!(
            column_type_sql(&ColumnType::Numeric {
                precision: None,
                scale: None
            }),
            "DECIMAL(65, 30)"
        );
        assert_eq!(
            column_type_sql(&ColumnType::Numeric {
                precision: Some(65),
                scale: Some(30)
            }),
            "NUMERIC(65, 30)"
        );
        assert_eq!(
            column_type_sql(&ColumnType::Numeric {
                precision: Some(100),
                scale: Some(40)
            }),
            "TEXT"
        );
        assert_eq!(
            column_type_sql(&ColumnType::Numeric {
                precision: Some(40),
                scale: Some(35)
            }),
            "TEXT"
        );
        assert_eq!(column_type_sql(&ColumnType::String { length: Some(70_000) }), "TEXT");
        assert_eq!(column_type_sql(&ColumnType::DateTime { timezone: true }), "DATETIME(6)");
        assert_eq!(column_type_sql(&ColumnType::Binary), "LONGBLOB");
    }

    #[test]
    fn test_insert_prefix_quotes_identifiers() {
        let table = TableDef::new(
            "dbin_odd`table",
            vec![
                ColumnDef::new("a", ColumnType::Integer),
                ColumnDef::new("b c", ColumnType::Text),
            ],
        );
        assert_eq!(insert_prefix(&table), "INSERT INTO `dbin_odd``table` (`a`, `b c`) ");
    }
}
