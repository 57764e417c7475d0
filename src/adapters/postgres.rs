use crate::core::typemap::{from_postgres, read_as_text};
use crate::core::{Row, TableDef, TableSource};
use crate::domain::model::{ColumnDef, ColumnType, SqlValue};
use crate::utils::error::{CopyError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row as _;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;

/// Rows buffered between the reading task and the writer.
const ROW_BUFFER: usize = 1024;

const COLUMNS_QUERY: &str = r#"
SELECT c.table_name::text AS table_name,
       c.column_name::text AS column_name,
       c.data_type::text AS data_type,
       c.udt_name::text AS udt_name,
       c.character_maximum_length::int4 AS char_length,
       c.numeric_precision::int4 AS numeric_precision,
       c.numeric_scale::int4 AS numeric_scale,
       (c.is_nullable::text = 'YES') AS nullable,
       c.column_default::text AS column_default
FROM information_schema.columns c
JOIN information_schema.tables t
  ON t.table_schema = c.table_schema AND t.table_name = c.table_name
WHERE c.table_schema = $1 AND t.table_type = 'BASE TABLE'
ORDER BY c.table_name, c.ordinal_position
"#;

const FOREIGN_KEYS_QUERY: &str = r#"
SELECT DISTINCT tc.table_name::text AS table_name,
       ccu.table_name::text AS referenced_table
FROM information_schema.table_constraints tc
JOIN information_schema.constraint_column_usage ccu
  ON ccu.constraint_schema = tc.constraint_schema
 AND ccu.constraint_name = tc.constraint_name
WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_schema = $1
ORDER BY 1, 2
"#;

pub struct PostgresSource {
    pool: PgPool,
    schema: String,
}

impl PostgresSource {
    pub async fn connect(url: &str, schema: &str, timeout: Duration) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(timeout)
            .connect(url)
            .await?;
        Ok(Self::from_pool(pool, schema))
    }

    pub fn from_pool(pool: PgPool, schema: &str) -> Self {
        Self {
            pool,
            schema: schema.to_string(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Replaces the `users` table with a single known row.
    pub async fn install_fixtures(&self) -> Result<()> {
        let table = format!("{}.{}", quote_ident(&self.schema), quote_ident("users"));

        sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
            .execute(&self.pool)
            .await?;
        sqlx::query(&format!(
            "CREATE TABLE {} (id UUID PRIMARY KEY, num INTEGER, full_name VARCHAR)",
            table
        ))
        .execute(&self.pool)
        .await?;
        sqlx::query(&format!(
            "INSERT INTO {} (id, num, full_name) VALUES ($1, $2, $3)",
            table
        ))
        .bind(uuid::Uuid::new_v4())
        .bind(2_i32)
        .bind("Louis de Funès")
        .execute(&self.pool)
        .await?;

        tracing::info!(schema = %self.schema, "installed fixtures");
        Ok(())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[async_trait::async_trait]
impl TableSource for PostgresSource {
    async fn reflect_tables(&self) -> Result<Vec<TableDef>> {
        let column_rows = sqlx::query(COLUMNS_QUERY)
            .bind(&self.schema)
            .fetch_all(&self.pool)
            .await?;

        let mut tables: BTreeMap<String, TableDef> = BTreeMap::new();
        for row in &column_rows {
            let table_name: String = row.try_get("table_name")?;
            let data_type: String = row.try_get("data_type")?;
            let udt_name: String = row.try_get("udt_name")?;

            let column_type = from_postgres(
                &data_type,
                &udt_name,
                row.try_get("char_length")?,
                row.try_get("numeric_precision")?,
                row.try_get("numeric_scale")?,
            );

            let column = ColumnDef {
                name: row.try_get("column_name")?,
                column_type,
                nullable: row.try_get("nullable")?,
                default: row.try_get("column_default")?,
            };

            tables
                .entry(table_name.clone())
                .or_insert_with(|| TableDef::new(table_name, Vec::new()))
                .columns
                .push(column);
        }

        let fk_rows = sqlx::query(FOREIGN_KEYS_QUERY)
            .bind(&self.schema)
            .fetch_all(&self.pool)
            .await?;

        for row in &fk_rows {
            let table_name: String = row.try_get("table_name")?;
            let referenced: String = row.try_get("referenced_table")?;
            if let Some(table) = tables.get_mut(&table_name) {
                table.references.push(referenced);
            }
        }

        if tables.is_empty() {
            tracing::warn!(schema = %self.schema, "No tables found in source schema");
        }

        Ok(tables.into_values().collect())
    }

    fn stream_rows<'a>(&'a self, table: &'a TableDef) -> BoxStream<'a, Result<Row>> {
        let sql = select_sql(&self.schema, table);
        let pool = self.pool.clone();
        let table = table.clone();
        let (tx, rx) = mpsc::channel::<Result<Row>>(ROW_BUFFER);

        // The cursor borrows its SQL text, so it lives in its own task and
        // hands rows over through the channel.
        tokio::spawn(async move {
            tracing::debug!(sql = %sql, "streaming rows");
            let mut cursor = sqlx::query(&sql).fetch(&pool);
            loop {
                let next = match cursor.try_next().await {
                    Ok(Some(pg_row)) => decode_row(&pg_row, &table),
                    Ok(None) => break,
                    Err(e) => Err(CopyError::from(e)),
                };
                let failed = next.is_err();
                if tx.send(next).await.is_err() || failed {
                    break;
                }
            }
        });

        stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) }).boxed()
    }
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// SELECT over every column, casting types without a native decoding to text.
pub fn select_sql(schema: &str, table: &TableDef) -> String {
    let columns: Vec<String> = table
        .columns
        .iter()
        .map(|column| {
            let name = quote_ident(&column.name);
            match &column.column_type {
                // money has no direct text form a DECIMAL accepts
                ColumnType::Numeric { .. } => format!("{}::numeric::text", name),
                ColumnType::Time => format!("{}::time", name),
                t if read_as_text(t) => format!("{}::text", name),
                _ => name,
            }
        })
        .collect();

    format!(
        "SELECT {} FROM {}.{}",
        columns.join(", "),
        quote_ident(schema),
        quote_ident(&table.name)
    )
}

fn decode_row(row: &PgRow, table: &TableDef) -> Result<Row> {
    table
        .columns
        .iter()
        .enumerate()
        .map(|(i, column)| decode_value(row, i, &column.column_type))
        .collect()
}

fn decode_value(row: &PgRow, i: usize, column_type: &ColumnType) -> Result<SqlValue> {
    let value: SqlValue = match column_type {
        ColumnType::SmallInteger => row.try_get::<Option<i16>, _>(i)?.into(),
        ColumnType::Integer => row.try_get::<Option<i32>, _>(i)?.into(),
        ColumnType::BigInteger => row.try_get::<Option<i64>, _>(i)?.into(),
        ColumnType::Float => row.try_get::<Option<f32>, _>(i)?.into(),
        ColumnType::Double => row.try_get::<Option<f64>, _>(i)?.into(),
        ColumnType::Boolean => row.try_get::<Option<bool>, _>(i)?.into(),
        ColumnType::Date => row.try_get::<Option<NaiveDate>, _>(i)?.into(),
        ColumnType::Time => row.try_get::<Option<NaiveTime>, _>(i)?.into(),
        ColumnType::DateTime { timezone: false } => row.try_get::<Option<NaiveDateTime>, _>(i)?.into(),
        ColumnType::DateTime { timezone: true } => row.try_get::<Option<DateTime<Utc>>, _>(i)?.into(),
        ColumnType::Binary => row.try_get::<Option<Vec<u8>>, _>(i)?.into(),
        _ => row.try_get::<Option<String>, _>(i)?.into(),
    };
    Ok(value)
}
