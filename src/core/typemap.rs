use crate::domain::model::ColumnType;

/// VARCHAR needs a length on MySQL; unbounded source strings get this one.
pub const DEFAULT_VARCHAR_LENGTH: u32 = 512;

/// Canonical text length of a UUID.
pub const UUID_TEXT_LENGTH: u32 = 36;

pub const INTERVAL_TEXT_LENGTH: u32 = 64;

/// Maps one `information_schema.columns` row to a [`ColumnType`].
pub fn from_postgres(
    data_type: &str,
    udt_name: &str,
    char_length: Option<i32>,
    precision: Option<i32>,
    scale: Option<i32>,
) -> ColumnType {
    let as_u32 = |v: Option<i32>| v.and_then(|n| u32::try_from(n).ok());

    match data_type {
        "smallint" => ColumnType::SmallInteger,
        "integer" => ColumnType::Integer,
        "bigint" => ColumnType::BigInteger,
        "real" => ColumnType::Float,
        "double precision" => ColumnType::Double,
        "numeric" | "decimal" => ColumnType::Numeric {
            precision: as_u32(precision),
            scale: as_u32(scale),
        },
        "money" => ColumnType::Numeric {
            precision: Some(19),
            scale: Some(2),
        },
        "boolean" => ColumnType::Boolean,
        "character varying" | "character" => ColumnType::String {
            length: as_u32(char_length),
        },
        "text" | "name" | "citext" => ColumnType::Text,
        "date" => ColumnType::Date,
        "time without time zone" | "time with time zone" => ColumnType::Time,
        "timestamp without time zone" => ColumnType::DateTime { timezone: false },
        "timestamp with time zone" => ColumnType::DateTime { timezone: true },
        "bytea" => ColumnType::Binary,
        "json" | "jsonb" => ColumnType::Json,
        "uuid" => ColumnType::Uuid,
        "interval" => ColumnType::Interval,
        // ARRAY, USER-DEFINED and friends: keep the underlying type name
        _ => ColumnType::Other(udt_name.to_string()),
    }
}

/// Rewrites a source type into one every destination can create.
pub fn genericize(column_type: &ColumnType, default_varchar_length: u32) -> ColumnType {
    match column_type {
        ColumnType::Uuid => ColumnType::String {
            length: Some(UUID_TEXT_LENGTH),
        },
        ColumnType::String { length: None } => ColumnType::String {
            length: Some(default_varchar_length),
        },
        ColumnType::Interval => ColumnType::String {
            length: Some(INTERVAL_TEXT_LENGTH),
        },
        ColumnType::Other(name) => {
            tracing::warn!(source_type = %name, "No generic type, falling back to TEXT");
            ColumnType::Text
        }
        other => other.clone(),
    }
}

/// True when rows of this type are read from Postgres through a `::text` cast.
pub fn read_as_text(column_type: &ColumnType) -> bool {
    matches!(
        column_type,
        ColumnType::Numeric { .. }
            | ColumnType::Json
            | ColumnType::Uuid
            | ColumnType::Interval
            | ColumnType::Other(_)
            | ColumnType::String { .. }
            | ColumnType::Text
    )
}
