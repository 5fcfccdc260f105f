//! Warehouse type to LookML field type mapping

use serde::{Deserialize, Serialize};
use crate::manifest::AdapterType;

/// LookML field types a column can be generated as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookerType {
    Number,
    String,
    YesNo,
    Date,
    DateTime,
    Timestamp,
}

impl LookerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::String => "string",
            Self::YesNo => "yesno",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Timestamp => "timestamp",
        }
    }

    /// Generated as a plain dimension
    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Number | Self::String | Self::YesNo)
    }

    /// Generated as a dimension group with timeframes
    pub fn is_temporal(&self) -> bool {
        matches!(self, Self::Date | Self::DateTime | Self::Timestamp)
    }
}

impl std::fmt::Display for LookerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Map a physical column type to its LookML type
///
/// Parameters are stripped (`NUMERIC(10,2)` -> `NUMERIC`) and the lookup is
/// case-insensitive. Types with no sensible LookML equivalent (intervals,
/// time zone aware timestamps, geometric types, ...) map to `None`.
pub fn looker_type(adapter: AdapterType, column_type: &str) -> Option<LookerType> {
    let normalized = normalize(column_type);

    match adapter {
        AdapterType::BigQuery => bigquery(&normalized),
        AdapterType::Snowflake => snowflake(&normalized),
        AdapterType::Redshift => redshift(&normalized),
        AdapterType::Postgres => postgres(&normalized),
        AdapterType::Spark => spark(&normalized),
    }
}

fn normalize(column_type: &str) -> String {
    let base = match column_type.find('(') {
        Some(pos) => &column_type[..pos],
        None => column_type,
    };
    base.trim().to_uppercase()
}

fn bigquery(t: &str) -> Option<LookerType> {
    use LookerType::*;
    match t {
        "INT64" | "INTEGER" | "FLOAT" | "FLOAT64" | "NUMERIC" => Some(Number),
        "BOOLEAN" | "BOOL" => Some(YesNo),
        "STRING" | "TIME" | "ARRAY" | "GEOGRAPHY" => Some(String),
        "TIMESTAMP" => Some(Timestamp),
        "DATETIME" => Some(DateTime),
        "DATE" => Some(Date),
        _ => None,
    }
}

fn snowflake(t: &str) -> Option<LookerType> {
    use LookerType::*;
    match t {
        "NUMBER" | "DECIMAL" | "NUMERIC" | "INT" | "INTEGER" | "BIGINT" | "SMALLINT" | "FLOAT"
        | "FLOAT4" | "FLOAT8" | "DOUBLE" | "DOUBLE PRECISION" | "REAL" => Some(Number),
        "VARCHAR" | "CHAR" | "CHARACTER" | "STRING" | "TEXT" | "BINARY" | "VARBINARY" | "TIME"
        | "VARIANT" | "OBJECT" | "ARRAY" | "GEOGRAPHY" => Some(String),
        "BOOLEAN" => Some(YesNo),
        "DATE" => Some(Date),
        "DATETIME" => Some(DateTime),
        // TIMESTAMP_LTZ and TIMESTAMP_TZ cannot back a dimension group
        "TIMESTAMP" | "TIMESTAMP_NTZ" => Some(Timestamp),
        _ => None,
    }
}

fn redshift(t: &str) -> Option<LookerType> {
    use LookerType::*;
    match t {
        "SMALLINT" | "INT2" | "INTEGER" | "INT" | "INT4" | "BIGINT" | "INT8" | "DECIMAL"
        | "NUMERIC" | "REAL" | "FLOAT4" | "DOUBLE PRECISION" | "FLOAT8" | "FLOAT" => Some(Number),
        "BOOLEAN" | "BOOL" => Some(YesNo),
        "CHAR" | "CHARACTER" | "NCHAR" | "BPCHAR" | "VARCHAR" | "CHARACTER VARYING"
        | "NVARCHAR" | "TEXT" | "GEOMETRY" | "TIME" | "TIME WITHOUT TIME ZONE" => Some(String),
        "DATE" => Some(Date),
        "TIMESTAMP" | "TIMESTAMP WITHOUT TIME ZONE" => Some(Timestamp),
        _ => None,
    }
}

fn postgres(t: &str) -> Option<LookerType> {
    use LookerType::*;
    match t {
        "MONEY" | "SMALLINT" | "INT2" | "SMALLSERIAL" | "SERIAL2" | "INTEGER" | "INT" | "INT4"
        | "SERIAL" | "SERIAL4" | "BIGINT" | "INT8" | "BIGSERIAL" | "SERIAL8" | "DECIMAL"
        | "NUMERIC" | "REAL" | "FLOAT4" | "DOUBLE PRECISION" | "FLOAT8" | "FLOAT" => Some(Number),
        "BOOLEAN" | "BOOL" => Some(YesNo),
        "XML" | "UUID" | "PG_LSN" | "MACADDR" | "JSON" | "JSONB" | "CIDR" | "INET" | "CHAR"
        | "CHARACTER" | "NCHAR" | "BPCHAR" | "VARCHAR" | "CHARACTER VARYING" | "NVARCHAR"
        | "TEXT" | "GEOMETRY" | "TIME" | "TIME WITHOUT TIME ZONE" => Some(String),
        "DATE" => Some(Date),
        "TIMESTAMP" | "TIMESTAMP WITHOUT TIME ZONE" => Some(Timestamp),
        _ => None,
    }
}

fn spark(t: &str) -> Option<LookerType> {
    use LookerType::*;
    match t {
        "BYTE" | "SHORT" | "INTEGER" | "INT" | "LONG" | "BIGINT" | "FLOAT" | "DOUBLE"
        | "DECIMAL" => Some(Number),
        "STRING" | "VARCHAR" | "CHAR" => Some(String),
        "BOOLEAN" => Some(YesNo),
        "TIMESTAMP" => Some(Timestamp),
        "DATE" => Some(Date),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_common_types() {
        assert_eq!(looker_type(AdapterType::BigQuery, "INT64"), Some(LookerType::Number));
        assert_eq!(looker_type(AdapterType::BigQuery, "DATETIME"), Some(LookerType::DateTime));
        assert_eq!(looker_type(AdapterType::Snowflake, "TIMESTAMP_NTZ"), Some(LookerType::Timestamp));
        assert_eq!(looker_type(AdapterType::Redshift, "character varying"), Some(LookerType::String));
        assert_eq!(looker_type(AdapterType::Postgres, "boolean"), Some(LookerType::YesNo));
        assert_eq!(looker_type(AdapterType::Spark, "date"), Some(LookerType::Date));
    }

    #[test]
    fn parameters_are_stripped() {
        assert_eq!(looker_type(AdapterType::Spark, "decimal(10,2)"), Some(LookerType::Number));
        assert_eq!(looker_type(AdapterType::Postgres, "character varying(256)"), Some(LookerType::String));
        assert_eq!(looker_type(AdapterType::Snowflake, "NUMBER(38,0)"), Some(LookerType::Number));
    }

    #[test]
    fn unsupported_types_map_to_none() {
        assert_eq!(looker_type(AdapterType::Snowflake, "TIMESTAMP_TZ"), None);
        assert_eq!(looker_type(AdapterType::Postgres, "interval"), None);
        assert_eq!(looker_type(AdapterType::Redshift, "HLLSKETCH"), None);
    }

    #[test]
    fn scalar_and_temporal_split() {
        assert!(LookerType::Number.is_scalar());
        assert!(!LookerType::Number.is_temporal());
        assert!(LookerType::Timestamp.is_temporal());
        assert!(!LookerType::Date.is_scalar());
    }
}
