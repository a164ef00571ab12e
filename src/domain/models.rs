use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// A JSON-like document as stored in a collection.
pub type Record = serde_json::Map<String, Value>;

/// A (database, collection) pair addressed by a store operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub database: Option<String>,
    pub collection: Option<String>,
}

impl Target {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: Some(database.into()),
            collection: Some(collection.into()),
        }
    }

    /// Per-call values take precedence over the defaults held in `self`.
    pub fn resolve(&self, database: Option<&str>, collection: Option<&str>) -> Target {
        Target {
            database: database.map(str::to_string).or_else(|| self.database.clone()),
            collection: collection.map(str::to_string).or_else(|| self.collection.clone()),
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}",
            self.database.as_deref().unwrap_or("<unset>"),
            self.collection.as_deref().unwrap_or("<unset>")
        )
    }
}

/// One or many records, normalized to a sequence before insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct Records(pub Vec<Record>);

impl From<Record> for Records {
    fn from(record: Record) -> Self {
        Records(vec![record])
    }
}

impl From<Vec<Record>> for Records {
    fn from(records: Vec<Record>) -> Self {
        Records(records)
    }
}

/// Tabular view of query results: the union of record keys as columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn from_records(records: &[Record]) -> Self {
        let mut seen = HashSet::new();
        let mut columns = Vec::new();
        for record in records {
            for key in record.keys() {
                if seen.insert(key.as_str()) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|column| record.get(column).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| &row[index]).collect())
    }
}

/// Result of a query, shaped as requested by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Records(Vec<Record>),
    Table(Table),
}

impl QueryResult {
    pub fn len(&self) -> usize {
        match self {
            QueryResult::Records(records) => records.len(),
            QueryResult::Table(table) => table.rows.len(),
        }
    }

    pub fn into_records(self) -> Option<Vec<Record>> {
        match self {
            QueryResult::Records(records) => Some(records),
            QueryResult::Table(_) => None,
        }
    }
}

/// Outcome of a store operation that absorbs invalid targets.
///
/// An invalid target is logged and returned as a value instead of an error,
/// so callers can still tell it apart from an empty result.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Done(T),
    InvalidTarget(Target),
}

impl<T> Outcome<T> {
    pub fn done(self) -> Option<T> {
        match self {
            Outcome::Done(value) => Some(value),
            Outcome::InvalidTarget(_) => None,
        }
    }

    pub fn is_invalid_target(&self) -> bool {
        matches!(self, Outcome::InvalidTarget(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn per_call_target_overrides_defaults() {
        let defaults = Target::new("aquaria", "locations");

        let resolved = defaults.resolve(None, Some("wiki"));
        assert_eq!(resolved, Target::new("aquaria", "wiki"));

        let resolved = defaults.resolve(Some("staging"), None);
        assert_eq!(resolved, Target::new("staging", "locations"));

        assert_eq!(defaults.resolve(None, None), defaults);
    }

    #[test]
    fn unset_target_displays_placeholder() {
        let target = Target::default().resolve(Some("aquaria"), None);
        assert_eq!(target.to_string(), "aquaria.<unset>");
    }

    #[test]
    fn single_record_normalizes_to_sequence() {
        let one = record(json!({"name": "Oceanário de Lisboa"}));
        let Records(from_one) = Records::from(one.clone());
        let Records(from_vec) = Records::from(vec![one]);
        assert_eq!(from_one, from_vec);
    }

    #[test]
    fn table_fills_missing_columns_with_null() {
        let records = vec![
            record(json!({"name": "Georgia Aquarium", "city": "Atlanta"})),
            record(json!({"name": "Two Oceans", "country": "South Africa"})),
        ];

        let table = Table::from_records(&records);
        // Record maps iterate keys in sorted order.
        assert_eq!(table.columns, vec!["city", "name", "country"]);
        assert_eq!(table.rows[1][0], Value::Null);
        assert_eq!(table.rows[0][2], Value::Null);
        assert_eq!(
            table.column("name").unwrap(),
            vec![&json!("Georgia Aquarium"), &json!("Two Oceans")]
        );
        assert!(table.column("missing").is_none());
    }

    #[test]
    fn outcome_accessors() {
        let done: Outcome<bool> = Outcome::Done(true);
        assert_eq!(done.clone().done(), Some(true));
        assert!(!done.is_invalid_target());

        let invalid: Outcome<bool> = Outcome::InvalidTarget(Target::new("a", "b"));
        assert!(invalid.is_invalid_target());
        assert_eq!(invalid.done(), None);
    }
}
