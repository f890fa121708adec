//! Result shapes of the in-memory backend

use std::fmt;
use std::sync::Arc;

use crate::value::Value;

/// One result row with its column names.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Record {
    pub(crate) const fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn get_by_name(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .and_then(|i| self.values.get(i))
    }
}

/// Forward-only cursor over a query result.
pub struct MemoryRows {
    columns: Arc<[String]>,
    rows: std::vec::IntoIter<Vec<Value>>,
}

impl fmt::Debug for MemoryRows {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryRows")
            .field("columns", &self.columns)
            .field("remaining", &self.rows.len())
            .finish()
    }
}

impl MemoryRows {
    pub(crate) fn new(columns: Arc<[String]>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows: rows.into_iter(),
        }
    }

    pub(crate) fn empty() -> Self {
        Self::new(Arc::from(Vec::new()), Vec::new())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Drain the cursor into plain value rows.
    pub fn into_value_rows(self) -> Vec<Vec<Value>> {
        self.rows.collect()
    }
}

impl Iterator for MemoryRows {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        self.rows
            .next()
            .map(|values| Record::new(Arc::clone(&self.columns), values))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for MemoryRows {}

/// Outcome of a modifying statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecOutcome {
    pub rows_affected: u64,
    /// Row id assigned by the last insert, if the statement inserted
    pub last_insert_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Arc<[String]> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_record_lookup_by_name() {
        let record = Record::new(columns(&["id", "name"]), vec![Value::Int(1), "a".into()]);
        assert_eq!(record.get(0), Some(&Value::Int(1)));
        assert_eq!(record.get_by_name("NAME"), Some(&Value::Text("a".into())));
        assert!(record.get_by_name("missing").is_none());
    }

    #[test]
    fn test_rows_iterate_in_order() {
        let rows = MemoryRows::new(
            columns(&["id"]),
            vec![vec![Value::Int(1)], vec![Value::Int(2)]],
        );
        assert_eq!(rows.len(), 2);
        let ids: Vec<_> = rows.map(|r| r.into_values()).collect();
        assert_eq!(ids, vec![vec![Value::Int(1)], vec![Value::Int(2)]]);
    }

    #[test]
    fn test_empty_rows() {
        let rows = MemoryRows::empty();
        assert!(rows.columns().is_empty());
        assert!(rows.into_value_rows().is_empty());
    }
}
