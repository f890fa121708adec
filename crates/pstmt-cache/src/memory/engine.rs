//! Table storage and statement execution

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::error::MemoryError;
use super::parser::{Expr, Filter, Parsed, Projection, Statement};
use super::rows::{ExecOutcome, MemoryRows};
use crate::value::Value;

#[derive(Debug, Default)]
struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    fn column_index(&self, column: &str) -> Result<usize, MemoryError> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| MemoryError::UnknownColumn(column.to_owned()))
    }

    fn matching(&self, filter: Option<&Filter>, args: &[Value]) -> Result<Vec<usize>, MemoryError> {
        let Some(filter) = filter else {
            return Ok((0..self.rows.len()).collect());
        };
        let index = self.column_index(&filter.column)?;
        let wanted = bind(&filter.value, args);
        Ok(self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row[index] == *wanted)
            .map(|(i, _)| i)
            .collect())
    }
}

#[derive(Debug)]
pub(crate) enum Executed {
    Rows(MemoryRows),
    Modified(ExecOutcome),
}

/// Shared table store. Reads run concurrently; writes serialize on the lock.
#[derive(Debug, Default)]
pub(crate) struct Store {
    tables: RwLock<HashMap<String, Table>>,
    next_row_id: parking_lot::Mutex<i64>,
}

fn bind<'a>(expr: &'a Expr, args: &'a [Value]) -> &'a Value {
    match expr {
        Expr::Param(i) => &args[*i],
        Expr::Literal(v) => v,
    }
}

/// Total order used by ORDER BY: NULL, bools, numbers, text, bytes.
fn compare(a: &Value, b: &Value) -> Ordering {
    const fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::Text(_) => 3,
            Value::Bytes(_) => 4,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        #[allow(clippy::cast_precision_loss)]
        (Value::Int(x), Value::Float(y)) => (*x as f64).total_cmp(y),
        #[allow(clippy::cast_precision_loss)]
        (Value::Float(x), Value::Int(y)) => x.total_cmp(&(*y as f64)),
        (Value::Float(x), Value::Float(y)) => x.total_cmp(y),
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
        (Value::Bytes(x), Value::Bytes(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

impl Store {
    pub(crate) fn execute(&self, parsed: &Parsed, args: &[Value]) -> Result<Executed, MemoryError> {
        if args.len() != parsed.param_count {
            return Err(MemoryError::ArgumentCount {
                expected: parsed.param_count,
                actual: args.len(),
            });
        }

        match &parsed.statement {
            Statement::CreateTable { table, columns } => {
                let mut tables = self.tables.write();
                if tables.contains_key(table) {
                    return Err(MemoryError::TableExists(table.clone()));
                }
                tables.insert(
                    table.clone(),
                    Table {
                        columns: columns.clone(),
                        rows: Vec::new(),
                    },
                );
                Ok(Executed::Modified(ExecOutcome::default()))
            }
            Statement::Insert {
                table,
                columns,
                values,
            } => {
                let mut tables = self.tables.write();
                let target = tables
                    .get_mut(table)
                    .ok_or_else(|| MemoryError::UnknownTable(table.clone()))?;

                let mut row = vec![Value::Null; target.columns.len()];
                for (column, expr) in columns.iter().zip(values) {
                    let index = target.column_index(column)?;
                    row[index] = bind(expr, args).clone();
                }
                target.rows.push(row);
                drop(tables);

                let mut next = self.next_row_id.lock();
                *next += 1;
                Ok(Executed::Modified(ExecOutcome {
                    rows_affected: 1,
                    last_insert_id: Some(*next),
                }))
            }
            Statement::Delete { table, filter } => {
                let mut tables = self.tables.write();
                let target = tables
                    .get_mut(table)
                    .ok_or_else(|| MemoryError::UnknownTable(table.clone()))?;

                let doomed = target.matching(filter.as_ref(), args)?;
                let mut index = 0;
                target.rows.retain(|_| {
                    let keep = !doomed.contains(&index);
                    index += 1;
                    keep
                });
                Ok(Executed::Modified(ExecOutcome {
                    rows_affected: doomed.len() as u64,
                    last_insert_id: None,
                }))
            }
            Statement::Select {
                table,
                projection,
                filter,
                order_by,
            } => {
                let tables = self.tables.read();
                let source = tables
                    .get(table)
                    .ok_or_else(|| MemoryError::UnknownTable(table.clone()))?;

                let indices: Vec<usize> = match projection {
                    Projection::All => (0..source.columns.len()).collect(),
                    Projection::Columns(names) => names
                        .iter()
                        .map(|n| source.column_index(n))
                        .collect::<Result<_, _>>()?,
                };
                let columns: Arc<[String]> =
                    indices.iter().map(|&i| source.columns[i].clone()).collect();

                let mut selected: Vec<&Vec<Value>> = source
                    .matching(filter.as_ref(), args)?
                    .into_iter()
                    .map(|i| &source.rows[i])
                    .collect();

                if let Some(order) = order_by {
                    let key = source.column_index(&order.column)?;
                    selected.sort_by(|a, b| {
                        let ord = compare(&a[key], &b[key]);
                        if order.descending { ord.reverse() } else { ord }
                    });
                }

                let rows = selected
                    .into_iter()
                    .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                    .collect();
                Ok(Executed::Rows(MemoryRows::new(columns, rows)))
            }
            Statement::SelectValues(exprs) => {
                let columns: Arc<[String]> =
                    (1..=exprs.len()).map(|i| format!("column{i}")).collect();
                let row = exprs.iter().map(|e| bind(e, args).clone()).collect();
                Ok(Executed::Rows(MemoryRows::new(columns, vec![row])))
            }
        }
    }
}
