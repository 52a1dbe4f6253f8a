//! Query results with column-name association.

use crate::value::{Row, Value};

/// Positional rows returned by a query, plus the column names they map to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// Column names in projection order.
    pub columns: Vec<String>,
    /// Rows, each holding one value per column.
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    /// Creates a result set.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the query produced no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the first column of the first row, if any.
    pub fn scalar(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.first())
    }

    /// Reconstructs name-keyed rows from the positional results.
    pub fn into_rows(self) -> Vec<Row> {
        let columns = self.columns;
        self.rows
            .into_iter()
            .map(|values| columns.iter().cloned().zip(values).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;

    #[test]
    fn into_rows_pairs_columns() {
        let set = ResultSet::new(
            vec!["id".into(), "name".into()],
            vec![
                vec![Value::Integer(1), Value::from("a")],
                vec![Value::Integer(2), Value::Null],
            ],
        );
        assert_eq!(set.len(), 2);

        let rows = set.into_rows();
        assert_eq!(rows[0], row! { "id" => 1, "name" => "a" });
        assert_eq!(rows[1], row! { "id" => 2, "name" => () });
    }

    #[test]
    fn scalar_of_empty_set() {
        let set = ResultSet::new(vec!["n".into()], vec![]);
        assert!(set.is_empty());
        assert_eq!(set.scalar(), None);
    }
}
