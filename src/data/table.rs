use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A table from `tables.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub table_id: String,
    pub table_name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Header, separator, and the first `k` rows as a Markdown table.
    ///
    /// Short rows are padded with empty cells; null cells render empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use ontopath::data::Table;
    /// use serde_json::json;
    ///
    /// let table = Table {
    ///     table_id: "t1".to_string(),
    ///     table_name: "cities".to_string(),
    ///     columns: vec!["city".to_string(), "pop".to_string()],
    ///     rows: vec![vec![json!("Oslo"), json!(709000)]],
    /// };
    /// assert_eq!(
    ///     table.to_markdown(5),
    ///     "| city | pop |\n| --- | --- |\n| Oslo | 709000 |"
    /// );
    /// ```
    pub fn to_markdown(&self, k: usize) -> String {
        let mut lines = Vec::with_capacity(k + 2);
        lines.push(format!("| {} |", self.columns.join(" | ")));
        lines.push(format!(
            "| {} |",
            vec!["---"; self.columns.len()].join(" | ")
        ));
        for row in self.rows.iter().take(k) {
            let cells: Vec<String> = (0..self.columns.len())
                .map(|i| row.get(i).map(cell_text).unwrap_or_default())
                .collect();
            lines.push(format!("| {} |", cells.join(" | ")));
        }
        lines.join("\n")
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.replace('\n', " ").replace('|', "\\|"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(rows: Vec<Vec<Value>>) -> Table {
        Table {
            table_id: "t".to_string(),
            table_name: "t".to_string(),
            columns: vec!["a".to_string(), "b".to_string()],
            rows,
        }
    }

    #[test]
    fn limits_rows_to_k() {
        let t = table(vec![
            vec![json!(1), json!("x")],
            vec![json!(2), json!("y")],
            vec![json!(3), json!("z")],
        ]);
        let md = t.to_markdown(2);
        assert_eq!(md.lines().count(), 4);
        assert!(md.ends_with("| 2 | y |"));
    }

    #[test]
    fn header_only_when_k_is_zero() {
        let t = table(vec![vec![json!(1), json!(2)]]);
        assert_eq!(t.to_markdown(0), "| a | b |\n| --- | --- |");
    }

    #[test]
    fn pads_short_rows_and_blanks_nulls() {
        let t = table(vec![vec![Value::Null]]);
        assert_eq!(t.to_markdown(1).lines().last(), Some("|  |  |"));
    }

    #[test]
    fn escapes_pipes_in_cells() {
        let t = table(vec![vec![json!("a|b"), json!(true)]]);
        assert!(t.to_markdown(1).ends_with("| a\\|b | true |"));
    }
}
