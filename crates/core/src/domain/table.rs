use comfy_table::presets::NOTHING;
use comfy_table::Table;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataTable {
    pub index_label: String,
    pub columns: Vec<String>,
    pub rows: Vec<(String, Vec<String>)>,
}

impl DataTable {
    pub fn new(index_label: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            index_label: index_label.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, label: impl Into<String>, mut values: Vec<String>) {
        values.resize(self.columns.len(), String::new());
        self.rows.push((label.into(), values));
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }

    pub fn tail(&self, n: usize) -> Self {
        let skip = self.rows.len().saturating_sub(n);
        Self {
            index_label: self.index_label.clone(),
            columns: self.columns.clone(),
            rows: self.rows[skip..].to_vec(),
        }
    }

    /// First `n` value columns; the row labels are always kept.
    pub fn leading_columns(&self, n: usize) -> Self {
        let keep = n.min(self.columns.len());
        Self {
            index_label: self.index_label.clone(),
            columns: self.columns[..keep].to_vec(),
            rows: self
                .rows
                .iter()
                .map(|(label, values)| (label.clone(), values[..keep].to_vec()))
                .collect(),
        }
    }

    pub fn render(&self) -> String {
        let mut table = Table::new();
        table.load_preset(NOTHING);

        let mut header = Vec::with_capacity(self.columns.len() + 1);
        header.push(self.index_label.clone());
        header.extend(self.columns.iter().cloned());
        table.set_header(header);

        for (label, values) in &self.rows {
            let mut row = Vec::with_capacity(values.len() + 1);
            row.push(label.clone());
            row.extend(values.iter().cloned());
            table.add_row(row);
        }

        table
            .to_string()
            .lines()
            .map(str::trim_end)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
