use crate::utils::error::{EtlError, Result};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// 讀入 CSV 時視為空值的欄位內容
const NA_MARKERS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "NULL", "null", "None", "#N/A", "<NA>",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn parse(raw: &str) -> Self {
        if NA_MARKERS.contains(&raw) {
            return Cell::Null;
        }
        match raw {
            "True" | "TRUE" | "true" => return Cell::Number(1.0),
            "False" | "FALSE" | "false" => return Cell::Number(0.0),
            _ => {}
        }
        match raw.parse::<f64>() {
            Ok(value) if value.is_nan() => Cell::Null,
            Ok(value) => Cell::Number(value),
            Err(_) => Cell::Text(raw.to_string()),
        }
    }

    /// 文字欄中的值：保留原始字串，只把空值標記轉成 `Null`
    pub fn parse_text(raw: &str) -> Self {
        if NA_MARKERS.contains(&raw) {
            Cell::Null
        } else {
            Cell::Text(raw.to_string())
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(text) => Some(text),
            _ => None,
        }
    }

    /// 數值轉為整數型 id，帶小數者視為無效
    pub fn as_id(&self) -> Option<i64> {
        match self {
            Cell::Number(value) if value.fract() == 0.0 => Some(*value as i64),
            Cell::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Number(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                write!(f, "{}", *value as i64)
            }
            Cell::Number(value) => write!(f, "{}", value),
            Cell::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Text,
}

/// 以欄名排序的記憶體表格，每列長度恆等於欄數
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn from_csv_bytes(data: &[u8]) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(data);

        let columns: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();
        let records = reader
            .records()
            .collect::<std::result::Result<Vec<csv::StringRecord>, csv::Error>>()?;

        // 欄位型別以整欄判定：只要有一個非空值不是數字，整欄保留原始文字
        let numeric: Vec<bool> = (0..columns.len())
            .map(|i| {
                records
                    .iter()
                    .filter_map(|record| record.get(i))
                    .all(|raw| !matches!(Cell::parse(raw), Cell::Text(_)))
            })
            .collect();

        let mut table = Table::new(columns);
        for record in &records {
            let row = record
                .iter()
                .zip(&numeric)
                .map(|(raw, &is_numeric)| {
                    if is_numeric {
                        Cell::parse(raw)
                    } else {
                        Cell::parse_text(raw)
                    }
                })
                .collect();
            table.rows.push(row);
        }

        Ok(table)
    }

    pub fn to_csv_string(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|cell| cell.to_string()))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| EtlError::IoError(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| EtlError::processing(e.to_string()))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn require_column(&self, table: &str, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| EtlError::missing_column(table, name))
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(EtlError::processing(format!(
                "Row has {} cells but table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn column(&self, index: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.rows.iter().map(move |row| &row[index])
    }

    pub fn column_kind(&self, index: usize) -> ColumnKind {
        if self.column(index).any(|cell| matches!(cell, Cell::Text(_))) {
            ColumnKind::Text
        } else {
            ColumnKind::Numeric
        }
    }

    pub fn text_columns(&self) -> Vec<String> {
        (0..self.width())
            .filter(|&i| self.column_kind(i) == ColumnKind::Text)
            .map(|i| self.columns[i].clone())
            .collect()
    }

    /// 空表格的空值比例視為 0
    pub fn null_fraction(&self, index: usize) -> f64 {
        if self.rows.is_empty() {
            return 0.0;
        }
        let nulls = self.column(index).filter(|cell| cell.is_null()).count();
        nulls as f64 / self.rows.len() as f64
    }

    /// 非空值出現次數，以顯示字串為鍵
    pub fn value_counts(&self, name: &str) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        if let Some(index) = self.column_index(name) {
            for cell in self.column(index).filter(|cell| !cell.is_null()) {
                *counts.entry(cell.to_string()).or_insert(0) += 1;
            }
        }
        counts
    }

    pub fn add_column(&mut self, name: impl Into<String>, values: Vec<Cell>) -> Result<()> {
        let name = name.into();
        if values.len() != self.rows.len() {
            return Err(EtlError::processing(format!(
                "Column '{}' has {} values but table has {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }
        if self.has_column(&name) {
            return Err(EtlError::processing(format!("Duplicate column '{}'", name)));
        }
        self.columns.push(name);
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        Ok(())
    }

    pub fn map_column<F>(&mut self, index: usize, mut f: F)
    where
        F: FnMut(&Cell) -> Cell,
    {
        for row in &mut self.rows {
            row[index] = f(&row[index]);
        }
    }

    /// 刪除存在的欄位，回傳實際刪除數
    pub fn drop_columns<S: AsRef<str>>(&mut self, names: &[S]) -> usize {
        let targets: HashSet<&str> = names.iter().map(|n| n.as_ref()).collect();
        let keep: Vec<bool> = self
            .columns
            .iter()
            .map(|c| !targets.contains(c.as_str()))
            .collect();
        let dropped = keep.iter().filter(|k| !**k).count();
        if dropped == 0 {
            return 0;
        }

        self.columns = retain_by_mask(std::mem::take(&mut self.columns), &keep);
        for row in &mut self.rows {
            *row = retain_by_mask(std::mem::take(row), &keep);
        }
        dropped
    }

    pub fn take_column(&mut self, name: &str) -> Option<Vec<Cell>> {
        let index = self.column_index(name)?;
        self.columns.remove(index);
        Some(self.rows.iter_mut().map(|row| row.remove(index)).collect())
    }

    pub fn retain_rows<F>(&mut self, mut predicate: F)
    where
        F: FnMut(&[Cell]) -> bool,
    {
        self.rows.retain(|row| predicate(row));
    }

    pub fn drop_null_rows(&mut self) -> usize {
        let before = self.rows.len();
        self.rows.retain(|row| row.iter().all(|cell| !cell.is_null()));
        before - self.rows.len()
    }

    /// 欄位聯集串接，缺少的欄位補空值
    pub fn append_union(&mut self, other: Table) {
        for column in &other.columns {
            if !self.has_column(column) {
                self.columns.push(column.clone());
                for row in &mut self.rows {
                    row.push(Cell::Null);
                }
            }
        }

        let mapping: Vec<Option<usize>> = self
            .columns
            .iter()
            .map(|c| other.column_index(c))
            .collect();
        for mut row in other.rows {
            let aligned = mapping
                .iter()
                .map(|source| match source {
                    Some(i) => std::mem::replace(&mut row[*i], Cell::Null),
                    None => Cell::Null,
                })
                .collect();
            self.rows.push(aligned);
        }
    }

    /// 只保留雙方共有欄位後串接，欄序依現有表格
    pub fn append_common(&mut self, other: Table) {
        let shared: Vec<String> = self
            .columns
            .iter()
            .filter(|c| other.has_column(c))
            .cloned()
            .collect();
        let missing: Vec<String> = self
            .columns
            .iter()
            .filter(|c| !other.has_column(c))
            .cloned()
            .collect();
        self.drop_columns(&missing);

        let mapping: Vec<usize> = shared
            .iter()
            .filter_map(|c| other.column_index(c))
            .collect();
        for mut row in other.rows {
            let aligned = mapping
                .iter()
                .map(|&i| std::mem::replace(&mut row[i], Cell::Null))
                .collect();
            self.rows.push(aligned);
        }
    }
}

fn retain_by_mask<T>(items: Vec<T>, keep: &[bool]) -> Vec<T> {
    items
        .into_iter()
        .zip(keep)
        .filter_map(|(item, &k)| k.then_some(item))
        .collect()
}
