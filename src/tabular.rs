//! Tabular data parsed from downloaded files.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;
use std::str::FromStr;

use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use chrono::{NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};

use crate::error::{MoveitError, Result};

/// Number of leading rows used to infer the kind of each CSV column.
pub const CSV_INFERENCE_SAMPLE_ROWS: usize = 100_000;

/// MIME type of XLSX workbooks.
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// How a downloaded file is parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadFormat {
    /// Comma-separated values with a header row.
    Csv,
    /// Tab-separated values with a header row.
    Tsv,
    /// XLSX workbook. Reads the named sheet, or the first one; see
    /// [`MoveitClient::download_workbook`](crate::MoveitClient::download_workbook) for every sheet.
    Excel { sheet: Option<String> },
}

impl DownloadFormat {
    /// Content type sent as a hint with the download request.
    pub fn content_type(&self) -> &'static str {
        match self {
            DownloadFormat::Csv => "text/csv",
            DownloadFormat::Tsv => "text/tab-separated-values",
            DownloadFormat::Excel { .. } => XLSX_MIME,
        }
    }
}

impl FromStr for DownloadFormat {
    type Err = MoveitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(DownloadFormat::Csv),
            "tsv" | "txt" => Ok(DownloadFormat::Tsv),
            "excel" | "xlsx" => Ok(DownloadFormat::Excel { sheet: None }),
            _ => Err(MoveitError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// A single parsed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    Text(String),
}

impl Cell {
    pub fn kind(&self) -> ColumnKind {
        match self {
            Cell::Empty => ColumnKind::Empty,
            Cell::Int(_) => ColumnKind::Int,
            Cell::Float(_) => ColumnKind::Float,
            Cell::Bool(_) => ColumnKind::Bool,
            Cell::DateTime(_) => ColumnKind::DateTime,
            Cell::Text(_) => ColumnKind::Text,
        }
    }

    /// Convert a cell into `kind`, as produced by widening the kinds of its column.
    fn coerce(self, kind: ColumnKind) -> Cell {
        match (self, kind) {
            (Cell::Empty, _) => Cell::Empty,
            (Cell::Int(i), ColumnKind::Float) => Cell::Float(i as f64),
            (Cell::Text(s), _) => Cell::Text(s),
            (cell, ColumnKind::Text) => Cell::Text(cell.to_string()),
            (cell, _) => cell,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Cell::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.f")),
            Cell::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Inferred type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// No non-empty value was seen.
    Empty,
    Int,
    Float,
    Bool,
    DateTime,
    Text,
}

impl ColumnKind {
    /// Narrowest kind that holds values of both `self` and `other`.
    fn widen(self, other: ColumnKind) -> ColumnKind {
        use ColumnKind::*;
        match (self, other) {
            (Empty, k) | (k, Empty) => k,
            (a, b) if a == b => a,
            (Int, Float) | (Float, Int) => Float,
            _ => Text,
        }
    }

    /// Kind of a raw text value.
    fn classify(raw: &str) -> ColumnKind {
        let value = raw.trim();
        if value.is_empty() {
            ColumnKind::Empty
        } else if value.parse::<i64>().is_ok() {
            ColumnKind::Int
        } else if value.parse::<f64>().is_ok() {
            ColumnKind::Float
        } else if parse_bool(value).is_some() {
            ColumnKind::Bool
        } else {
            ColumnKind::Text
        }
    }

    /// Convert a raw value into a cell of this kind, keeping the text when it does not fit.
    fn convert(self, raw: &str) -> Cell {
        let value = raw.trim();
        if value.is_empty() {
            return Cell::Empty;
        }

        let parsed = match self {
            ColumnKind::Int => value.parse().ok().map(Cell::Int),
            ColumnKind::Float => value.parse().ok().map(Cell::Float),
            ColumnKind::Bool => parse_bool(value).map(Cell::Bool),
            ColumnKind::DateTime => parse_datetime(value).map(Cell::DateTime),
            ColumnKind::Empty | ColumnKind::Text => None,
        };

        parsed.unwrap_or_else(|| Cell::Text(raw.to_string()))
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

/// Rows and columns parsed from a downloaded file. Every row has one cell per column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Index of the first column named `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Cell at `row` in the column named `column`.
    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let index = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(index))
    }

    /// Serialize the table as CSV, header row first.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut out = WriterBuilder::new().from_writer(writer);
        out.write_record(self.columns.iter().map(|c| c.name.as_str()))?;
        for row in &self.rows {
            out.write_record(row.iter().map(|cell| cell.to_string()))?;
        }
        out.flush()?;
        Ok(())
    }
}

fn column_name(header: Option<&str>, index: usize) -> String {
    match header.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("column_{}", index),
    }
}

/// Parse delimited text with a header row.
///
/// Rows may be ragged; short rows are padded with [`Cell::Empty`]. Column kinds are
/// inferred from the first [`CSV_INFERENCE_SAMPLE_ROWS`] rows.
pub fn parse_delimited<R: Read>(reader: R, delimiter: u8) -> Result<Table> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let records = reader.records().collect::<std::result::Result<Vec<StringRecord>, _>>()?;

    let width = records
        .iter()
        .map(StringRecord::len)
        .max()
        .unwrap_or(0)
        .max(headers.len());

    let mut kinds = vec![ColumnKind::Empty; width];
    for record in records.iter().take(CSV_INFERENCE_SAMPLE_ROWS) {
        for (kind, raw) in kinds.iter_mut().zip(record.iter()) {
            *kind = kind.widen(ColumnKind::classify(raw));
        }
    }

    let columns = kinds
        .iter()
        .enumerate()
        .map(|(i, kind)| Column {
            name: column_name(headers.get(i), i),
            kind: *kind,
        })
        .collect();

    let rows = records
        .iter()
        .map(|record| {
            kinds
                .iter()
                .enumerate()
                .map(|(i, kind)| record.get(i).map_or(Cell::Empty, |raw| kind.convert(raw)))
                .collect()
        })
        .collect();

    Ok(Table { columns, rows })
}

/// Parse an ISO-8601 date or date-time.
fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::Int(i) => Cell::Int(*i),
        // Workbooks store every number as a float.
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Cell::Int(*f as i64),
        Data::Float(f) => Cell::Float(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::String(s) if s.is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::DateTime(dt) if dt.is_datetime() => dt
            .as_datetime()
            .map(Cell::DateTime)
            .unwrap_or_else(|| Cell::Float(dt.as_f64())),
        // Durations keep their value in days.
        Data::DateTime(dt) => Cell::Float(dt.as_f64()),
        Data::DateTimeIso(s) => parse_datetime(s)
            .map(Cell::DateTime)
            .unwrap_or_else(|| Cell::Text(s.clone())),
        other => Cell::Text(other.to_string()),
    }
}

/// Build a table from a sheet range, using its first row as the header.
///
/// Column kinds are inferred over every row, then each cell is coerced to its column's kind.
fn table_from_range(range: &Range<Data>) -> Table {
    let mut rows = range.rows();

    let Some(header) = rows.next() else {
        return Table::default();
    };

    let mut columns: Vec<Column> = header
        .iter()
        .enumerate()
        .map(|(i, data)| Column {
            name: column_name(Some(data.to_string().as_str()), i),
            kind: ColumnKind::Empty,
        })
        .collect();

    let cells: Vec<Vec<Cell>> = rows
        .map(|row| row.iter().map(cell_from_data).collect::<Vec<_>>())
        .collect();

    for row in &cells {
        for (column, cell) in columns.iter_mut().zip(row) {
            column.kind = column.kind.widen(cell.kind());
        }
    }

    let rows = cells
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(&columns)
                .map(|(cell, column)| cell.coerce(column.kind))
                .collect()
        })
        .collect();

    Table { columns, rows }
}

fn open_xlsx(path: &Path) -> Result<Xlsx<BufReader<File>>> {
    Ok(open_workbook(path)?)
}

/// Parse one sheet of an XLSX workbook, using its first row as the header.
///
/// Reads `sheet` when given, otherwise the first sheet of the workbook.
pub fn parse_xlsx(path: &Path, sheet: Option<&str>) -> Result<Table> {
    let mut workbook = open_xlsx(path)?;
    let names = workbook.sheet_names();

    let name = match sheet {
        Some(wanted) if names.iter().any(|n| n == wanted) => wanted.to_string(),
        Some(wanted) => return Err(MoveitError::SheetNotFound(wanted.to_string())),
        None => names
            .first()
            .cloned()
            .ok_or_else(|| MoveitError::SheetNotFound("<first sheet>".to_string()))?,
    };

    let range = workbook.worksheet_range(&name)?;
    Ok(table_from_range(&range))
}

/// Parse every sheet of an XLSX workbook, in workbook order.
pub fn parse_workbook(path: &Path) -> Result<Vec<(String, Table)>> {
    let mut workbook = open_xlsx(path)?;

    workbook
        .sheet_names()
        .into_iter()
        .map(|name| -> Result<(String, Table)> {
            let range = workbook.worksheet_range(&name)?;
            Ok((name, table_from_range(&range)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{ExcelDateTime, ExcelDateTimeType};

    #[test]
    fn test_format_from_str() {
        assert_eq!("csv".parse::<DownloadFormat>().unwrap(), DownloadFormat::Csv);
        assert_eq!("TXT".parse::<DownloadFormat>().unwrap(), DownloadFormat::Tsv);
        assert_eq!(
            "excel".parse::<DownloadFormat>().unwrap(),
            DownloadFormat::Excel { sheet: None }
        );
        assert!(matches!(
            "parquet".parse::<DownloadFormat>(),
            Err(MoveitError::UnsupportedFormat(f)) if f == "parquet"
        ));
    }

    #[test]
    fn test_content_types() {
        assert_eq!(DownloadFormat::Csv.content_type(), "text/csv");
        assert_eq!(
            DownloadFormat::Excel { sheet: Some("Data".into()) }.content_type(),
            XLSX_MIME
        );
    }

    #[test]
    fn test_widen() {
        assert_eq!(ColumnKind::Empty.widen(ColumnKind::Int), ColumnKind::Int);
        assert_eq!(ColumnKind::Int.widen(ColumnKind::Float), ColumnKind::Float);
        assert_eq!(ColumnKind::Bool.widen(ColumnKind::Int), ColumnKind::Text);
        assert_eq!(ColumnKind::Text.widen(ColumnKind::Empty), ColumnKind::Text);
    }

    #[test]
    fn test_parse_csv_infers_kinds() {
        let data = "id,price,active,name\n1,9.5,true,apple\n2,10,false,pear\n3,,TRUE,\n";
        let table = parse_delimited(data.as_bytes(), b',').unwrap();

        assert_eq!(table.row_count(), 3);
        let kinds: Vec<_> = table.columns().iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![ColumnKind::Int, ColumnKind::Float, ColumnKind::Bool, ColumnKind::Text]
        );
        assert_eq!(table.get(1, "price"), Some(&Cell::Float(10.0)));
        assert_eq!(table.get(2, "price"), Some(&Cell::Empty));
        assert_eq!(table.get(2, "active"), Some(&Cell::Bool(true)));
        assert_eq!(table.get(0, "name"), Some(&Cell::Text("apple".into())));
    }

    #[test]
    fn test_parse_tsv() {
        let data = "a\tb\nx\t1\ny\t2\n";
        let table = parse_delimited(data.as_bytes(), b'\t').unwrap();
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.get(1, "b"), Some(&Cell::Int(2)));
    }

    #[test]
    fn test_parse_ragged_rows() {
        let data = "a,b\n1\n2,3,4\n";
        let table = parse_delimited(data.as_bytes(), b',').unwrap();

        assert_eq!(table.column_count(), 3);
        assert_eq!(table.columns()[2].name, "column_2");
        assert_eq!(table.rows()[0], vec![Cell::Int(1), Cell::Empty, Cell::Empty]);
        assert_eq!(table.rows()[1], vec![Cell::Int(2), Cell::Int(3), Cell::Int(4)]);
    }

    #[test]
    fn test_parse_empty_input() {
        let table = parse_delimited("".as_bytes(), b',').unwrap();
        assert_eq!(table.row_count(), 0);
        assert_eq!(table.column_count(), 0);
    }

    #[test]
    fn test_write_csv() {
        let data = "id,name\n1,\"a, b\"\n2,\n";
        let table = parse_delimited(data.as_bytes(), b',').unwrap();

        let mut out = Vec::new();
        table.write_csv(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "id,name\n1,\"a, b\"\n2,\n");
    }

    #[test]
    fn test_cell_from_data() {
        assert_eq!(cell_from_data(&Data::Float(3.0)), Cell::Int(3));
        assert_eq!(cell_from_data(&Data::Float(2.5)), Cell::Float(2.5));
        assert_eq!(cell_from_data(&Data::String(String::new())), Cell::Empty);
        assert_eq!(cell_from_data(&Data::Bool(true)), Cell::Bool(true));
    }

    #[test]
    fn test_excel_dates_become_datetimes() {
        let serial = Data::DateTime(ExcelDateTime::new(45292.5, ExcelDateTimeType::DateTime, false));
        let expected = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap();
        assert_eq!(cell_from_data(&serial), Cell::DateTime(expected));

        let iso = Data::DateTimeIso("2024-03-05".to_string());
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        assert_eq!(cell_from_data(&iso), Cell::DateTime(expected));
    }

    #[test]
    fn test_excel_durations_stay_numeric() {
        let duration = Data::DateTime(ExcelDateTime::new(1.5, ExcelDateTimeType::TimeDelta, false));
        assert_eq!(cell_from_data(&duration), Cell::Float(1.5));
    }

    #[test]
    fn test_datetime_display_is_iso() {
        let dt = NaiveDate::from_ymd_opt(2024, 1, 15)
            .and_then(|d| d.and_hms_opt(8, 30, 0))
            .unwrap();
        assert_eq!(Cell::DateTime(dt).to_string(), "2024-01-15T08:30:00");
    }

    #[test]
    fn test_cells_are_coerced_to_column_kind() {
        let mut range = Range::new((0, 0), (3, 1));
        range.set_value((0, 0), Data::String("amount".into()));
        range.set_value((0, 1), Data::String("mixed".into()));
        range.set_value((1, 0), Data::Float(10.0));
        range.set_value((1, 1), Data::Float(7.0));
        range.set_value((2, 0), Data::Float(2.5));
        range.set_value((2, 1), Data::Bool(true));
        range.set_value((3, 1), Data::String("n/a".into()));

        let table = table_from_range(&range);

        assert_eq!(table.columns()[0].kind, ColumnKind::Float);
        assert_eq!(table.columns()[1].kind, ColumnKind::Text);
        assert_eq!(table.get(0, "amount"), Some(&Cell::Float(10.0)));
        assert_eq!(table.get(1, "amount"), Some(&Cell::Float(2.5)));
        assert_eq!(table.get(2, "amount"), Some(&Cell::Empty));
        assert_eq!(table.get(0, "mixed"), Some(&Cell::Text("7".into())));
        assert_eq!(table.get(1, "mixed"), Some(&Cell::Text("true".into())));
        assert_eq!(table.get(2, "mixed"), Some(&Cell::Text("n/a".into())));
    }

    #[test]
    fn test_csv_and_xlsx_agree_on_mixed_numbers() {
        let csv = parse_delimited("v\n10\n2.5\n".as_bytes(), b',').unwrap();

        let mut range = Range::new((0, 0), (2, 0));
        range.set_value((0, 0), Data::String("v".into()));
        range.set_value((1, 0), Data::Float(10.0));
        range.set_value((2, 0), Data::Float(2.5));
        let xlsx = table_from_range(&range);

        assert_eq!(csv.rows(), xlsx.rows());
        assert_eq!(csv.columns(), xlsx.columns());
    }
}
