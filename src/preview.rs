use serde::{Deserialize, Serialize};
use std::error::Error;

/// Rows kept for the on-page table and charts
pub const PREVIEW_ROWS: usize = 200;

/// Header plus the first rows of an uploaded sheet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetPreview {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SheetPreview {
    /// Builds a preview from CSV text. The first non-empty line is the header.
    pub fn from_csv(text: &str, max_rows: usize) -> Result<Self, Box<dyn Error>> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let header = lines.next().ok_or("CSV file is empty")?;
        let columns: Vec<String> = parse_csv_row(header)
            .into_iter()
            .map(|c| c.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for line in lines.take(max_rows) {
            let mut row = parse_csv_row(line);
            row.resize(columns.len(), String::new());
            rows.push(row);
        }

        Ok(SheetPreview { columns, rows })
    }

    /// Builds a preview from an uploaded file, picking the reader by extension
    ///
    /// # Arguments
    /// * `filename` - Name the file was uploaded under; `.csv` is read as text
    /// * `bytes` - Raw file contents
    /// * `max_rows` - Number of data rows to keep below the header
    ///
    /// # Returns
    /// * `Result<SheetPreview, Box<dyn Error>>` - The preview or the reason it could not be read
    pub fn from_bytes(filename: &str, bytes: &[u8], max_rows: usize) -> Result<Self, Box<dyn Error>> {
        if filename.to_ascii_lowercase().ends_with(".csv") {
            return Self::from_csv(std::str::from_utf8(bytes)?, max_rows);
        }
        Self::from_workbook(bytes, max_rows)
    }

    /// Reads the first worksheet of an Excel workbook (`.xlsx`, `.xls`, `.xlsb` or `.ods`).
    /// The first row is the header.
    #[cfg(feature = "web")]
    pub fn from_workbook(bytes: &[u8], max_rows: usize) -> Result<Self, Box<dyn Error>> {
        use calamine::{Reader, open_workbook_auto_from_rs};
        use std::io::Cursor;

        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

        // Get the first worksheet
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or("No sheets found in workbook")?;
        let range = workbook.worksheet_range(&sheet_name)?;

        let mut lines = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect::<Vec<String>>())
            .filter(|row| row.iter().any(|c| !c.is_empty()));
        let columns: Vec<String> = lines
            .next()
            .ok_or("Worksheet is empty")?
            .into_iter()
            .map(|c| c.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for mut row in lines.take(max_rows) {
            row.resize(columns.len(), String::new());
            rows.push(row);
        }

        Ok(SheetPreview { columns, rows })
    }

    #[cfg(not(feature = "web"))]
    pub fn from_workbook(_bytes: &[u8], _max_rows: usize) -> Result<Self, Box<dyn Error>> {
        Err("Workbook previews require the `web` feature".into())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Numeric values of a column; cells that don't parse are skipped
    pub fn numeric_column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .filter_map(|row| row.get(idx))
                .filter_map(|v| v.trim().parse::<f64>().ok())
                .collect(),
        )
    }

    /// Row-aligned numeric pairs; rows where either cell is non-numeric are dropped
    pub fn numeric_rows(&self, names: &[&str]) -> Option<Vec<Vec<f64>>> {
        let indices: Vec<usize> = names
            .iter()
            .map(|n| self.column_index(n))
            .collect::<Option<_>>()?;
        Some(
            self.rows
                .iter()
                .filter_map(|row| {
                    indices
                        .iter()
                        .map(|&i| row.get(i).and_then(|v| v.trim().parse::<f64>().ok()))
                        .collect::<Option<Vec<f64>>>()
                })
                .collect(),
        )
    }

    /// Columns with at least one numeric cell
    pub fn numeric_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| self.numeric_column(c).is_some_and(|v| !v.is_empty()))
            .cloned()
            .collect()
    }
}

/// Display text of a worksheet cell; whole floats lose their `.0`
#[cfg(feature = "web")]
fn cell_text(cell: &calamine::Data) -> String {
    use calamine::Data;

    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Parse a CSV row into fields, honouring quotes and doubled quotes
pub fn parse_csv_row(line: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current_field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    // Doubled quote inside a quoted field
                    current_field.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => {
                result.push(std::mem::take(&mut current_field));
            }
            '\r' if !in_quotes => {}
            _ => current_field.push(c),
        }
    }

    result.push(current_field);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_fields_keep_commas_and_quotes() {
        assert_eq!(
            parse_csv_row(r#"a,"b,c","say ""hi""",d"#),
            vec!["a", "b,c", r#"say "hi""#, "d"]
        );
        assert_eq!(parse_csv_row(""), vec![""]);
    }

    #[test]
    fn preview_pads_short_rows_and_limits_length() {
        let csv = "Month,Sales,Cost\r\nJan,10,4\r\nFeb,12\r\n\r\nMar,9,3\r\n";
        let preview = SheetPreview::from_csv(csv, 2).unwrap();
        assert_eq!(preview.columns, vec!["Month", "Sales", "Cost"]);
        assert_eq!(preview.rows.len(), 2);
        assert_eq!(preview.rows[1], vec!["Feb", "12", ""]);
    }

    #[test]
    fn numeric_helpers_skip_text() {
        let preview = SheetPreview::from_csv("x,y,label\n1,2,a\n2,n/a,b\n3,6,c\n", 10).unwrap();
        assert_eq!(preview.numeric_column("y"), Some(vec![2.0, 6.0]));
        assert_eq!(preview.numeric_rows(&["x", "y"]), Some(vec![vec![1.0, 2.0], vec![3.0, 6.0]]));
        assert_eq!(preview.numeric_columns(), vec!["x", "y"]);
        assert!(preview.numeric_column("missing").is_none());
    }

    #[test]
    fn empty_csv_is_an_error() {
        assert!(SheetPreview::from_csv("\n\n", 10).is_err());
    }

    #[cfg(feature = "web")]
    #[test]
    fn first_worksheet_of_a_workbook_becomes_the_preview() {
        let bytes = include_bytes!("../tests/fixtures/quarterly.xlsx");
        let preview = SheetPreview::from_bytes("Quarterly.XLSX", bytes, 10).unwrap();
        assert_eq!(preview.columns, vec!["Quarter", "Revenue", "Cost"]);
        assert_eq!(preview.rows.len(), 4);
        assert_eq!(preview.rows[0], vec!["Q1", "120", "80"]);
        assert_eq!(preview.rows[3], vec!["Q4", "170.5", "110"]);
        assert_eq!(preview.numeric_columns(), vec!["Revenue", "Cost"]);

        let capped = SheetPreview::from_workbook(bytes, 2).unwrap();
        assert_eq!(capped.rows.len(), 2);
    }

    #[test]
    fn unreadable_workbook_is_an_error() {
        assert!(SheetPreview::from_bytes("broken.xlsx", b"not a zip archive", 10).is_err());
        assert!(SheetPreview::from_bytes("data.csv", &[0xff, 0xfe, 0x00], 10).is_err());
    }
}
