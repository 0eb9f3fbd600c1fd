use std::fmt;

/// A1-notation range: `table!K5`, `table!A2:L`, `table!A:L`.
/// Columns are 0-based internally, rows are 1-based as in the sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellRange {
    pub table: String,
    pub start_col: u32,
    pub start_row: Option<u32>,
    pub end_col: Option<u32>,
    pub end_row: Option<u32>,
}

impl CellRange {
    pub fn cell(table: &str, col: u32, row: u32) -> Self {
        Self {
            table: table.to_string(),
            start_col: col,
            start_row: Some(row),
            end_col: None,
            end_row: None,
        }
    }

    /// `table!<start><row>:<end><row>`: consecutive cells on one row.
    pub fn row_span(table: &str, start_col: u32, end_col: u32, row: u32) -> Self {
        Self {
            table: table.to_string(),
            start_col,
            start_row: Some(row),
            end_col: Some(end_col),
            end_row: Some(row),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let (table, cells) = s.rsplit_once('!')?;
        let table = table.trim_matches('\'');
        if table.is_empty() {
            return None;
        }
        let (start, end) = match cells.split_once(':') {
            Some((a, b)) => (a, Some(b)),
            None => (cells, None),
        };
        let (start_col, start_row) = parse_cell(start)?;
        let (end_col, end_row) = match end {
            Some(e) => {
                let (c, r) = parse_cell(e)?;
                (Some(c), r)
            }
            None => (None, None),
        };
        Some(Self {
            table: table.to_string(),
            start_col,
            start_row,
            end_col,
            end_row,
        })
    }

    pub fn last_col(&self) -> u32 {
        self.end_col.unwrap_or(self.start_col)
    }

    pub fn width(&self) -> usize {
        (self.last_col().saturating_sub(self.start_col) + 1) as usize
    }

    /// Last row touched, if the range names one.
    pub fn last_row(&self) -> Option<u32> {
        self.end_row.or(self.start_row)
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", self.table, column_name(self.start_col))?;
        if let Some(r) = self.start_row {
            write!(f, "{r}")?;
        }
        if let Some(c) = self.end_col {
            write!(f, ":{}", column_name(c))?;
            if let Some(r) = self.end_row {
                write!(f, "{r}")?;
            }
        }
        Ok(())
    }
}

fn parse_cell(s: &str) -> Option<(u32, Option<u32>)> {
    let split = s.find(|c: char| c.is_ascii_digit()).unwrap_or(s.len());
    let (letters, digits) = s.split_at(split);
    let col = column_index(letters)?;
    let row = if digits.is_empty() {
        None
    } else {
        let r: u32 = digits.parse().ok()?;
        if r == 0 {
            return None;
        }
        Some(r)
    };
    Some((col, row))
}

/// `A` → 0, `Z` → 25, `AA` → 26.
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let mut n: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        n = n * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    Some(n - 1)
}

pub fn column_name(index: u32) -> String {
    let mut n = index + 1;
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    out.iter().rev().collect()
}
