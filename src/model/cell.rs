use anyhow::{bail, Context};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A zero-based (row, column) cell coordinate. Parses from and displays as A1 notation, so
/// `CellRef::new(22, 5)` is `"F23"`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct CellRef(pub usize, pub usize);

impl CellRef {
    pub const fn new(row: usize, col: usize) -> Self {
        Self(row, col)
    }

    pub fn row(&self) -> usize {
        self.0
    }

    pub fn col(&self) -> usize {
        self.1
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.1), self.0 + 1)
    }
}

impl FromStr for CellRef {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| c.is_ascii_digit())
            .with_context(|| format!("Cell reference '{s}' has no row number"))?;
        let (letters, digits) = s.split_at(split);
        if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
            bail!("Cell reference '{s}' must start with column letters, e.g. 'F23'");
        }

        let mut col = 0usize;
        for c in letters.chars() {
            let digit = c.to_ascii_uppercase() as usize - 'A' as usize + 1;
            col = match col.checked_mul(26).and_then(|n| n.checked_add(digit)) {
                Some(n) => n,
                None => bail!("Column of cell reference '{s}' is out of range"),
            };
        }

        let row: usize = digits
            .parse()
            .with_context(|| format!("Invalid row number in cell reference '{s}'"))?;
        if row == 0 {
            bail!("Row numbers start at 1, got '{s}'");
        }

        Ok(CellRef(row - 1, col - 1))
    }
}

impl Serialize for CellRef {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CellRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        CellRef::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// A rectangular block of cells, e.g. `F1:H23`. Corners are normalized on construction so that
/// `F23:H1` describes the same block.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct CellRange {
    start: CellRef,
    end: CellRef,
}

impl CellRange {
    pub fn new(a: CellRef, b: CellRef) -> Self {
        Self {
            start: CellRef(a.0.min(b.0), a.1.min(b.1)),
            end: CellRef(a.0.max(b.0), a.1.max(b.1)),
        }
    }

    /// The top-left corner.
    pub fn start(&self) -> CellRef {
        self.start
    }

    /// The bottom-right corner.
    pub fn end(&self) -> CellRef {
        self.end
    }

    pub fn contains(&self, cell: CellRef) -> bool {
        (self.start.0..=self.end.0).contains(&cell.0)
            && (self.start.1..=self.end.1).contains(&cell.1)
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

impl FromStr for CellRange {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (a, b) = s
            .split_once(':')
            .with_context(|| format!("Cell range must look like 'F1:H23', got: {s}"))?;
        Ok(CellRange::new(a.parse()?, b.parse()?))
    }
}

/// Converts a zero-based column index to its letters: 0 -> A, 25 -> Z, 26 -> AA.
fn column_letters(col: usize) -> String {
    let mut n = col;
    let mut letters = Vec::new();
    loop {
        letters.push((b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    letters.iter().rev().collect()
}
