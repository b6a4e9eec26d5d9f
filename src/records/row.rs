use eyre::{bail, ensure, Result};

use super::schema::{DataType, Schema};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(u32),
    Text(String),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "INT",
            Value::Text(_) => "TEXT",
        }
    }
}

pub type Row = Vec<Value>;

impl Schema {
    /// Encodes `row` into `dst`, which must be exactly `row_size` bytes.
    /// The destination is zeroed first so padding bytes are deterministic.
    pub fn serialize_row(&self, row: &[Value], dst: &mut [u8]) -> Result<()> {
        ensure!(
            dst.len() == self.row_size() as usize,
            "destination is {} bytes, row size is {}",
            dst.len(),
            self.row_size()
        );
        ensure!(
            row.len() == self.columns.len(),
            "row has {} values, schema has {} columns",
            row.len(),
            self.columns.len()
        );

        dst.fill(0);

        for (value, col) in row.iter().zip(&self.columns) {
            let base = col.offset as usize;
            match (col.data_type, value) {
                (DataType::Int, Value::Int(v)) => {
                    dst[base..base + 4].copy_from_slice(&v.to_le_bytes());
                }
                (DataType::Text { max_len }, Value::Text(s)) => {
                    let bytes = s.as_bytes();
                    let n = bytes.len().min(max_len as usize);
                    dst[base..base + n].copy_from_slice(&bytes[..n]);
                }
                (expected, got) => bail!(
                    "column '{}' expects {}, got {}",
                    col.name,
                    expected.name(),
                    got.type_name()
                ),
            }
        }

        Ok(())
    }

    /// Decodes a row from `src`, which must be exactly `row_size` bytes.
    pub fn deserialize_row(&self, src: &[u8]) -> Result<Row> {
        ensure!(
            src.len() == self.row_size() as usize,
            "source is {} bytes, row size is {}",
            src.len(),
            self.row_size()
        );

        let mut row = Vec::with_capacity(self.columns.len());
        for col in &self.columns {
            let base = col.offset as usize;
            match col.data_type {
                DataType::Int => {
                    let v = u32::from_le_bytes([
                        src[base],
                        src[base + 1],
                        src[base + 2],
                        src[base + 3],
                    ]);
                    row.push(Value::Int(v));
                }
                DataType::Text { .. } => {
                    let raw = &src[base..base + col.byte_size as usize];
                    let end = raw
                        .iter()
                        .rposition(|&b| b != 0)
                        .map(|i| i + 1)
                        .unwrap_or(0);
                    let text = String::from_utf8_lossy(&raw[..end]).into_owned();
                    row.push(Value::Text(text));
                }
            }
        }

        Ok(row)
    }
}
