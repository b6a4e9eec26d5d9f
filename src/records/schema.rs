use eyre::{ensure, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Int,
    Text { max_len: u32 },
}

impl DataType {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            DataType::Int => "INT",
            DataType::Text { .. } => "TEXT",
        }
    }
}

/// A column as declared by the caller. `Schema::new` turns a list of these
/// into a fixed row layout.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
}

impl Column {
    pub fn int(name: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: DataType::Int,
        }
    }

    pub fn text(name: &str, max_len: u32) -> Self {
        Self {
            name: name.to_string(),
            data_type: DataType::Text { max_len },
        }
    }
}

/// A column with its resolved position inside the row.
#[derive(Debug, Clone)]
pub(crate) struct ColumnMeta {
    pub(crate) name: String,
    pub(crate) data_type: DataType,
    pub(crate) offset: u32,
    pub(crate) byte_size: u32,
}

/// The row layout for one tree. Constant for the tree's lifetime.
#[derive(Debug, Clone)]
pub struct Schema {
    pub(crate) columns: Vec<ColumnMeta>,
    row_size: u32,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        ensure!(!columns.is_empty(), "schema must have at least one column");

        let mut metas = Vec::with_capacity(columns.len());
        let mut offset = 0u32;

        for col in columns {
            let byte_size = match col.data_type {
                DataType::Int => 4,
                DataType::Text { max_len } => {
                    ensure!(
                        max_len > 0,
                        "TEXT column '{}' must have a positive max length",
                        col.name
                    );
                    max_len
                }
            };

            metas.push(ColumnMeta {
                name: col.name,
                data_type: col.data_type,
                offset,
                byte_size,
            });
            offset += byte_size;
        }

        Ok(Self {
            columns: metas,
            row_size: offset,
        })
    }

    /// Width of every serialized row in bytes.
    pub fn row_size(&self) -> u32 {
        self.row_size
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }
}
