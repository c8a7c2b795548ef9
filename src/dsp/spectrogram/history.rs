//! Fixed-capacity column history stored as a flat, index-wrapped ring.

/// Rolling `columns x rows` grid of magnitudes.
///
/// Storage is column-major with the write head wrapping around, so appending a
/// column costs O(rows). Iteration and [`RollingMatrix::copy_ordered_into`]
/// always present columns oldest first; row 0 is the lowest frequency.
#[derive(Debug, Clone)]
pub struct RollingMatrix {
    values: Vec<f32>,
    rows: usize,
    columns: usize,
    head: usize,
}

impl RollingMatrix {
    /// Allocates a grid filled with NaN ("no data yet").
    pub fn new(columns: usize, rows: usize) -> Self {
        Self {
            values: vec![f32::NAN; columns * rows],
            rows,
            columns,
            head: 0,
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn columns(&self) -> usize {
        self.columns
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.fill(f32::NAN);
        self.head = 0;
    }

    /// Slot that receives the next column, dropping the oldest one.
    ///
    /// Returns `None` when the grid has no columns.
    pub fn next_column_mut(&mut self) -> Option<&mut [f32]> {
        if self.columns == 0 || self.rows == 0 {
            return None;
        }
        let start = self.head * self.rows;
        self.head = (self.head + 1) % self.columns;
        Some(&mut self.values[start..start + self.rows])
    }

    pub fn push_column(&mut self, column: &[f32]) {
        let rows = self.rows;
        if let Some(slot) = self.next_column_mut() {
            let len = column.len().min(rows);
            slot[..len].copy_from_slice(&column[..len]);
            slot[len..].fill(f32::NAN);
        }
    }

    /// Column `index` counted from the oldest retained column.
    pub fn column(&self, index: usize) -> Option<&[f32]> {
        if index >= self.columns {
            return None;
        }
        let slot = (self.head + index) % self.columns;
        let start = slot * self.rows;
        Some(&self.values[start..start + self.rows])
    }

    pub fn get(&self, column: usize, row: usize) -> Option<f32> {
        self.column(column)?.get(row).copied()
    }

    pub fn iter_columns(&self) -> impl Iterator<Item = &[f32]> + '_ {
        // The two halves of the ring, oldest half first.
        let split = self.head * self.rows;
        let (newer, older) = self.values.split_at(split);
        let rows = self.rows.max(1);
        older.chunks_exact(rows).chain(newer.chunks_exact(rows))
    }

    /// Linearises the grid into `target` in column-major, oldest-first order.
    ///
    /// Reuses `target`'s allocation when its capacity suffices.
    pub fn copy_ordered_into(&self, target: &mut Vec<f32>) {
        let split = self.head * self.rows;
        let (newer, older) = self.values.split_at(split);
        target.clear();
        target.extend_from_slice(older);
        target.extend_from_slice(newer);
    }

    pub fn to_vec(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.values.len());
        self.copy_ordered_into(&mut out);
        out
    }
}
