use crate::spreadsheet::SpreadsheetError;

/// Rows written per range update when the caller doesn't choose a size.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// A contiguous block of rows (1-based, inclusive) written in a single range update.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RowSpan {
    pub start: usize,
    pub end: usize,
}

impl RowSpan {
    /// Number of rows in the span.
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// 0-based, end-exclusive bounds for slicing the row data.
    pub fn as_slice_range(&self) -> std::ops::Range<usize> {
        (self.start - 1)..self.end
    }
}

/// Partition of rows `1..=total_rows` into spans of at most `chunk_size` rows.
#[derive(Copy, Clone, Debug)]
pub struct ChunkPlan {
    total_rows: usize,
    chunk_size: usize,
}

impl ChunkPlan {
    pub fn new(total_rows: usize, chunk_size: usize) -> Result<Self, SpreadsheetError> {
        if chunk_size == 0 {
            return Err(SpreadsheetError::InvalidChunkSize);
        }
        Ok(ChunkPlan { total_rows, chunk_size })
    }

    /// Number of spans, `ceil(total_rows / chunk_size)`.
    pub fn len(&self) -> usize {
        self.total_rows.div_ceil(self.chunk_size)
    }

    pub fn is_empty(&self) -> bool {
        self.total_rows == 0
    }

    pub fn spans(&self) -> ChunkSpans {
        ChunkSpans { plan: *self, next_start: 1 }
    }
}

impl IntoIterator for ChunkPlan {
    type Item = RowSpan;
    type IntoIter = ChunkSpans;

    fn into_iter(self) -> Self::IntoIter {
        self.spans()
    }
}

/// Iterator over the spans of a [`ChunkPlan`], the last span clipped to the total row count.
pub struct ChunkSpans {
    plan: ChunkPlan,
    next_start: usize,
}

impl Iterator for ChunkSpans {
    type Item = RowSpan;

    fn next(&mut self) -> Option<RowSpan> {
        if self.next_start > self.plan.total_rows {
            return None;
        }
        let start = self.next_start;
        let end = start.saturating_add(self.plan.chunk_size - 1).min(self.plan.total_rows);
        self.next_start = end + 1;
        Some(RowSpan { start, end })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.plan.total_rows + 1)
            .saturating_sub(self.next_start)
            .div_ceil(self.plan.chunk_size);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ChunkSpans {}
