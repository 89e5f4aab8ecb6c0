use std::collections::VecDeque;
use std::ops::Range;

use trellis_types::{ArrayValue, DType};

use crate::error::{BuilderError, BuilderResult};

/// One block of a dataset's data, tagged with its placement in the
/// overall dataset as a per-dimension index range.
#[derive(Clone, Debug, PartialEq)]
pub struct DataChunk {
    pub selection: Vec<Range<u64>>,
    pub data: ArrayValue,
}

/// Lazy, finite, non-restartable producer of dataset chunks.
///
/// Backends drain the iterator into placement-addressed storage, so a
/// dataset's final shape need not be known before writing starts.
pub trait DataChunkIterator: Iterator<Item = DataChunk> {
    /// Element dtype of every chunk.
    fn dtype(&self) -> DType;

    /// Upper bound per dimension; `None` for unbounded dimensions.
    fn maxshape(&self) -> Vec<Option<u64>>;

    /// Chunk shape hint for backends that store chunked. `None` leaves
    /// the choice to the backend.
    fn recommended_chunk_shape(&self) -> Option<Vec<u64>> {
        None
    }
}

/// Chunk iterator over pre-cut row blocks: each block covers the next
/// rows along the first dimension and all of every other dimension.
#[derive(Debug)]
pub struct RowChunkIterator {
    blocks: VecDeque<ArrayValue>,
    dtype: DType,
    trailing: Vec<usize>,
    next_row: u64,
}

impl RowChunkIterator {
    /// Validate that the blocks agree on dtype and trailing shape.
    pub fn new(blocks: Vec<ArrayValue>) -> BuilderResult<Self> {
        let first = blocks
            .first()
            .ok_or_else(|| BuilderError::ChunkShape("no blocks".to_string()))?;
        if first.rank() == 0 {
            return Err(BuilderError::ChunkShape("scalar-shaped block".to_string()));
        }
        let dtype = first.dtype();
        let trailing = first.shape()[1..].to_vec();
        for block in &blocks {
            if block.dtype() != dtype {
                return Err(BuilderError::ChunkShape(format!(
                    "block dtype {} differs from {}",
                    block.dtype(),
                    dtype
                )));
            }
            if block.shape().get(1..) != Some(trailing.as_slice()) {
                return Err(BuilderError::ChunkShape(format!(
                    "block trailing shape {:?} differs from {:?}",
                    block.shape().get(1..),
                    trailing
                )));
            }
        }
        Ok(Self {
            blocks: blocks.into(),
            dtype,
            trailing,
            next_row: 0,
        })
    }
}

impl Iterator for RowChunkIterator {
    type Item = DataChunk;

    fn next(&mut self) -> Option<DataChunk> {
        let block = self.blocks.pop_front()?;
        let rows = block.shape()[0] as u64;
        let mut selection = vec![self.next_row..self.next_row + rows];
        selection.extend(self.trailing.iter().map(|&d| 0..d as u64));
        self.next_row += rows;
        Some(DataChunk {
            selection,
            data: block,
        })
    }
}

impl DataChunkIterator for RowChunkIterator {
    fn dtype(&self) -> DType {
        self.dtype.clone()
    }

    fn maxshape(&self) -> Vec<Option<u64>> {
        let mut shape = vec![None];
        shape.extend(self.trailing.iter().map(|&d| Some(d as u64)));
        shape
    }
}

#[cfg(test)]
mod tests {
    use trellis_types::ArrayData;

    use super::*;

    fn block(rows: usize, cols: usize, start: i64) -> ArrayValue {
        let data: Vec<i64> = (start..start + (rows * cols) as i64).collect();
        ArrayValue::new(vec![rows, cols], ArrayData::Int(data)).unwrap()
    }

    #[test]
    fn row_chunks_carry_progressive_selections() {
        let mut iter = RowChunkIterator::new(vec![block(2, 3, 0), block(1, 3, 6)]).unwrap();
        assert_eq!(iter.maxshape(), vec![None, Some(3)]);
        assert_eq!(iter.dtype(), DType::Int64);

        let first = iter.next().unwrap();
        assert_eq!(first.selection, vec![0..2, 0..3]);
        let second = iter.next().unwrap();
        assert_eq!(second.selection, vec![2..3, 0..3]);
        assert!(iter.next().is_none());
        // non-restartable: the sequence is consumed
        assert!(iter.next().is_none());
    }

    #[test]
    fn mismatched_blocks_are_rejected() {
        let err = RowChunkIterator::new(vec![block(1, 3, 0), block(1, 2, 0)]).unwrap_err();
        assert!(matches!(err, BuilderError::ChunkShape(_)));
        assert!(RowChunkIterator::new(vec![]).is_err());
    }
}
