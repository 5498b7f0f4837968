use ndarray::{Array1, Array2, Axis};
use std::time::SystemTime;

/// Bytes copied out of the DMA ring in one loop iteration.
///
/// `data` has shape `(1, len)`. It owns its memory, so it stays valid after
/// the ring region it came from has been handed back to the card.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Position in the emission order, starting at 0.
    pub seq: u64,
    /// Ring offset the bytes were read from.
    pub offset: usize,
    pub received: SystemTime,
    pub data: Array2<u8>,
}

impl Chunk {
    pub fn copy_from(seq: u64, offset: usize, bytes: &[u8]) -> Self {
        Self {
            seq,
            offset,
            received: SystemTime::now(),
            data: Array1::from(bytes.to_vec()).insert_axis(Axis(0)),
        }
    }

    pub fn len(&self) -> usize {
        self.data.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bytes(&self) -> &[u8] {
        self.data.as_slice().unwrap_or(&[])
    }

    /// Interprets the bytes as little-endian 16 bit samples, the layout of
    /// two-byte analog cards.
    pub fn samples_i16(&self) -> Vec<i16> {
        self.bytes()
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_is_a_single_row() {
        let chunk = Chunk::copy_from(3, 40, &[1, 0, 0xff, 0x7f, 9]);
        assert_eq!(chunk.data.dim(), (1, 5));
        assert_eq!(chunk.len(), 5);
        assert_eq!(chunk.bytes(), &[1, 0, 0xff, 0x7f, 9]);
        assert_eq!(chunk.samples_i16(), vec![1, i16::MAX]);
    }
}
