use crate::prelude::StageError;

/// Scoped buffer pool that keeps per-window allocations bounded.
///
/// At most `max_outstanding` buffers may be checked out at once; stages
/// return buffers through [`release`](Self::release) for reuse.
pub struct BufferPool {
    free: Vec<Vec<f32>>,
    max_outstanding: usize,
    outstanding: usize,
}

impl BufferPool {
    pub fn with_capacity(max_outstanding: usize) -> Self {
        Self {
            free: Vec::with_capacity(max_outstanding),
            max_outstanding,
            outstanding: 0,
        }
    }

    /// Takes a buffer of the requested length from the pool, allocating one
    /// when no freed buffer is available.
    pub fn checkout(&mut self, length: usize) -> Result<Vec<f32>, StageError> {
        if self.outstanding >= self.max_outstanding {
            return Err(StageError::BufferExhaustion(format!(
                "{} buffers already checked out",
                self.outstanding
            )));
        }
        self.outstanding += 1;
        match self.free.pop() {
            Some(mut buffer) => {
                buffer.clear();
                buffer.resize(length, 0.0);
                Ok(buffer)
            }
            None => Ok(vec![0.0; length]),
        }
    }

    /// Returns a buffer to the pool for reuse.
    pub fn release(&mut self, mut buffer: Vec<f32>) {
        buffer.clear();
        self.outstanding = self.outstanding.saturating_sub(1);
        if self.free.len() < self.max_outstanding {
            self.free.push(buffer);
        }
    }

    pub fn reset(&mut self) {
        self.free.clear();
        self.outstanding = 0;
    }
}
