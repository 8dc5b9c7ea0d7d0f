use tracing::info;
use crate::storage::env::IndexStore;
use crate::core::error::Result;

/// Flush bookkeeping for bulk writes into one store.
///
/// Records are written through immediately; every `batch_size` records
/// the WAL is synced, and `finish` checkpoints so the loaded data is
/// persisted as segments.
pub struct BatchWriter {
    pub store: IndexStore,
    pub batch_size: usize,
    pub pending: usize,
    pub written: u64,
    pub batches: u64,
}

impl BatchWriter {
    pub fn new(store: IndexStore, batch_size: usize) -> Self {
        BatchWriter {
            store,
            batch_size: batch_size.max(1),
            pending: 0,
            written: 0,
            batches: 0,
        }
    }

    pub fn record_written(&mut self) -> Result<()> {
        self.pending += 1;
        self.written += 1;

        if self.pending >= self.batch_size {
            self.flush()?;
        }

        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        if self.pending == 0 {
            return Ok(());
        }
        self.store.flush()?;
        self.pending = 0;
        self.batches += 1;
        info!(
            path = %self.store.path().display(),
            written = self.written,
            batches = self.batches,
            "batch flushed"
        );
        Ok(())
    }

    /// Returns the number of records written
    pub fn finish(mut self) -> Result<u64> {
        self.flush()?;
        self.store.checkpoint()?;
        Ok(self.written)
    }
}
