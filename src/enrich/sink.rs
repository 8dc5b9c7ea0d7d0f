use std::io::Write;
use crate::core::error::Result;
use crate::core::types::IstexRecord;
use crate::index::istex::IstexIndex;

/// Destination of enriched records, written one batch at a time
pub trait EnrichmentSink {
    fn write_batch(&mut self, batch: &[IstexRecord]) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes records back into the ISTEX indices, syncing after every batch
pub struct IndexSink {
    istex: IstexIndex,
}

impl IndexSink {
    pub fn new(istex: IstexIndex) -> Self {
        IndexSink { istex }
    }
}

impl EnrichmentSink for IndexSink {
    fn write_batch(&mut self, batch: &[IstexRecord]) -> Result<()> {
        for record in batch {
            self.istex.store_record(record)?;
        }
        self.istex.store().flush()
    }

    fn finish(&mut self) -> Result<()> {
        self.istex.store().checkpoint()
    }
}

/// One JSON object per line
pub struct JsonLinesSink<W: Write> {
    writer: W,
    pub written: u64,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        JsonLinesSink { writer, written: 0 }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> EnrichmentSink for JsonLinesSink<W> {
    fn write_batch(&mut self, batch: &[IstexRecord]) -> Result<()> {
        for record in batch {
            serde_json::to_writer(&mut self.writer, record)?;
            self.writer.write_all(b"\n")?;
            self.written += 1;
        }
        self.writer.flush()?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl EnrichmentSink for Vec<IstexRecord> {
    fn write_batch(&mut self, batch: &[IstexRecord]) -> Result<()> {
        self.extend_from_slice(batch);
        Ok(())
    }
}
