use std::thread;
use crossbeam::channel::{bounded, Receiver, Sender};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::IstexRecord;
use crate::enrich::sink::EnrichmentSink;
use crate::index::istex::IstexIndex;
use crate::index::pubmed::PubMedIndex;

// Batches read ahead of the enrichment workers
const READ_AHEAD: usize = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentReport {
    pub processed: u64,
    pub pmid_added: u64,
    pub pmcid_added: u64,
    pub skipped_corrupt: u64,
    pub batches: u64,
}

/// Fields one record gained
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldsAdded {
    pub pmid: bool,
    pub pmcid: bool,
}

/// Fills empty PMID/PMCID fields of ISTEX records from the PubMed
/// relations of their first DOI.
///
/// A reader thread walks the ISTEX records in id order and hands fixed
/// size batches over a bounded channel; each batch is enriched in
/// parallel and written to the sink in order. Existing values are never
/// replaced, so a second run finds nothing to add.
pub struct EnrichmentPass {
    istex: IstexIndex,
    pubmed: PubMedIndex,
    batch_size: usize,
}

impl EnrichmentPass {
    pub fn new(istex: IstexIndex, pubmed: PubMedIndex, batch_size: usize) -> Self {
        EnrichmentPass {
            istex,
            pubmed,
            batch_size: batch_size.max(1),
        }
    }

    pub fn run<S: EnrichmentSink>(&self, sink: &mut S) -> Result<EnrichmentReport> {
        let (batch_sender, batch_receiver) = bounded(READ_AHEAD);

        let (consumed, skipped) = thread::scope(|scope| {
            let reader = scope.spawn(|| self.read_batches(batch_sender));
            // The receiver is dropped when consume returns, which unblocks
            // the reader if consume bailed out early
            let consumed = self.consume(batch_receiver, sink);
            let skipped = reader
                .join()
                .map_err(|_| Error::new(ErrorKind::Internal, "enrichment reader panicked".to_string()));
            (consumed, skipped)
        });

        let mut report = consumed?;
        report.skipped_corrupt = skipped??;
        sink.finish()?;

        info!(
            processed = report.processed,
            pmid_added = report.pmid_added,
            pmcid_added = report.pmcid_added,
            skipped_corrupt = report.skipped_corrupt,
            batches = report.batches,
            "enrichment pass complete"
        );
        Ok(report)
    }

    /// Fill what the record lacks. Returns which fields were set.
    pub fn enrich_record(&self, record: &mut IstexRecord) -> Result<FieldsAdded> {
        let mut added = FieldsAdded::default();
        let Some(doi) = record.first_doi().map(str::to_string) else {
            return Ok(added);
        };

        if record.first_pmid().is_none() {
            if let Some(pmid) = self.pubmed.pmid_by_doi(&doi)? {
                record.pmid = vec![pmid];
                added.pmid = true;
            }
        }
        if record.first_pmc().is_none() {
            if let Some(pmcid) = self.pubmed.pmcid_by_doi(&doi)? {
                record.pmc = vec![pmcid];
                added.pmcid = true;
            }
        }
        Ok(added)
    }

    // Returns the number of corrupt records skipped
    fn read_batches(&self, sender: Sender<Result<Vec<IstexRecord>>>) -> Result<u64> {
        let mut skipped = 0;
        let records = match self.istex.iter_records() {
            Ok(records) => records,
            Err(e) => {
                let _ = sender.send(Err(e));
                return Ok(skipped);
            }
        };

        let mut batch = Vec::with_capacity(self.batch_size);
        for entry in records {
            match entry {
                Ok((_, record)) => batch.push(record),
                Err(e) if e.is(ErrorKind::CorruptRecord) => {
                    warn!(error = %e, "skipping undecodable ISTEX record");
                    skipped += 1;
                    continue;
                }
                Err(e) => {
                    let _ = sender.send(Err(e));
                    return Ok(skipped);
                }
            }

            if batch.len() >= self.batch_size {
                let full = std::mem::replace(&mut batch, Vec::with_capacity(self.batch_size));
                if sender.send(Ok(full)).is_err() {
                    // Consumer gave up
                    return Ok(skipped);
                }
            }
        }

        if !batch.is_empty() {
            let _ = sender.send(Ok(batch));
        }
        Ok(skipped)
    }

    fn consume<S: EnrichmentSink>(
        &self,
        receiver: Receiver<Result<Vec<IstexRecord>>>,
        sink: &mut S,
    ) -> Result<EnrichmentReport> {
        let mut report = EnrichmentReport::default();

        for batch in receiver {
            let mut batch = batch?;
            let added = batch
                .par_iter_mut()
                .map(|record| self.enrich_record(record))
                .collect::<Result<Vec<_>>>()?;

            report.processed += batch.len() as u64;
            report.pmid_added += added.iter().filter(|a| a.pmid).count() as u64;
            report.pmcid_added += added.iter().filter(|a| a.pmcid).count() as u64;

            sink.write_batch(&batch)?;
            report.batches += 1;
            info!(
                batch = report.batches,
                processed = report.processed,
                "enrichment batch written"
            );
        }

        Ok(report)
    }
}
