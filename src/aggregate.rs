use std::{ collections::HashMap, net::IpAddr };

use tracing::trace;

use crate::observation::{ Confidence, ScanBatch, Source };

/// Merged view of one address across every source that observed it.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRecord {
    pub ip: IpAddr,
    pub best_confidence: Confidence,
    /// Sources that produced an observation, in first-seen order, no duplicates.
    pub sources: Vec<Source>,
}

/// Accumulates batches into one record per address. Records are created on
/// first observation, updated in place afterwards, and never removed.
#[derive(Debug, Default)]
pub struct Aggregate {
    index: HashMap<IpAddr, usize>,
    records: Vec<AggregateRecord>,
}

impl Aggregate {
    pub fn new() -> Aggregate {
        Aggregate::default()
    }

    /// Folds a batch in. Call once per distinct batch.
    pub fn merge(&mut self, batch: &ScanBatch) {
        for obs in &batch.observations {
            match self.index.get(&obs.ip) {
                Some(idx) => {
                    let record = &mut self.records[*idx];
                    record.best_confidence = record.best_confidence.better(obs.confidence);
                    if !record.sources.contains(&obs.source) {
                        record.sources.push(obs.source);
                    }
                    trace!(ip = %obs.ip, "updated record from {}", obs.source);
                }
                None => {
                    self.index.insert(obs.ip, self.records.len());
                    self.records.push(AggregateRecord {
                        ip: obs.ip,
                        best_confidence: obs.confidence,
                        sources: vec![obs.source],
                    });
                    trace!(ip = %obs.ip, "new record from {}", obs.source);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Final per-address view, in first-observation order.
    pub fn snapshot(self) -> Vec<AggregateRecord> {
        self.records
    }
}
