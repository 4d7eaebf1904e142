use log::*;

use crate::{
    db_types::{IngestTally, NewExternalTransaction},
    panel_types::PanelTransaction,
    traits::TransactionStore,
};

/// Writes a batch of panel records for one cabinet, inserting only the ones not seen before.
///
/// Every input record is counted in `total_processed`; only actual inserts count as `new_transactions`, so the
/// difference is the number of duplicates skipped. A write error on an individual record does not abort the
/// batch: the record is counted as an error, logged, and processing continues with the rest.
pub async fn persist_batch<B: TransactionStore>(
    db: &B,
    cabinet_id: i64,
    batch: &[PanelTransaction],
) -> IngestTally {
    let mut tally = IngestTally::default();
    for raw in batch {
        tally.total_processed += 1;
        let record = NewExternalTransaction::from_panel(cabinet_id, raw.clone());
        match db.insert_transaction(record).await {
            Ok(true) => tally.new_transactions += 1,
            Ok(false) => trace!("📥️ Transaction [{}] already stored for cabinet {cabinet_id}", raw.external_id),
            Err(e) => {
                tally.write_errors += 1;
                error!("📥️ Could not store transaction [{}] for cabinet {cabinet_id}: {e}", raw.external_id);
            },
        }
    }
    debug!(
        "📥️ Batch for cabinet {cabinet_id} done. {} processed, {} new, {} duplicates, {} errors",
        tally.total_processed,
        tally.new_transactions,
        tally.duplicates_skipped(),
        tally.write_errors
    );
    tally
}
