use stratum_domain::{RecordId, StatSample};
use stratum_store::StorageResourceStatistic;

use crate::error::ManagerError;
use crate::manager::Inner;

/// `session_get_stats` (§4.5): fetch-or-create each named statistic, drop
/// and recreate it if the plugin redeclared its `sample_period`
/// (`StatisticPeriodChanged` is a logged, best-effort condition per §7, not
/// a propagated error), then forward every sample to the metrics sink.
pub(crate) fn session_get_stats(
    inner: &mut Inner,
    record_id: RecordId,
    samples: &[StatSample],
) -> Result<(), ManagerError> {
    for sample in samples {
        match inner.store.statistic(record_id, &sample.name)? {
            Some(existing) if existing.sample_period != sample.sample_period => {
                tracing::warn!(
                    %record_id,
                    name = %sample.name,
                    old = existing.sample_period,
                    new = sample.sample_period,
                    "statistic sample_period changed, discarding existing samples"
                );
                inner.metrics.clear(record_id, &sample.name);
                inner.store.delete_statistic(record_id, &sample.name)?;
                inner.store.upsert_statistic(&StorageResourceStatistic {
                    record_id,
                    name: sample.name.clone(),
                    sample_period: sample.sample_period,
                })?;
            }
            Some(_) => {}
            None => {
                inner.store.upsert_statistic(&StorageResourceStatistic {
                    record_id,
                    name: sample.name.clone(),
                    sample_period: sample.sample_period,
                })?;
            }
        }
        inner.metrics.record_sample(record_id, &sample.name, sample.value, chrono::Utc::now());
    }
    Ok(())
}
