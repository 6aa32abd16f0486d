use uuid::Uuid;

use stratum_domain::RecordId;
use stratum_store::{StorageAlertPropagated, StorageResourceAlert};

use crate::error::ManagerError;
use crate::manager::Inner;

/// `session_notify_alert` (§4.9): raise creates/reactivates a durable alert
/// row and propagates it to every descendant; clear always calls `notify`
/// and unwinds propagation if a state existed. Raise and clear are not
/// transactional across the alert row and its propagated rows (§9).
pub(crate) fn notify_alert(
    inner: &mut Inner,
    record_id: RecordId,
    active: bool,
    alert_class: &str,
    attribute: Option<&str>,
) -> Result<(), ManagerError> {
    let state = notify(inner, record_id, active, alert_class, attribute)?;

    if active {
        if let Some(alert_state_id) = state {
            // Recreate the propagated set from scratch so raising the same
            // alert twice stays idempotent instead of duplicating rows.
            inner.store.delete_propagated_alerts_of(alert_state_id)?;
            for descendant in inner.edges.descendants(record_id) {
                inner.store.append_propagated_alert(&StorageAlertPropagated {
                    alert_state_id,
                    record_id: descendant,
                })?;
            }
        }
    } else {
        if let Some(alert_state_id) = state {
            inner.store.delete_propagated_alerts_of(alert_state_id)?;
        }
        inner.active_alerts.remove(&(record_id, alert_class.to_string()));
    }

    Ok(())
}

/// Returns the alert's state id if one exists after the call, `None` if
/// clearing found nothing to clear.
fn notify(
    inner: &mut Inner,
    record_id: RecordId,
    active: bool,
    alert_class: &str,
    attribute: Option<&str>,
) -> Result<Option<Uuid>, ManagerError> {
    let key = (record_id, alert_class.to_string());

    if active {
        if let Some(&existing) = inner.active_alerts.get(&key) {
            return Ok(Some(existing));
        }
        let alert_state_id = Uuid::new_v4();
        inner.store.upsert_alert(&StorageResourceAlert {
            record_id,
            alert_class: alert_class.to_string(),
            attribute: attribute.map(str::to_string),
            active: true,
            alert_state_id,
        })?;
        inner.active_alerts.insert(key, alert_state_id);
        return Ok(Some(alert_state_id));
    }

    if let Some(existing) = inner.active_alerts.get(&key).copied() {
        inner.store.clear_alert(existing)?;
        return Ok(Some(existing));
    }
    if let Some(alert) = inner.store.active_alert(record_id, alert_class, attribute)? {
        inner.store.clear_alert(alert.alert_state_id)?;
        return Ok(Some(alert.alert_state_id));
    }
    Ok(None)
}
