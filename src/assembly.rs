use tracing::{debug, info};

use crate::error::{Result, SosError};
use crate::model::{ResultEntry, TemporalPredicate};
use crate::store::ObservationStore;
use crate::temporal::apply_predicates;

/// Builds the `GetResult` payload: every listed result, narrowed by the
/// temporal predicates, each block followed by a newline.
///
/// A result stored as a reference has no datablock to slice, which aborts the
/// whole request, as does an id the store does not know.
pub fn compute_result_values<S>(
    store: &S,
    result_ids: &[String],
    predicates: &[TemporalPredicate],
) -> Result<String>
where
    S: ObservationStore + ?Sized,
{
    let mut payload = String::new();

    for id in result_ids {
        let record = store
            .get_result(id)
            .ok_or_else(|| SosError::UnknownResult(id.clone()))?;

        let array = match &record.result {
            ResultEntry::Array(array) => array,
            ResultEntry::Reference(href) => {
                return Err(SosError::InvalidResult {
                    id: id.clone(),
                    reason: format!("result is a reference to '{}', not a data array", href),
                });
            }
        };

        let values = apply_predicates(
            &array.values,
            &array.encoding,
            &record.sampling_time,
            predicates,
        );
        debug!("Result {}: {} of {} bytes kept", id, values.len(), array.values.len());

        payload.push_str(&values);
        payload.push('\n');
    }

    info!(
        "Assembled {} results with {} temporal filters",
        result_ids.len(),
        predicates.len()
    );
    Ok(payload)
}
