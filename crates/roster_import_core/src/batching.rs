use crate::contract::{BatchAssignment, NormalizedImportRequest, ValidationError};

pub fn compute_batch_plan(
    request: &NormalizedImportRequest,
) -> Result<Vec<BatchAssignment>, ValidationError> {
    let total_rows = request.total_rows;
    let batch_count = match (request.batch_count, request.batch_size) {
        (Some(count), _) => count.min(total_rows),
        (None, Some(size)) => total_rows.div_ceil(size),
        (None, None) => {
            return Err(ValidationError::new(
                "Either batch_count or batch_size is required",
            ));
        }
    };

    if batch_count == 0 {
        return Err(ValidationError::new("No batches to dispatch"));
    }

    if batch_count > request.max_batches {
        return Err(ValidationError::new(format!(
            "Computed batch count {batch_count} exceeds max_batches={}",
            request.max_batches
        )));
    }

    let base_size = total_rows / batch_count;
    let remainder = total_rows % batch_count;

    let mut assignments = Vec::with_capacity(batch_count);
    let mut cursor = 0usize;

    for batch_id in 0..batch_count {
        let current_size = base_size + usize::from(batch_id < remainder);
        let start_index = cursor;
        let end_index_exclusive = cursor + current_size;
        assignments.push(BatchAssignment {
            batch_id,
            start_index,
            end_index_exclusive,
        });
        cursor = end_index_exclusive;
    }

    validate_assignments(total_rows, &assignments)?;
    Ok(assignments)
}

fn validate_assignments(
    total_rows: usize,
    assignments: &[BatchAssignment],
) -> Result<(), ValidationError> {
    if assignments.is_empty() {
        return Err(ValidationError::new("No batches to dispatch"));
    }

    if assignments[0].start_index != 0
        || assignments[assignments.len() - 1].end_index_exclusive != total_rows
    {
        return Err(ValidationError::new(
            "Batch boundaries do not cover the full roster",
        ));
    }

    for idx in 1..assignments.len() {
        if assignments[idx - 1].end_index_exclusive != assignments[idx].start_index {
            return Err(ValidationError::new(
                "Batch boundaries overlap or leave gaps",
            ));
        }
    }

    Ok(())
}
