//! Separates owned entities from ghosts in a rank local, ascending index array.
//! Owned entities always carry the lowest local indices, so the cut is a single
//! lower bound search.

use log::{debug, error, trace};

use super::PartitionError;

/// Number of leading entries of `sorted_indices` that are strictly less than
/// `local_owned_count`. An entry equal to `local_owned_count` is a ghost.
///
/// The input is assumed ascending with owned entries first; see
/// [`check_owned_before_ghost`] for the validating counterpart.
pub fn split_owned(sorted_indices: &[usize], local_owned_count: usize) -> usize {
    let count = sorted_indices.partition_point(|&idx| idx < local_owned_count);
    trace!(
        "{} of {} entities are owned (local owned count {})",
        count,
        sorted_indices.len(),
        local_owned_count
    );
    count
}

/// Verify that `indices` is strictly ascending and that no owned entry follows a ghost
pub fn check_owned_before_ghost(
    indices: &[usize],
    local_owned_count: usize,
) -> Result<(), PartitionError> {
    if let Some(pos) = indices.windows(2).position(|w| w[0] >= w[1]) {
        let err = PartitionError::PreconditionViolation(format!(
            "entity indices not strictly ascending at position {}: {} then {}",
            pos,
            indices[pos],
            indices[pos + 1]
        ));
        error!("{}", err);
        return Err(err);
    }

    if let Some(first_ghost) = indices.iter().position(|&idx| idx >= local_owned_count) {
        if let Some(late) = indices[first_ghost..]
            .iter()
            .find(|&&idx| idx < local_owned_count)
        {
            let err = PartitionError::PreconditionViolation(format!(
                "owned entity {} found after ghost entity {}",
                late, indices[first_ghost]
            ));
            error!("{}", err);
            return Err(err);
        }
    }

    Ok(())
}

/// Cut `entities` and the co-indexed `values` down to their owned prefix.
///
/// With `validate` set the ordering preconditions are checked first and a violation is
/// reported instead of producing a wrong cut.
pub fn owned_slices<'a, V>(
    entities: &'a [usize],
    values: &'a [V],
    local_owned_count: usize,
    validate: bool,
) -> Result<(&'a [usize], &'a [V]), PartitionError> {
    if entities.len() != values.len() {
        let err = PartitionError::InvalidArgument(format!(
            "{} entities but {} values",
            entities.len(),
            values.len()
        ));
        error!("{}", err);
        return Err(err);
    }

    if validate {
        debug!("Validating {} local entity indices", entities.len());
        check_owned_before_ghost(entities, local_owned_count)?;
    }

    let count = split_owned(entities, local_owned_count);
    Ok((&entities[..count], &values[..count]))
}
