//! Disjoint write windows in a concatenated global array, from two collectives.

use anyhow::{anyhow, Context};
use log::{debug, error, info};

use super::CollectiveChannel;

/// Where one rank's contribution lands in the shared output
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalWriteWindow {
    pub offset: usize,
    pub len: usize,
    /// length of the concatenated array over all ranks
    pub global_total: usize,
}

impl GlobalWriteWindow {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    pub fn overlaps(&self, other: &GlobalWriteWindow) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

/// Collective: every rank of `channel` must call this exactly once per logical write.
///
/// Returns this rank's `[offset, offset + local_count)` window; offsets follow rank order.
pub fn compute_window<C: CollectiveChannel>(
    local_count: usize,
    channel: &C,
) -> anyhow::Result<GlobalWriteWindow> {
    debug!(
        "Computing write window for {} local entries on rank {} of {}",
        local_count,
        channel.rank(),
        channel.size()
    );
    let local = i64::try_from(local_count).context("local count does not fit in i64")?;

    let global_total = channel
        .sum_reduce(local)
        .context("sum reduction of local counts failed")?;
    let offset = channel
        .exclusive_scan(local)
        .context("exclusive scan of local counts failed")?;
    debug!("Reduced total: {}, scanned offset: {}", global_total, offset);

    let past_total = offset
        .checked_add(local)
        .map_or(true, |end| end > global_total);
    if offset < 0 || global_total < 0 || past_total {
        let err = anyhow!(
            "inconsistent collective results: offset {} + {} exceeds total {}",
            offset,
            local,
            global_total
        );
        error!("{}", err);
        return Err(err);
    }

    let window = GlobalWriteWindow {
        offset: offset.try_into()?,
        len: local_count,
        global_total: global_total.try_into()?,
    };
    info!("Write window: {:?}", window);
    Ok(window)
}
