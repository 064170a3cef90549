//! History cursor: the `modified_after` low-water-mark for reconciliation.

use crate::push::RawPush;

/// Timestamp of the newest push the session has observed.
///
/// `0.0` means "fetch everything". Reconciliation only ever moves the cursor
/// forward; [`HistoryCursor::seed`] is the single place it may be reset, and is
/// only called right after a (re)connect.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct HistoryCursor(f64);

impl HistoryCursor {
    /// A cursor that fetches the full history.
    pub const ZERO: HistoryCursor = HistoryCursor(0.0);

    /// Current value, for the `modified_after` query parameter.
    pub fn value(self) -> f64 {
        self.0
    }

    /// Re-initialize from a seed fetch (`limit = 1`).
    ///
    /// An empty or failed seed resets the cursor to zero.
    pub fn seed(&mut self, newest: Option<&RawPush>) {
        self.0 = newest.and_then(RawPush::modified).unwrap_or(0.0);
    }

    /// Advance past a fully processed batch.
    ///
    /// Uses the newest `modified` value in the batch (the first record when the
    /// service returns newest-first). Empty batches and older values leave the
    /// cursor untouched. Returns whether the cursor moved.
    pub fn advance(&mut self, batch: &[RawPush]) -> bool {
        let newest = batch
            .iter()
            .filter_map(RawPush::modified)
            .fold(None, |acc: Option<f64>, m| Some(acc.map_or(m, |a| a.max(m))));

        match newest {
            Some(m) if m > self.0 => {
                self.0 = m;
                true
            }
            _ => false,
        }
    }
}
