//! Selection state and summary-list reconciliation.
//!
//! The selection is the summary id the user is currently working against.
//! Writers have different strength:
//!
//! | Source | Effect |
//! |--------|--------|
//! | [`SelectionSource::Summarized`] | always overwrites |
//! | [`SelectionSource::User`] | always overwrites |
//! | [`SelectionSource::Refresh`] | only fills an empty selection |
//!
//! A background refresh therefore can never clobber a freshly produced or
//! explicitly chosen summary.

use std::sync::Arc;

use crate::cell::IdentifierCell;
use crate::models::{SummaryId, SummaryRecord};

/// Hint shown when there are no summaries to choose from.
pub const EMPTY_STATE_HINT: &str = "No summaries yet. Upload a document to create one first.";

/// Who is changing the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSource {
    /// A summarize stage just produced this id.
    Summarized,
    /// The user picked this id from the list.
    User,
    /// A background list refresh proposes this id.
    Refresh,
}

/// The active summary id, backed by a shared [`IdentifierCell`].
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    cell: Arc<IdentifierCell<SummaryId>>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The underlying cell, for continuations that need a live read.
    pub fn cell(&self) -> &Arc<IdentifierCell<SummaryId>> {
        &self.cell
    }

    pub fn current(&self) -> Option<SummaryId> {
        self.cell.get()
    }

    /// Apply a selection change; returns whether the selection now holds `id`
    /// because of this call.
    pub fn select(&self, id: SummaryId, source: SelectionSource) -> bool {
        match source {
            SelectionSource::Summarized | SelectionSource::User => {
                self.cell.set(id);
                true
            }
            SelectionSource::Refresh => self.cell.set_if_empty(id),
        }
    }

    pub fn clear(&self) {
        self.cell.clear();
    }
}

/// Whether a reconciliation may fill an empty selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPolicy {
    FillIfUnset,
    Never,
}

/// A reconciled summary list, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryListing {
    pub records: Vec<SummaryRecord>,
    pub selected: Option<SummaryId>,
}

impl SummaryListing {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn newest(&self) -> Option<&SummaryRecord> {
        self.records.first()
    }

    pub fn is_selected(&self, record: &SummaryRecord) -> bool {
        self.selected == Some(record.id)
    }

    /// Message for the empty state, if the listing is empty.
    pub fn empty_hint(&self) -> Option<&'static str> {
        self.is_empty().then_some(EMPTY_STATE_HINT)
    }
}

/// Reconciles freshly fetched summaries with a [`SelectionState`].
pub struct SelectionSynchronizer;

impl SelectionSynchronizer {
    /// Sort newest first by `generated_at`. Records generated at the same
    /// instant order by descending id so the result is deterministic.
    pub fn sort_newest_first(records: &mut [SummaryRecord]) {
        records.sort_by(|a, b| {
            b.generated_at
                .cmp(&a.generated_at)
                .then_with(|| b.id.cmp(&a.id))
        });
    }

    /// Sort `records` and, under [`FillPolicy::FillIfUnset`], select the
    /// newest one when nothing is selected yet. An existing selection is
    /// never changed.
    pub fn reconcile(
        mut records: Vec<SummaryRecord>,
        selection: &SelectionState,
        policy: FillPolicy,
    ) -> SummaryListing {
        Self::sort_newest_first(&mut records);
        if policy == FillPolicy::FillIfUnset {
            if let Some(newest) = records.first() {
                selection.select(newest.id, SelectionSource::Refresh);
            }
        }
        SummaryListing {
            records,
            selected: selection.current(),
        }
    }
}
