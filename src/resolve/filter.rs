//! Consistency filter over parameter rows.
use crate::catalog::InputLookup;
use crate::registry::{InputRef, MatchFilter};
use crate::session::{ParameterRow, RowValue};

/// Value a reference resolves to within `row`, if it resolves at all.
pub fn reference_value<'a>(
    reference: &InputRef,
    row: &'a ParameterRow,
    lookup: &'a dyn InputLookup,
) -> Option<&'a RowValue> {
    match reference {
        InputRef::Direct(name) => row.get(name),
        InputRef::Derived { parent, child } => {
            let identity = row.get(parent)?.as_single()?;
            lookup.recorded_input(identity, child)
        }
    }
}

fn row_passes(row: &ParameterRow, filter: &MatchFilter, lookup: &dyn InputLookup) -> bool {
    let mut values = filter
        .refs
        .iter()
        .map(|reference| reference_value(reference, row, lookup));
    let Some(Some(first)) = values.next() else {
        return false;
    };
    values.all(|value| value == Some(first))
}

/// Keep rows on which every filter's references agree, preserving order.
///
/// A row with a reference that cannot be resolved is dropped.
pub fn filter_matrix(
    rows: Vec<ParameterRow>,
    filters: &[MatchFilter],
    lookup: &dyn InputLookup,
) -> Vec<ParameterRow> {
    if filters.is_empty() {
        return rows;
    }
    let before = rows.len();
    let kept: Vec<ParameterRow> = rows
        .into_iter()
        .filter(|row| {
            filters
                .iter()
                .all(|filter| row_passes(row, filter, lookup))
        })
        .collect();
    tracing::debug!(before, after = kept.len(), "match filters applied");
    kept
}
