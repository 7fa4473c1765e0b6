//! Parameter matrix generation.
//!
//! Each iteration source becomes one dimension. A dimension has one column for
//! the source plus one column per dependent attached to it, and its entries are
//! the row-aligned fragments of those columns. The matrix is the cartesian
//! product of all dimensions in source registration order, so the first source
//! varies slowest.
use super::mapper::CandidateMap;
use crate::catalog::InputLookup;
use crate::config::ResolutionPolicy;
use crate::error::ResolveError;
use crate::registry::{Dependency, InputSpec, Registry};
use crate::selection::SelectionDirective;
use crate::session::{ParameterRow, RowValue};
use std::collections::BTreeSet;

struct Dimension {
    columns: Vec<String>,
    entries: Vec<Vec<RowValue>>,
}

/// Expand candidates into every valid parameter row.
///
/// Returns an empty matrix when a required input has no candidate; that means
/// "not ready yet", not failure.
pub fn generate_parameter_matrix(
    registry: &Registry,
    candidates: &CandidateMap,
    lookup: &dyn InputLookup,
    policy: &ResolutionPolicy,
) -> Result<Vec<ParameterRow>, ResolveError> {
    if let Some(missing) = registry
        .inputs()
        .iter()
        .find(|input| input.required && candidates_of(candidates, &input.name).is_empty())
    {
        tracing::info!(input = %missing.name, "required input has no candidates; no rows");
        return Ok(Vec::new());
    }

    let mut dimensions = Vec::new();
    for input in registry
        .iteration_sources()
        .iter()
        .filter_map(|name| registry.input(name))
    {
        let fragments = source_fragments(input, candidates_of(candidates, &input.name));
        let mut columns = vec![input.name.clone()];
        let mut values = vec![fragments];
        let mut unresolved = BTreeSet::new();
        for dependent in registry.dependents_of(&input.name) {
            let column = match &dependent.dependency {
                Dependency::Grouped => {
                    let own = candidates_of(candidates, &dependent.input);
                    if own.is_empty() {
                        vec![RowValue::Absent]
                    } else {
                        own.iter().cloned().map(RowValue::Single).collect()
                    }
                }
                Dependency::Derived { child } => {
                    derived_column(&values[0], child, lookup, &mut unresolved)
                }
            };
            columns.push(dependent.input.clone());
            values.push(column);
        }
        let mut dimension = align(columns, values, policy)?;
        if !unresolved.is_empty() {
            dimension.entries = dimension
                .entries
                .into_iter()
                .enumerate()
                .filter(|(position, _)| !unresolved.contains(position))
                .map(|(_, entry)| entry)
                .collect();
        }
        dimensions.push(dimension);
    }

    let mut rows = vec![ParameterRow::new()];
    for dimension in &dimensions {
        let mut expanded = Vec::with_capacity(rows.len() * dimension.entries.len());
        for row in &rows {
            for entry in &dimension.entries {
                let mut combined = row.clone();
                for (column, value) in dimension.columns.iter().zip(entry) {
                    combined.insert(column.clone(), value.clone());
                }
                expanded.push(combined);
            }
        }
        rows = expanded;
    }

    tracing::debug!(
        dimensions = dimensions.len(),
        rows = rows.len(),
        "parameter matrix generated"
    );
    Ok(rows)
}

fn candidates_of<'a>(candidates: &'a CandidateMap, name: &str) -> &'a [String] {
    candidates.get(name).map(Vec::as_slice).unwrap_or_default()
}

fn source_fragments(input: &InputSpec, candidates: &[String]) -> Vec<RowValue> {
    if candidates.is_empty() {
        return vec![RowValue::Absent];
    }
    match &input.select {
        SelectionDirective::All => vec![RowValue::Multiple(candidates.to_vec())],
        SelectionDirective::Some { count } => {
            let take = (*count).min(candidates.len());
            vec![RowValue::Multiple(candidates[..take].to_vec())]
        }
        SelectionDirective::One => vec![RowValue::Single(candidates[0].clone())],
        SelectionDirective::Foreach { .. } | SelectionDirective::From { .. } => candidates
            .iter()
            .cloned()
            .map(RowValue::Single)
            .collect(),
    }
}

/// The `child` recorded input of each source fragment, position for position.
///
/// A fragment whose lookup fails keeps a placeholder so later positions stay
/// paired with their own parent; its position is added to `unresolved` and the
/// whole entry is dropped after alignment.
fn derived_column(
    source_values: &[RowValue],
    child: &str,
    lookup: &dyn InputLookup,
    unresolved: &mut BTreeSet<usize>,
) -> Vec<RowValue> {
    let mut column = Vec::with_capacity(source_values.len());
    for (position, value) in source_values.iter().enumerate() {
        let Some(identity) = value.as_single() else {
            column.push(RowValue::Absent);
            continue;
        };
        match lookup.recorded_input(identity, child) {
            Some(derived) => column.push(derived.clone()),
            None => {
                tracing::warn!(
                    artefact = %identity,
                    field = %child,
                    "recorded input unavailable; candidate dropped"
                );
                unresolved.insert(position);
                column.push(RowValue::Absent);
            }
        }
    }
    column
}

fn align(
    columns: Vec<String>,
    values: Vec<Vec<RowValue>>,
    policy: &ResolutionPolicy,
) -> Result<Dimension, ResolveError> {
    let lengths: Vec<usize> = values.iter().map(Vec::len).collect();
    let shortest = lengths.iter().copied().min().unwrap_or(0);
    if lengths.iter().any(|&length| length != shortest) {
        if !policy.truncate_to_shortest {
            return Err(ResolveError::MisalignedColumns {
                source_input: columns[0].clone(),
                lengths,
            });
        }
        tracing::warn!(
            source_input = %columns[0],
            ?lengths,
            shortest,
            "columns have unequal lengths; truncating to shortest"
        );
    }
    let entries = (0..shortest)
        .map(|row| values.iter().map(|column| column[row].clone()).collect())
        .collect();
    Ok(Dimension { columns, entries })
}
