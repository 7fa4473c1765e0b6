//! Input registry built from a processor document.
//!
//! The registry is immutable once built. It records every input in
//! declaration order (scans first, then assessors) and classifies each one as
//! either an iteration source or a dependent. The classification is returned
//! as plain data that the matrix stage consumes.
use crate::document::{ProcessorDocument, ResourceEntry, ResourceKind};
use crate::error::ResolveError;
use crate::selection::{SelectionDirective, SessionDepth, SessionSelection};
use crate::session::ArtefactKind;
use crate::util::build_globset;
use globset::GlobSet;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A resource an input needs from its artefact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSpec {
    pub resource: String,
    pub varname: Option<String>,
    pub required: bool,
    pub fmatch: Option<String>,
    pub filepath: Option<String>,
    pub fdest: String,
    pub ftype: ResourceKind,
}

impl From<&ResourceEntry> for ResourceSpec {
    fn from(entry: &ResourceEntry) -> Self {
        ResourceSpec {
            resource: entry.resource.trim().to_string(),
            varname: entry
                .varname
                .as_deref()
                .map(str::trim)
                .filter(|varname| !varname.is_empty())
                .map(str::to_string),
            required: entry.required,
            fmatch: entry.fmatch.clone(),
            filepath: entry.filepath.clone(),
            fdest: entry.fdest.clone(),
            ftype: entry.ftype,
        }
    }
}

/// One declared input.
#[derive(Debug, Clone)]
pub struct InputSpec {
    pub name: String,
    pub kind: ArtefactKind,
    /// Type expressions as written: globs for scans, literal types for assessors.
    pub types: Vec<String>,
    pub select: SelectionDirective,
    pub select_session: SessionSelection,
    pub resources: Vec<ResourceSpec>,
    pub needs_qc: bool,
    /// True when any resource is required.
    pub required: bool,
    patterns: GlobSet,
}

impl InputSpec {
    fn build(draft: InputDraft<'_>) -> Result<Self, ResolveError> {
        let types: Vec<String> = draft
            .types
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect();
        let select = SelectionDirective::parse(draft.select)?;
        let select_session = SessionSelection::parse(draft.select_session)?;
        let patterns = match draft.kind {
            ArtefactKind::Scan => build_globset(&types)?,
            ArtefactKind::Assessor => GlobSet::empty(),
        };
        let resources: Vec<ResourceSpec> = draft.resources.iter().map(ResourceSpec::from).collect();
        let required = resources.iter().any(|resource| resource.required);
        Ok(InputSpec {
            name: draft.name.trim().to_string(),
            kind: draft.kind,
            types,
            select,
            select_session,
            resources,
            needs_qc: draft.needs_qc,
            required,
            patterns,
        })
    }

    /// Whether an artefact of `artefact_type` is a candidate for this input.
    ///
    /// Scan types match when any declared glob fits; assessor types must equal
    /// one of the declared types exactly.
    pub fn matches_type(&self, artefact_type: &str) -> bool {
        match self.kind {
            ArtefactKind::Scan => self.patterns.is_match(artefact_type),
            ArtefactKind::Assessor => self.types.iter().any(|value| value == artefact_type),
        }
    }

    pub fn resource_for_variable(&self, varname: &str) -> Option<&ResourceSpec> {
        self.resources
            .iter()
            .find(|resource| resource.varname.as_deref() == Some(varname))
    }
}

struct InputDraft<'a> {
    name: &'a str,
    kind: ArtefactKind,
    types: &'a str,
    select: Option<&'a str>,
    select_session: Option<&'a str>,
    needs_qc: bool,
    resources: &'a [ResourceEntry],
}

/// How a dependent takes its values from its governing source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependency {
    /// `foreach(source)`: own candidates aligned row-by-row with the source.
    Grouped,
    /// `from(source/child)`: the `child` recorded input of each source candidate.
    Derived { child: String },
}

/// An input whose values follow an iteration source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependent {
    pub input: String,
    pub source: String,
    pub dependency: Dependency,
}

/// One operand of a match filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputRef {
    Direct(String),
    Derived { parent: String, child: String },
}

impl InputRef {
    /// Parse `input` or `input/field`; the error is the reason for rejection.
    pub fn parse(text: &str) -> Result<Self, &'static str> {
        let text = text.trim();
        match text.split_once('/') {
            None if text.is_empty() => Err("empty reference"),
            None => Ok(InputRef::Direct(text.to_string())),
            Some((parent, child))
                if parent.trim().is_empty() || child.trim().is_empty() || child.contains('/') =>
            {
                Err("reference must be input or input/field")
            }
            Some((parent, child)) => Ok(InputRef::Derived {
                parent: parent.trim().to_string(),
                child: child.trim().to_string(),
            }),
        }
    }

    /// The declared input this reference starts from.
    pub fn input(&self) -> &str {
        match self {
            InputRef::Direct(name) => name,
            InputRef::Derived { parent, .. } => parent,
        }
    }
}

impl fmt::Display for InputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputRef::Direct(name) => write!(f, "{name}"),
            InputRef::Derived { parent, child } => write!(f, "{parent}/{child}"),
        }
    }
}

/// References that must resolve to equal values within a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchFilter {
    pub refs: Vec<InputRef>,
}

/// Where a command variable reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableBinding {
    pub input: String,
    pub resource: String,
}

/// Immutable registry of declared inputs and their classification.
#[derive(Debug, Clone)]
pub struct Registry {
    inputs: Vec<InputSpec>,
    iteration_sources: Vec<String>,
    dependents: Vec<Dependent>,
    match_filters: Vec<MatchFilter>,
    variables: BTreeMap<String, VariableBinding>,
    prior_session_depth: SessionDepth,
}

impl Registry {
    pub fn from_document(document: &ProcessorDocument) -> Result<Self, ResolveError> {
        let xnat = &document.inputs.xnat;
        let scan_drafts = xnat.scans.iter().map(|scan| InputDraft {
            name: &scan.name,
            kind: ArtefactKind::Scan,
            types: &scan.types,
            select: scan.select.as_deref(),
            select_session: scan.select_session.as_deref(),
            needs_qc: scan.needs_qc,
            resources: &scan.resources,
        });
        let assessor_drafts = xnat.assessors.iter().map(|assessor| InputDraft {
            name: &assessor.name,
            kind: ArtefactKind::Assessor,
            types: &assessor.proctypes,
            select: assessor.select.as_deref(),
            select_session: assessor.select_session.as_deref(),
            needs_qc: assessor.needs_qc,
            resources: &assessor.resources,
        });

        let mut inputs = Vec::new();
        let mut names = BTreeSet::new();
        for draft in scan_drafts.chain(assessor_drafts) {
            let spec = InputSpec::build(draft)?;
            if !names.insert(spec.name.clone()) {
                return Err(ResolveError::DuplicateInput { name: spec.name });
            }
            inputs.push(spec);
        }

        let (iteration_sources, dependents) = classify(&inputs)?;

        let mut match_filters = Vec::new();
        for (position, filter) in xnat.filters.iter().enumerate() {
            if filter.filter_type != "match" {
                tracing::error!(
                    filter_type = %filter.filter_type,
                    position,
                    "invalid filter type; filter skipped"
                );
                continue;
            }
            let label = format!("filters[{position}]");
            let refs = filter
                .inputs
                .split(',')
                .filter(|text| !text.trim().is_empty())
                .map(|text| {
                    InputRef::parse(text).map_err(|reason| ResolveError::InvalidReference {
                        input: label.clone(),
                        reference: text.trim().to_string(),
                        reason,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            if refs.len() < 2 {
                return Err(ResolveError::InvalidReference {
                    input: label,
                    reference: filter.inputs.clone(),
                    reason: "match filter needs at least two inputs",
                });
            }
            if let Some(unknown) = refs.iter().find(|reference| !names.contains(reference.input())) {
                return Err(ResolveError::InvalidReference {
                    input: label,
                    reference: unknown.to_string(),
                    reason: "no such input",
                });
            }
            match_filters.push(MatchFilter { refs });
        }

        let mut variables = BTreeMap::new();
        for input in &inputs {
            for resource in &input.resources {
                if let Some(varname) = resource.varname.as_ref() {
                    variables.insert(
                        varname.clone(),
                        VariableBinding {
                            input: input.name.clone(),
                            resource: resource.resource.clone(),
                        },
                    );
                }
            }
        }

        let prior_session_depth = inputs
            .iter()
            .map(|input| input.select_session.depth())
            .max()
            .unwrap_or(SessionDepth::Bounded(0));

        tracing::debug!(
            inputs = inputs.len(),
            sources = iteration_sources.len(),
            dependents = dependents.len(),
            filters = match_filters.len(),
            "input registry built"
        );

        Ok(Registry {
            inputs,
            iteration_sources,
            dependents,
            match_filters,
            variables,
            prior_session_depth,
        })
    }

    /// Inputs in declaration order.
    pub fn inputs(&self) -> &[InputSpec] {
        &self.inputs
    }

    pub fn input(&self, name: &str) -> Option<&InputSpec> {
        self.inputs.iter().find(|input| input.name == name)
    }

    /// Names of inputs that drive one dimension each, in declaration order.
    pub fn iteration_sources(&self) -> &[String] {
        &self.iteration_sources
    }

    /// Dependents in declaration order.
    pub fn dependents(&self) -> &[Dependent] {
        &self.dependents
    }

    pub fn dependents_of<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a Dependent> {
        self.dependents
            .iter()
            .filter(move |dependent| dependent.source == source)
    }

    pub fn match_filters(&self) -> &[MatchFilter] {
        &self.match_filters
    }

    pub fn variables(&self) -> &BTreeMap<String, VariableBinding> {
        &self.variables
    }

    /// How many sessions back the caller must supply.
    pub fn prior_session_depth(&self) -> SessionDepth {
        self.prior_session_depth
    }
}

fn classify(inputs: &[InputSpec]) -> Result<(Vec<String>, Vec<Dependent>), ResolveError> {
    let by_name: BTreeMap<&str, &InputSpec> = inputs
        .iter()
        .map(|input| (input.name.as_str(), input))
        .collect();
    let mut sources = Vec::new();
    let mut dependents = Vec::new();
    for input in inputs {
        let (source, dependency, reference) = match &input.select {
            SelectionDirective::Foreach { group: Some(group) } => {
                (group.as_str(), Dependency::Grouped, group.clone())
            }
            SelectionDirective::From { parent, child } => (
                parent.as_str(),
                Dependency::Derived {
                    child: child.clone(),
                },
                format!("{parent}/{child}"),
            ),
            _ => {
                sources.push(input.name.clone());
                continue;
            }
        };
        let invalid = |reason: &'static str| ResolveError::InvalidReference {
            input: input.name.clone(),
            reference: reference.clone(),
            reason,
        };
        if source == input.name {
            return Err(invalid("an input cannot depend on itself"));
        }
        let Some(governing) = by_name.get(source) else {
            return Err(invalid("no such input"));
        };
        match governing.select {
            SelectionDirective::Foreach { group: None } | SelectionDirective::One => {}
            SelectionDirective::Foreach { group: Some(_) } | SelectionDirective::From { .. } => {
                return Err(invalid("governing input is itself a dependent"));
            }
            SelectionDirective::Some { .. } | SelectionDirective::All => {
                return Err(invalid("governing input must select foreach or one"));
            }
        }
        dependents.push(Dependent {
            input: input.name.clone(),
            source: source.to_string(),
            dependency,
        });
    }
    Ok((sources, dependents))
}
