//! Selection grammar for `select` and `select-session` directives.
//!
//! Directives are tiny statements of the form `name` or `name(arg, ...)`.
//! [`parse_statement`] only checks the syntax; the typed constructors reject
//! unknown mode tokens and bad arguments so an invalid directive never makes
//! it into a registry.
use crate::error::ResolveError;
use std::fmt;

const DEFAULT_SELECT: &str = "foreach";
const DEFAULT_SELECT_SESSION: &str = "current";

/// Mode tokens accepted by `select`.
pub const SELECT_MODES: [&str; 5] = ["foreach", "one", "some", "all", "from"];
/// Mode tokens accepted by `select-session`.
pub const SELECT_SESSION_MODES: [&str; 5] =
    ["current", "prior", "prior-with", "first", "first-with"];

/// A syntactically valid directive: mode token plus trimmed arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub mode: String,
    pub args: Vec<String>,
}

/// Split `name(arg, ...)` into its mode and arguments.
pub fn parse_statement(text: &str) -> Result<Statement, ResolveError> {
    let text = text.trim();
    let malformed = || ResolveError::MalformedSelection {
        statement: text.to_string(),
    };
    match (text.find('('), text.find(')')) {
        (None, None) => Ok(Statement {
            mode: text.to_string(),
            args: Vec::new(),
        }),
        (Some(left), Some(right)) if left < right => {
            if !text[right + 1..].trim().is_empty() {
                return Err(malformed());
            }
            let inner = text[left + 1..right].trim();
            let args = if inner.is_empty() {
                Vec::new()
            } else {
                inner.split(',').map(|arg| arg.trim().to_string()).collect()
            };
            Ok(Statement {
                mode: text[..left].trim().to_string(),
                args,
            })
        }
        _ => Err(malformed()),
    }
}

/// How an input's candidates are selected into parameter rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionDirective {
    /// One row per candidate; with a group, aligned with another input's rows.
    Foreach { group: Option<String> },
    /// Only the first candidate.
    One,
    /// The first `count` candidates as one multi-valued entry.
    Some { count: usize },
    /// Every candidate as one multi-valued entry.
    All,
    /// Value read from the `child` recorded input of the `parent` input's artefact.
    From { parent: String, child: String },
}

impl SelectionDirective {
    /// Parse a `select` directive; a missing directive means `foreach`.
    pub fn parse(text: Option<&str>) -> Result<Self, ResolveError> {
        let text = text.unwrap_or(DEFAULT_SELECT);
        let statement = parse_statement(text)?;
        match statement.mode.as_str() {
            "foreach" => match statement.args.as_slice() {
                [] => Ok(SelectionDirective::Foreach { group: None }),
                [group] if !group.is_empty() => Ok(SelectionDirective::Foreach {
                    group: Some(group.clone()),
                }),
                _ => Err(invalid_argument(text, "foreach takes at most one input name")),
            },
            "one" => no_args(text, &statement).map(|()| SelectionDirective::One),
            "all" => no_args(text, &statement).map(|()| SelectionDirective::All),
            "some" => {
                let [count] = statement.args.as_slice() else {
                    return Err(invalid_argument(text, "some takes exactly one count"));
                };
                let count = count
                    .parse::<usize>()
                    .map_err(|_| invalid_argument(text, "some count must be a non-negative integer"))?;
                Ok(SelectionDirective::Some { count })
            }
            "from" => {
                let [reference] = statement.args.as_slice() else {
                    return Err(invalid_argument(text, "from takes exactly one parent/child reference"));
                };
                match reference.split_once('/') {
                    Some((parent, child))
                        if !parent.trim().is_empty()
                            && !child.trim().is_empty()
                            && !child.contains('/') =>
                    {
                        Ok(SelectionDirective::From {
                            parent: parent.trim().to_string(),
                            child: child.trim().to_string(),
                        })
                    }
                    _ => Err(invalid_argument(text, "from reference must be parent/child")),
                }
            }
            other => Err(ResolveError::UnsupportedMode {
                category: "select",
                mode: other.to_string(),
            }),
        }
    }

    /// Canonical mode token.
    pub fn mode(&self) -> &'static str {
        match self {
            SelectionDirective::Foreach { .. } => "foreach",
            SelectionDirective::One => "one",
            SelectionDirective::Some { .. } => "some",
            SelectionDirective::All => "all",
            SelectionDirective::From { .. } => "from",
        }
    }

    /// Name of the input this directive depends on, if it is a dependent.
    pub fn governing_input(&self) -> Option<&str> {
        match self {
            SelectionDirective::Foreach { group: Some(group) } => Some(group),
            SelectionDirective::From { parent, .. } => Some(parent),
            _ => None,
        }
    }
}

impl fmt::Display for SelectionDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionDirective::Foreach { group: None } => write!(f, "foreach"),
            SelectionDirective::Foreach { group: Some(group) } => write!(f, "foreach({group})"),
            SelectionDirective::One => write!(f, "one"),
            SelectionDirective::Some { count } => write!(f, "some({count})"),
            SelectionDirective::All => write!(f, "all"),
            SelectionDirective::From { parent, child } => write!(f, "from({parent}/{child})"),
        }
    }
}

/// How many sessions back an input may reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionDepth {
    Bounded(usize),
    Unbounded,
}

/// Which session of the subject governs an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSelection {
    Current,
    Prior { delta: usize },
    PriorWith { delta: usize },
    First,
    FirstWith,
}

impl SessionSelection {
    /// Parse a `select-session` directive; a missing directive means `current`.
    pub fn parse(text: Option<&str>) -> Result<Self, ResolveError> {
        let text = text.unwrap_or(DEFAULT_SELECT_SESSION);
        let statement = parse_statement(text)?;
        match statement.mode.as_str() {
            "current" => no_args(text, &statement).map(|()| SessionSelection::Current),
            "first" => no_args(text, &statement).map(|()| SessionSelection::First),
            "first-with" => no_args(text, &statement).map(|()| SessionSelection::FirstWith),
            mode @ ("prior" | "prior-with") => {
                let [delta] = statement.args.as_slice() else {
                    return Err(invalid_argument(text, "prior takes exactly one session delta"));
                };
                let delta = delta
                    .parse::<usize>()
                    .map_err(|_| invalid_argument(text, "session delta must be a non-negative integer"))?;
                if mode == "prior" {
                    Ok(SessionSelection::Prior { delta })
                } else {
                    Ok(SessionSelection::PriorWith { delta })
                }
            }
            other => Err(ResolveError::UnsupportedMode {
                category: "select-session",
                mode: other.to_string(),
            }),
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            SessionSelection::Current => "current",
            SessionSelection::Prior { .. } => "prior",
            SessionSelection::PriorWith { .. } => "prior-with",
            SessionSelection::First => "first",
            SessionSelection::FirstWith => "first-with",
        }
    }

    pub fn depth(&self) -> SessionDepth {
        match self {
            SessionSelection::Current => SessionDepth::Bounded(0),
            SessionSelection::Prior { delta } | SessionSelection::PriorWith { delta } => {
                SessionDepth::Bounded(*delta)
            }
            SessionSelection::First | SessionSelection::FirstWith => SessionDepth::Unbounded,
        }
    }
}

impl fmt::Display for SessionSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionSelection::Prior { delta } | SessionSelection::PriorWith { delta } => {
                write!(f, "{}({delta})", self.mode())
            }
            _ => write!(f, "{}", self.mode()),
        }
    }
}

fn no_args(text: &str, statement: &Statement) -> Result<(), ResolveError> {
    if statement.args.is_empty() {
        Ok(())
    } else {
        Err(invalid_argument(
            text,
            &format!("{} takes no arguments", statement.mode),
        ))
    }
}

fn invalid_argument(text: &str, reason: &str) -> ResolveError {
    ResolveError::InvalidArgument {
        statement: text.trim().to_string(),
        reason: reason.to_string(),
    }
}
