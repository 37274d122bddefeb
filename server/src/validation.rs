use std::collections::BTreeSet;

/// A declarative validation rule for component type `C`
pub trait Rule<C>: Send + Sync {
    fn check(&self, component: &C, report: &mut ValidationReport);
}

pub(crate) struct PredicateRule<C> {
    member: &'static str,
    message: String,
    check: fn(&C) -> bool,
}

impl<C> PredicateRule<C> {
    pub(crate) fn new(member: &'static str, message: impl Into<String>, check: fn(&C) -> bool) -> Self {
        Self {
            member,
            message: message.into(),
            check,
        }
    }
}

impl<C> Rule<C> for PredicateRule<C> {
    fn check(&self, component: &C, report: &mut ValidationReport) {
        if !(self.check)(component) {
            report.error(self.member, self.message.clone());
        }
    }
}

/// A single failure as reported by a rule. Composite failures group the
/// results of validating nested values (list items, child objects).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationFailure {
    pub members: Vec<String>,
    pub message: String,
    pub nested: Vec<ValidationFailure>,
}

/// Collects failures while rules run
#[derive(Debug, Default)]
pub struct ValidationReport {
    failures: Vec<ValidationFailure>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, member: impl Into<String>, message: impl Into<String>) {
        self.failures.push(ValidationFailure {
            members: vec![member.into()],
            message: message.into(),
            nested: Vec::new(),
        });
    }

    /// Records the failures of a nested value under one composite failure.
    /// Nested members are full paths such as `items[0].name`.
    pub fn composite(
        &mut self,
        member: impl Into<String>,
        message: impl Into<String>,
        nested: ValidationReport,
    ) {
        if nested.failures.is_empty() {
            return;
        }
        self.failures.push(ValidationFailure {
            members: vec![member.into()],
            message: message.into(),
            nested: nested.failures,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Flattens composites and keeps failures on touched members
    pub(crate) fn into_outcome(
        self,
        touched: &BTreeSet<String>,
        model_touched: bool,
    ) -> ValidationOutcome {
        let mut flat = Vec::new();
        flatten(self.failures, &mut flat);

        let errors = flat
            .into_iter()
            .filter(|failure| {
                model_touched
                    || failure
                        .members
                        .iter()
                        .any(|member| is_touched(member, touched))
            })
            .flat_map(|failure| {
                let message = failure.message;
                let members = if failure.members.is_empty() {
                    vec![String::new()]
                } else {
                    failure.members
                };
                members.into_iter().map(move |member| ValidationError {
                    member,
                    message: message.clone(),
                })
            })
            .collect();
        ValidationOutcome { errors }
    }
}

fn flatten(failures: Vec<ValidationFailure>, out: &mut Vec<ValidationFailure>) {
    for failure in failures {
        if failure.nested.is_empty() {
            out.push(failure);
        } else {
            flatten(failure.nested, out);
        }
    }
}

/// Touched exactly, through its root property, or through a touched child
fn is_touched(member: &str, touched: &BTreeSet<String>) -> bool {
    let root_end = member.find(['.', '[']).unwrap_or(member.len());
    touched.contains(member)
        || touched.contains(&member[..root_end])
        || touched.iter().any(|path| {
            path.strip_prefix(member)
                .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('['))
        })
}

/// One failure surfaced to the view
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
    pub member: String,
    pub message: String,
}

/// Result of validating a component
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub errors: Vec<ValidationError>,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors_for<'a>(&'a self, member: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.errors
            .iter()
            .filter(move |error| error.member == member)
            .map(|error| error.message.as_str())
    }
}
