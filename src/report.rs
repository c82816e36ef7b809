// SPDX-License-Identifier: MPL-2.0

//! Build a report as clear as possible as to why
//! dependency solving failed.

use crate::internal::{Arena, Cause, IncompId, Incompatibility};
use crate::{Map, Set};

/// Default reporter able to generate an explanation as a [String].
///
/// The derivation of the failure is a DAG: incompatibilities referenced
/// more than once are explained once, numbered, and referred to by number afterwards.
pub(crate) struct Report<'a> {
    store: &'a Arena<Incompatibility>,
    /// Derived incompatibilities with more than one parent in the walked DAG.
    shared: Set<IncompId>,
    /// Number of explanations already with a line reference.
    ref_count: usize,
    /// Shared nodes that have already been marked with a line reference.
    shared_with_ref: Map<IncompId, usize>,
    /// Accumulated lines of the report already generated.
    lines: Vec<String>,
}

impl<'a> Report<'a> {
    /// Explain why the empty incompatibility `failure` was derived.
    pub(crate) fn render(store: &'a Arena<Incompatibility>, failure: IncompId) -> String {
        let start = Self::start(store, failure);
        let mut report = Self {
            store,
            shared: shared_ids(store, start),
            ref_count: 0,
            shared_with_ref: Map::default(),
            lines: Vec::new(),
        };
        if report.is_derived(start) {
            report.build_recursive(start);
        } else {
            let line = format!("Because {}, {}.", report.external(start), report.conclusion(start));
            report.lines.push(line);
        }
        if let Some(last) = report.lines.last_mut() {
            if let Some(rest) = last.strip_prefix("And because ") {
                *last = format!("So, because {rest}");
            }
        }
        report.lines.join("\n")
    }

    /// The failure always ends by combining `{ root }` with the `{ not root }` incompatibility,
    /// which says nothing useful: the explanation starts from the former.
    fn start(store: &Arena<Incompatibility>, failure: IncompId) -> IncompId {
        match store[failure].causes() {
            Some((derived, root)) | Some((root, derived)) if store[root].cause == Cause::Root => {
                derived
            }
            _ => failure,
        }
    }

    fn is_derived(&self, id: IncompId) -> bool {
        self.store[id].causes().is_some()
    }

    fn build_recursive(&mut self, id: IncompId) {
        self.build_recursive_helper(id);
        if self.shared.contains(&id) && !self.shared_with_ref.contains_key(&id) {
            self.add_line_ref();
            self.shared_with_ref.insert(id, self.ref_count);
        }
    }

    fn build_recursive_helper(&mut self, current: IncompId) {
        let Some((cause1, cause2)) = self.store[current].causes() else {
            return;
        };
        match (self.is_derived(cause1), self.is_derived(cause2)) {
            // Simplest case, we just combine two external incompatibilities.
            (false, false) => {
                let line = format!(
                    "Because {} and {}, {}.",
                    self.external(cause1),
                    self.external(cause2),
                    self.conclusion(current)
                );
                self.lines.push(line);
            }
            // One cause is derived, so we explain this first
            // then we add the one-line external part
            // and finally conclude with the current incompatibility.
            (true, false) => self.report_one_each(cause1, cause2, current),
            (false, true) => self.report_one_each(cause2, cause1, current),
            // This is the most complex case since both causes are also derived.
            (true, true) => match (self.line_ref_of(cause1), self.line_ref_of(cause2)) {
                // If both causes already have been referenced (shared),
                // the explanation simply uses those references.
                (Some(ref1), Some(ref2)) => {
                    let line = format!(
                        "Because {} ({ref1}) and {} ({ref2}), {}.",
                        self.conclusion(cause1),
                        self.conclusion(cause2),
                        self.conclusion(current)
                    );
                    self.lines.push(line);
                }
                // Otherwise, if one only has a line number reference,
                // we recursively call the one without reference and then
                // add the one with reference to conclude.
                (Some(ref1), None) => {
                    self.build_recursive(cause2);
                    self.and_explain_ref(ref1, cause1, current);
                }
                (None, Some(ref2)) => {
                    self.build_recursive(cause1);
                    self.and_explain_ref(ref2, cause2, current);
                }
                // Finally, if no line reference exists yet,
                // we call recursively the first one and then,
                //   - if this was a shared node, it will get a line ref
                //     and we can simply recall this with the current node.
                //   - otherwise, we add a line reference to it,
                //     recursively call on the second node,
                //     and finally conclude.
                (None, None) => {
                    self.build_recursive(cause1);
                    if self.shared.contains(&cause1) {
                        self.lines.push(String::new());
                        self.build_recursive(current);
                    } else {
                        self.add_line_ref();
                        let ref1 = self.ref_count;
                        self.lines.push(String::new());
                        self.build_recursive(cause2);
                        self.and_explain_ref(ref1, cause1, current);
                    }
                }
            },
        }
    }

    /// Report a derived and an external incompatibility.
    ///
    /// The result will depend on the fact that the derived incompatibility
    /// has already been explained or not.
    fn report_one_each(&mut self, derived: IncompId, external: IncompId, current: IncompId) {
        match self.line_ref_of(derived) {
            Some(ref_id) => {
                let line = format!(
                    "Because {} ({ref_id}) and {}, {}.",
                    self.conclusion(derived),
                    self.external(external),
                    self.conclusion(current)
                );
                self.lines.push(line);
            }
            None => self.report_recurse_one_each(derived, external, current),
        }
    }

    /// Report one derived (without a line ref yet) and one external.
    fn report_recurse_one_each(&mut self, derived: IncompId, external: IncompId, current: IncompId) {
        let prior = self.store[derived].causes().and_then(|(cause1, cause2)| {
            match (self.is_derived(cause1), self.is_derived(cause2)) {
                (true, false) => Some((cause1, cause2)),
                (false, true) => Some((cause2, cause1)),
                _ => None,
            }
        });
        match prior {
            // If the derived cause has itself one external prior cause,
            // we can chain the external explanations.
            Some((prior_derived, prior_external)) if !self.shared.contains(&derived) => {
                self.build_recursive(prior_derived);
                let line = format!(
                    "And because {} and {}, {}.",
                    self.external(prior_external),
                    self.external(external),
                    self.conclusion(current)
                );
                self.lines.push(line);
            }
            _ => {
                self.build_recursive(derived);
                let line = format!(
                    "And because {}, {}.",
                    self.external(external),
                    self.conclusion(current)
                );
                self.lines.push(line);
            }
        }
    }

    fn and_explain_ref(&mut self, ref_id: usize, derived: IncompId, current: IncompId) {
        let line = format!(
            "And because {} ({ref_id}), {}.",
            self.conclusion(derived),
            self.conclusion(current)
        );
        self.lines.push(line);
    }

    /// Add a line reference to the last line.
    fn add_line_ref(&mut self) {
        self.ref_count += 1;
        if let Some(line) = self.lines.last_mut() {
            line.push_str(&format!(" ({})", self.ref_count));
        }
    }

    /// Line reference of a shared incompatibility, if it was already explained.
    fn line_ref_of(&self, id: IncompId) -> Option<usize> {
        self.shared_with_ref.get(&id).copied()
    }

    /// What an incompatibility states, as the conclusion of a step.
    fn conclusion(&self, id: IncompId) -> String {
        let incompat = &self.store[id];
        if incompat.is_failure() || incompat.forbids_root() {
            "version solving failed".to_string()
        } else {
            incompat.to_string()
        }
    }

    /// What an external incompatibility states, with its reason.
    fn external(&self, id: IncompId) -> String {
        let incompat = &self.store[id];
        match (&incompat.cause, incompat.iter().next()) {
            (Cause::Unavailable(reason), Some(term)) => {
                format!("{term} is unavailable because {reason}")
            }
            _ => incompat.to_string(),
        }
    }
}

/// Derived incompatibilities reachable from `start` through more than one parent.
fn shared_ids(store: &Arena<Incompatibility>, start: IncompId) -> Set<IncompId> {
    let mut seen = Set::default();
    let mut shared = Set::default();
    let mut stack = vec![start];
    while let Some(id) = stack.pop() {
        let Some((cause1, cause2)) = store[id].causes() else {
            continue;
        };
        for cause in [cause1, cause2] {
            if seen.insert(cause) {
                stack.push(cause);
            } else if store[cause].causes().is_some() {
                shared.insert(cause);
            }
        }
    }
    shared
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{PackageVersion, Subject, Term, VersionSet};

    fn universe(name: &str, majors: &[u32]) -> Arc<VersionSet> {
        Arc::new(majors.iter().map(|&v| PackageVersion::new(name, v)).collect())
    }

    fn root() -> Term {
        Term::exact(
            PackageVersion::root(),
            Arc::new(VersionSet::from([PackageVersion::root()])),
        )
    }

    #[test]
    fn unavailable_root_requirement() {
        let mut store = Arena::new();
        let root_universe = Arc::new(VersionSet::from([PackageVersion::root()]));
        let not_root = store.alloc(Incompatibility::root(root_universe.clone()));
        let unavailable = store.alloc(Incompatibility::unavailable(
            PackageVersion::root(),
            root_universe,
            "package a could not be found".into(),
        ));
        let failure = store.alloc(Incompatibility::prior_cause(
            unavailable,
            not_root,
            &Subject::Root,
            &store,
        ));
        assert!(store[failure].is_failure());
        assert_eq!(
            Report::render(&store, failure),
            "Because root is unavailable because package a could not be found, version solving failed."
        );
    }

    #[test]
    fn chained_externals() {
        // root -> a, a -> b 2, b 2 forbidden.
        let mut store = Arena::new();
        let a = universe("a", &[1]);
        let b = universe("b", &[1, 2]);
        let root_a = store.alloc(
            Incompatibility::from_dependency(root(), Term::exclude("a".into(), (*a).clone(), a.clone()))
                .unwrap(),
        );
        let a_b = store.alloc(
            Incompatibility::from_dependency(
                Term::exact(PackageVersion::new("a", 1), a.clone()),
                Term::exclude("b".into(), VersionSet::from([PackageVersion::new("b", 2)]), b.clone()),
            )
            .unwrap(),
        );
        let b2 = store.alloc(Incompatibility::unavailable(
            PackageVersion::new("b", 2),
            b,
            "it was yanked".into(),
        ));
        let a_forbidden = store.alloc(Incompatibility::prior_cause(
            a_b,
            b2,
            &Subject::package("b"),
            &store,
        ));
        let root_forbidden = store.alloc(Incompatibility::prior_cause(
            root_a,
            a_forbidden,
            &Subject::package("a"),
            &store,
        ));
        assert!(store[root_forbidden].forbids_root());

        assert_eq!(
            Report::render(&store, root_forbidden),
            "Because a depends on b ==2.0.0 and b ==2.0.0 is unavailable because it was yanked, a is forbidden.\n\
             So, because root depends on a, version solving failed."
        );
    }
}
