// SPDX-License-Identifier: MPL-2.0

use std::cell::Cell;
use std::io;

use vsolve::{
    CachedGraph, DependencyCandidates, Graph, GraphError, InMemoryGraph, PackageVersion,
    Preferences, Ranges, Requirements, Resolver, SolveError, Subject, Version, VersionSet,
};

fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn requirements<const N: usize>(reqs: [(&str, &str); N]) -> Requirements {
    reqs.into_iter()
        .map(|(name, req)| (Subject::package(name), req.to_string()))
        .collect()
}

fn no_dependencies() -> Vec<(Subject, Ranges<Version>)> {
    Vec::new()
}

/// Counts the questions that reach the wrapped graph.
struct Counting<G> {
    inner: G,
    calls: Cell<u32>,
}

impl<G> Counting<G> {
    fn new(inner: G) -> Self {
        Self {
            inner,
            calls: Cell::new(0),
        }
    }

    fn tick(&self) {
        self.calls.set(self.calls.get() + 1);
    }
}

impl<G: Graph> Graph for Counting<G> {
    fn fetch_all_versions_for(&self, subject: &Subject) -> Result<VersionSet, GraphError> {
        self.tick();
        self.inner.fetch_all_versions_for(subject)
    }

    fn fetch_dependencies_for(
        &self,
        version: &PackageVersion,
    ) -> Result<DependencyCandidates, GraphError> {
        self.tick();
        self.inner.fetch_dependencies_for(version)
    }

    fn dependencies_for_root(
        &self,
        requirements: &Requirements,
    ) -> Result<DependencyCandidates, GraphError> {
        self.tick();
        self.inner.dependencies_for_root(requirements)
    }
}

/// a requires b ==1.0.0, c requires b >=2.0.0, <3.0.0.
fn incompatible_siblings() -> InMemoryGraph {
    let mut graph = InMemoryGraph::new();
    graph.add_dependencies("a", (1, 0, 0), [("b", Ranges::singleton((1, 0, 0)))]);
    graph.add_dependencies("c", (1, 0, 0), [("b", Ranges::between((2, 0, 0), (3, 0, 0)))]);
    graph.add_dependencies("b", (1, 0, 0), no_dependencies());
    graph.add_dependencies("b", (2, 0, 0), no_dependencies());
    graph
}

#[test]
fn single_dependency() {
    init_log();
    let mut graph = InMemoryGraph::new();
    graph.add_dependencies("a", (1, 0, 0), no_dependencies());

    let mut resolver = Resolver::new(requirements([("a", "==1.0.0")]), graph);
    assert!(resolver.result().is_empty());
    resolver.run().unwrap();
    assert!(resolver.is_solved());
    assert_eq!(resolver.result(), &[PackageVersion::new("a", (1, 0, 0))]);
    assert_eq!(resolver.report(), None);
}

#[test]
fn incompatible_requirements_are_explained() {
    init_log();
    let mut resolver = Resolver::new(requirements([("a", "*"), ("c", "*")]), incompatible_siblings());
    resolver.run().unwrap();

    assert!(!resolver.is_solved());
    assert!(resolver.result().is_empty());
    assert!(resolver.failure().unwrap().is_failure());
    let report = resolver.report().unwrap();
    assert!(report.ends_with("version solving failed."));
    assert_eq!(
        report,
        "Because a depends on b ==1.0.0 and c depends on b ==2.0.0, a, c are incompatible.\n\
         So, because root depends on a and root depends on c, version solving failed."
    );

    let statistics = resolver.statistics().unwrap();
    assert!(statistics.conflicts >= 1);
    assert!(statistics.conflict_counts[&Subject::package("c")] >= 1);
}

#[test]
fn result_is_idempotent() {
    let mut graph = InMemoryGraph::new();
    graph.add_dependencies("a", (1, 0, 0), [("b", Ranges::full())]);
    graph.add_dependencies("b", (1, 0, 0), no_dependencies());
    graph.add_dependencies("b", (2, 0, 0), no_dependencies());

    let mut resolver = Resolver::new(requirements([("a", "*")]), Counting::new(graph));
    resolver.run().unwrap();
    let calls = resolver.graph().calls.get();
    let first = resolver.result().to_vec();
    for _ in 0..5 {
        assert_eq!(resolver.result(), first.as_slice());
    }
    assert_eq!(resolver.graph().calls.get(), calls);
    assert_eq!(
        first,
        vec![PackageVersion::new("a", (1, 0, 0)), PackageVersion::new("b", (2, 0, 0))]
    );
}

#[test]
fn same_result_on_repeated_runs() {
    let mut graph = InMemoryGraph::new();
    graph.add_dependencies("c", 0, no_dependencies());
    graph.add_dependencies("c", 2, no_dependencies());
    graph.add_dependencies("b", 0, no_dependencies());
    graph.add_dependencies("b", 1, [("c", Ranges::between(0, 1))]);
    graph.add_dependencies("a", 0, [("b", Ranges::full()), ("c", Ranges::full())]);

    let mut resolver = Resolver::new(requirements([("a", "*")]), graph);
    resolver.run().unwrap();
    let one = resolver.result().to_vec();
    for _ in 0..10 {
        resolver.run().unwrap();
        assert_eq!(resolver.result(), one.as_slice());
    }
}

#[test]
fn cached_graph_is_queried_once_per_question() {
    let graph = CachedGraph::new(Counting::new(incompatible_siblings()));
    let mut resolver = Resolver::new(requirements([("a", "*"), ("c", "*")]), graph);
    resolver.run().unwrap();
    let calls = resolver.graph().inner().calls.get();
    resolver.run().unwrap();
    assert_eq!(resolver.graph().inner().calls.get(), calls);

    resolver.graph().invalidate();
    resolver.run().unwrap();
    assert_eq!(resolver.graph().inner().calls.get(), 2 * calls);
}

#[test]
fn missing_dependency_makes_a_version_unavailable() {
    let mut graph = InMemoryGraph::new();
    graph.add_dependencies("a", (1, 0, 0), no_dependencies());
    graph.add_dependencies("a", (2, 0, 0), [("nowhere", Ranges::full())]);

    let mut resolver = Resolver::new(requirements([("a", "*")]), graph);
    resolver.run().unwrap();
    assert_eq!(resolver.result(), &[PackageVersion::new("a", (1, 0, 0))]);
}

#[test]
fn missing_root_requirement_is_reported() {
    let mut resolver = Resolver::new(requirements([("nowhere", "*")]), InMemoryGraph::new());
    resolver.run().unwrap();
    assert_eq!(
        resolver.report().unwrap(),
        "Because root is unavailable because package nowhere could not be found, \
         version solving failed."
    );
}

#[test]
fn unmatched_root_requirement_lists_available_versions() {
    let mut graph = InMemoryGraph::new();
    graph.add_dependencies("a", (1, 0, 0), no_dependencies());

    let mut resolver = Resolver::new(requirements([("a", ">=5")]), graph);
    resolver.run().unwrap();
    let report = resolver.report().unwrap();
    assert!(report.contains("root requires a >=5 but only 1.0.0 is available"));
    assert!(report.ends_with("version solving failed."));
}

#[test]
fn invalid_requirements_abort() {
    let mut graph = InMemoryGraph::new();
    graph.add_dependencies("a", (1, 0, 0), no_dependencies());

    let mut resolver = Resolver::new(requirements([("a", ">=1.0,,")]), graph);
    let err = resolver.run().unwrap_err();
    assert!(matches!(
        err,
        SolveError::Graph(GraphError::InvalidRequirements { .. })
    ));
    assert!(resolver.result().is_empty());
    assert!(resolver.statistics().is_none());
}

#[test]
fn backend_errors_abort() {
    struct Offline;

    impl Graph for Offline {
        fn fetch_all_versions_for(&self, _: &Subject) -> Result<VersionSet, GraphError> {
            Err(GraphError::Backend(Box::new(io::Error::other("offline"))))
        }

        fn fetch_dependencies_for(
            &self,
            _: &PackageVersion,
        ) -> Result<DependencyCandidates, GraphError> {
            Err(GraphError::Backend(Box::new(io::Error::other("offline"))))
        }

        fn dependencies_for_root(
            &self,
            _: &Requirements,
        ) -> Result<DependencyCandidates, GraphError> {
            Err(GraphError::Backend(Box::new(io::Error::other("offline"))))
        }
    }

    let mut resolver = Resolver::new(requirements([("a", "*")]), Offline);
    let err = resolver.run().unwrap_err();
    assert!(matches!(err, SolveError::Graph(GraphError::Backend(_))));
}

#[test]
fn should_always_find_a_satisfier() {
    let mut graph = InMemoryGraph::new();
    graph.add_dependencies("a", 0u32, [("b", Ranges::empty())]);
    graph.add_dependencies("b", 0u32, no_dependencies());
    {
        let mut resolver = Resolver::new(requirements([("a", "*")]), &graph);
        resolver.run().unwrap();
        assert!(!resolver.is_solved());
    }

    graph.add_dependencies("c", 0u32, [("a", Ranges::full())]);
    let mut resolver = Resolver::new(requirements([("c", "*")]), &graph);
    resolver.run().unwrap();
    assert!(!resolver.is_solved());
    assert!(resolver.report().unwrap().ends_with("version solving failed."));
}

#[test]
fn depend_on_self() {
    let mut graph = InMemoryGraph::new();
    graph.add_dependencies("a", 0, [("a", Ranges::full())]);
    graph.add_dependencies("a", 66, [("a", Ranges::singleton(111))]);

    let mut resolver = Resolver::new(requirements([("a", "*")]), graph);
    resolver.run().unwrap();
    assert_eq!(resolver.result(), &[PackageVersion::new("a", 0)]);
}

#[test]
fn platform_is_chosen_like_a_package() {
    init_log();
    let linux: Version = "linux".parse().unwrap();
    let macos: Version = "macos".parse().unwrap();
    let mut graph = InMemoryGraph::new();
    graph.add_platform(linux.clone());
    graph.add_platform(macos.clone());
    graph.add_python_interpreter((3, 11, 0));
    graph.add_python_interpreter((3, 12, 0));
    graph.add_dependencies(
        "a",
        (1, 0, 0),
        [
            (Subject::Platform, Ranges::singleton(linux.clone())),
            (Subject::PythonInterpreter, Ranges::full()),
        ],
    );
    graph.add_dependencies("a", (2, 0, 0), [(Subject::Platform, Ranges::singleton(macos))]);

    let mut reqs = requirements([("a", "*")]);
    reqs.insert(Subject::Platform, "==linux".to_string());
    reqs.insert(Subject::PythonInterpreter, "<3.12".to_string());
    let mut resolver = Resolver::new(reqs, graph);
    resolver.run().unwrap();
    assert_eq!(
        resolver.result(),
        &[
            PackageVersion::new("a", (1, 0, 0)),
            PackageVersion::new(Subject::Platform, linux),
            PackageVersion::new(Subject::PythonInterpreter, (3, 11, 0)),
        ]
    );
}

#[test]
fn preferences_steer_the_choice() {
    let mut graph = InMemoryGraph::new();
    for v in 1..=3u32 {
        graph.add_dependencies("a", v, no_dependencies());
        graph.add_dependencies("b", v, no_dependencies());
    }
    let reqs = requirements([("a", "*"), ("b", "*")]);

    let mut resolver = Resolver::new(reqs.clone(), &graph)
        .with_preferences(Preferences::new().lock("a", 2).downgrade("b"));
    resolver.run().unwrap();
    assert_eq!(
        resolver.result(),
        &[PackageVersion::new("a", 2), PackageVersion::new("b", 1)]
    );

    let mut resolver = Resolver::new(reqs, &graph).with_preferences(
        Preferences::new().soft("a", "b", Ranges::singleton(2)),
    );
    resolver.run().unwrap();
    assert_eq!(
        resolver.result(),
        &[PackageVersion::new("a", 3), PackageVersion::new("b", 2)]
    );
}

#[test]
fn export_follows_the_solution() {
    let mut graph = InMemoryGraph::new();
    graph.add_dependencies("a", (1, 0, 0), [("b", Ranges::full())]);
    graph.add_dependencies("b", (1, 0, 0), no_dependencies());

    let mut resolver = Resolver::new(requirements([("a", "*")]), graph);
    assert!(resolver.summary().is_none());
    resolver.run().unwrap();

    let summary = resolver.summary().unwrap();
    assert_eq!(summary.releases, resolver.result().to_vec());
    assert_eq!(summary.dependencies.len(), 1);

    let visualization = resolver.visualization().unwrap();
    let groups: Vec<&str> = visualization.groups.iter().map(|g| g.id.as_str()).collect();
    assert_eq!(groups, vec!["root", "a", "b"]);
    assert_eq!(visualization.edges.len(), 2);
    assert!(visualization.nodes.iter().all(|n| n.selected));
}
