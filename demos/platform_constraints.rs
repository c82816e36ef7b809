// SPDX-License-Identifier: MPL-2.0

use vsolve::{
    InMemoryGraph, Preferences, Ranges, Requirements, Resolver, SolveError, Subject, Version,
};

fn version(s: &str) -> Version {
    s.parse().unwrap_or_else(|err| panic!("{s}: {err}"))
}

fn main() -> Result<(), SolveError> {
    env_logger::init();
    let mut graph = InMemoryGraph::new();
    graph.add_platform(version("linux"));
    graph.add_platform(version("windows"));
    for python in ["3.9", "3.10", "3.11", "3.12"] {
        graph.add_python_interpreter(version(python));
    }

    // numpy dropped old interpreters over time
    graph.add_dependencies(
        "numpy",
        (2, 0, 0),
        [(Subject::PythonInterpreter, Ranges::higher_than(version("3.10")))],
    );
    graph.add_dependencies(
        "numpy",
        (1, 26, 0),
        [(Subject::PythonInterpreter, Ranges::higher_than(version("3.9")))],
    );
    // the native extension only ships linux wheels
    graph.add_dependencies(
        "fastcodec",
        (1, 0, 0),
        [
            (Subject::Platform, Ranges::singleton(version("linux"))),
            (Subject::package("numpy"), Ranges::strictly_lower_than((2, 0, 0))),
        ],
    );

    let requirements = Requirements::from([
        (Subject::package("numpy"), "*".to_string()),
        (Subject::package("fastcodec"), ">=1.0".to_string()),
        (Subject::PythonInterpreter, ">=3.11".to_string()),
    ]);
    let preferences = Preferences::new().downgrade(Subject::PythonInterpreter);
    let mut resolver = Resolver::new(requirements, graph).with_preferences(preferences);
    resolver.run()?;

    match resolver.report() {
        None => {
            for version in resolver.result() {
                println!("{version}");
            }
            if let Some(statistics) = resolver.statistics() {
                println!("{statistics:?}");
            }
        }
        Some(report) => {
            eprintln!("{report}");
            std::process::exit(1);
        }
    }
    Ok(())
}
