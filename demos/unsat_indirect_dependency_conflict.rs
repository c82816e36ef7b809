// SPDX-License-Identifier: MPL-2.0

use vsolve::{InMemoryGraph, Ranges, Requirements, Resolver, SolveError, Subject, Version};

fn main() -> Result<(), SolveError> {
    env_logger::init();
    let mut graph = InMemoryGraph::new();
    // root depends on foo, which depends on two versions of bar at once
    graph.add_dependencies(
        "foo",
        (1, 0, 0),
        vec![(
            "bar",
            Ranges::singleton((1, 0, 0)).intersection(&Ranges::singleton((2, 0, 0))),
        )],
    );
    graph.add_dependencies("foo", (0, 9, 0), vec![("baz", Ranges::higher_than((2, 0, 0)))]);

    // provide both versions of bar, and an old baz
    graph.add_dependencies("bar", (1, 0, 0), Vec::<(Subject, Ranges<Version>)>::new());
    graph.add_dependencies("bar", (2, 0, 0), Vec::<(Subject, Ranges<Version>)>::new());
    graph.add_dependencies("baz", (1, 0, 0), Vec::<(Subject, Ranges<Version>)>::new());

    let requirements = Requirements::from([(Subject::package("foo"), "*".to_string())]);
    let mut resolver = Resolver::new(requirements, graph);
    resolver.run()?;

    match resolver.report() {
        None => println!("{:?}", resolver.result()),
        Some(report) => {
            eprintln!("No solution.\n");
            eprintln!("```");
            eprintln!("{report}");
            eprintln!("```");
            std::process::exit(1);
        }
    }
    Ok(())
}
