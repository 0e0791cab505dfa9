//! The rely graph: name checks, cycle detection and fixed-point instantiation.

use rustc_hash::FxHashMap;

use crate::declaration::LibraryId;
use crate::rely::RelyError;
use crate::rely::library::{RelyLibrary, TypeMap, instantiate};
use crate::rely::reference::ReferenceLibrary;
use crate::table::LibraryTable;

/// A dependency edge target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    /// The library being compiled.
    Current,
    Rely(usize),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Active,
    Done,
}

pub struct RelyGraph<'r> {
    current: &'r str,
    libraries: &'r [ReferenceLibrary],
    positions: FxHashMap<&'r str, usize>,
}

impl<'r> RelyGraph<'r> {
    /// Index the libraries by name. Duplicates, including a rely named like the
    /// library being compiled, are reported; the first occurrence is kept.
    pub fn new(current: &'r str, libraries: &'r [ReferenceLibrary]) -> (Self, Vec<RelyError>) {
        let mut errors = Vec::new();
        let mut positions = FxHashMap::default();
        for (index, library) in libraries.iter().enumerate() {
            let name = library.name.as_str();
            if name == current || positions.contains_key(name) {
                errors.push(RelyError::Duplicate { name: name.to_string() });
                continue;
            }
            positions.insert(name, index);
        }
        (Self { current, libraries, positions }, errors)
    }

    fn node(&self, name: &str) -> Option<Node> {
        if name == self.current {
            Some(Node::Current)
        } else {
            self.positions.get(name).map(|&i| Node::Rely(i))
        }
    }

    fn name(&self, node: Node) -> &'r str {
        match node {
            Node::Current => self.current,
            Node::Rely(i) => &self.libraries[i].name,
        }
    }

    /// Declared dependencies that name no provided library.
    pub fn missing(&self) -> Vec<RelyError> {
        let mut errors = Vec::new();
        for library in self.libraries {
            for dependency in &library.dependencies {
                if self.node(dependency).is_none() {
                    errors.push(RelyError::Missing {
                        library: library.name.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }
        errors
    }

    fn edges(&self, node: Node) -> Vec<Node> {
        match node {
            // The library being compiled relies on everything it was given.
            Node::Current => self.positions.values().copied().map(Node::Rely).collect::<Vec<_>>(),
            Node::Rely(i) => self.libraries[i].dependencies.iter().filter_map(|d| self.node(d)).collect(),
        }
    }

    /// Every dependency cycle, each reported once with its full chain.
    pub fn cycles(&self) -> Vec<RelyError> {
        let mut marks = vec![Mark::Unvisited; self.libraries.len()];
        let mut current_mark = Mark::Unvisited;
        let mut stack = Vec::new();
        let mut errors = Vec::new();

        self.visit(Node::Current, &mut marks, &mut current_mark, &mut stack, &mut errors);
        for i in 0..self.libraries.len() {
            if marks[i] == Mark::Unvisited && self.positions.get(self.libraries[i].name.as_str()) == Some(&i) {
                self.visit(Node::Rely(i), &mut marks, &mut current_mark, &mut stack, &mut errors);
            }
        }
        errors
    }

    fn visit(
        &self,
        node: Node,
        marks: &mut [Mark],
        current_mark: &mut Mark,
        stack: &mut Vec<Node>,
        errors: &mut Vec<RelyError>,
    ) {
        match node {
            Node::Current => *current_mark = Mark::Active,
            Node::Rely(i) => marks[i] = Mark::Active,
        }
        stack.push(node);

        let mut targets = self.edges(node);
        // Stable order for reproducible chains.
        targets.sort_by_key(|n| match n {
            Node::Current => 0,
            Node::Rely(i) => i + 1,
        });

        for target in targets {
            let state = match target {
                Node::Current => *current_mark,
                Node::Rely(i) => marks[i],
            };
            match state {
                Mark::Active => {
                    let start = stack.iter().position(|n| *n == target).unwrap_or(0);
                    let mut chain: Vec<String> = stack[start..].iter().map(|n| self.name(*n).to_string()).collect();
                    chain.push(self.name(target).to_string());
                    errors.push(RelyError::Cycle { chain });
                }
                Mark::Unvisited => self.visit(target, marks, current_mark, stack, errors),
                Mark::Done => {}
            }
        }

        stack.pop();
        match node {
            Node::Current => *current_mark = Mark::Done,
            Node::Rely(i) => marks[i] = Mark::Done,
        }
    }

    /// Instantiate libraries in dependency order, repeating passes until every
    /// library is built. A pass that makes no progress fails the graph.
    pub fn instantiate(&self) -> Result<Vec<RelyLibrary>, Vec<RelyError>> {
        let count = self.libraries.len();
        let mut built: Vec<Option<RelyLibrary>> = (0..count).map(|_| None).collect();
        let mut failed = vec![false; count];
        let mut errors = Vec::new();
        let mut pass = 0;

        loop {
            pass += 1;
            let mut progress = false;
            for index in 0..count {
                if built[index].is_some() || failed[index] {
                    continue;
                }
                let reference = &self.libraries[index];
                let dependencies: Option<Vec<Option<(LibraryId, &LibraryTable)>>> = reference
                    .dependencies
                    .iter()
                    .map(|name| match self.node(name) {
                        Some(Node::Rely(d)) if failed[d] => Some(None),
                        Some(Node::Rely(d)) => built[d].as_ref().map(|lib| Some((lib.id(), &lib.table))),
                        _ => Some(None),
                    })
                    .collect();
                // Not ready yet: some dependency is still pending.
                let Some(dependencies) = dependencies else { continue };

                let result = {
                    let map = TypeMap { reference, own: LibraryId::Rely(index as u32), dependencies };
                    instantiate(&map)
                };
                progress = true;
                match result {
                    Ok(library) => {
                        tracing::debug!(library = %library.name(), pass, "rely library instantiated");
                        built[index] = Some(library);
                    }
                    Err(e) => {
                        errors.push(e);
                        failed[index] = true;
                    }
                }
            }

            let pending: Vec<String> = (0..count)
                .filter(|&i| built[i].is_none() && !failed[i])
                .map(|i| self.libraries[i].name.clone())
                .collect();
            if pending.is_empty() {
                break;
            }
            if !progress {
                errors.push(RelyError::Unresolvable { pending });
                break;
            }
        }

        if errors.is_empty() {
            Ok(built.into_iter().flatten().collect())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lib(name: &str, deps: &[&str]) -> ReferenceLibrary {
        let mut r = ReferenceLibrary::new(name);
        r.dependencies = deps.iter().map(|d| d.to_string()).collect();
        r
    }

    #[test]
    fn duplicate_names_are_reported() {
        let libs = vec![lib("A", &[]), lib("A", &[]), lib("Main", &[])];
        let (_, errors) = RelyGraph::new("Main", &libs);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| matches!(e, RelyError::Duplicate { .. })));
    }

    #[test]
    fn missing_dependency() {
        let libs = vec![lib("A", &["Ghost"])];
        let (graph, _) = RelyGraph::new("Main", &libs);
        let missing = graph.missing();
        assert_eq!(missing, vec![RelyError::Missing { library: "A".into(), dependency: "Ghost".into() }]);
    }

    #[test]
    fn three_library_cycle_reports_full_chain() {
        let libs = vec![lib("X", &["Y"]), lib("Y", &["Z"]), lib("Z", &["X"])];
        let (graph, _) = RelyGraph::new("Main", &libs);
        let cycles = graph.cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].to_string(), "circular rely: X -> Y -> Z -> X");
    }

    #[test]
    fn rely_on_the_current_library_is_a_cycle() {
        let libs = vec![lib("L2", &["L1"])];
        let (graph, _) = RelyGraph::new("L1", &libs);
        let cycles = graph.cycles();
        assert_eq!(cycles, vec![RelyError::Cycle { chain: vec!["L1".into(), "L2".into(), "L1".into()] }]);
    }

    #[test]
    fn instantiation_is_order_independent() {
        // Provided in reverse dependency order: needs more than one pass.
        let libs = vec![lib("Top", &["Mid"]), lib("Mid", &["Base"]), lib("Base", &[])];
        let (graph, errors) = RelyGraph::new("Main", &libs);
        assert!(errors.is_empty());
        assert!(graph.cycles().is_empty());
        let built = graph.instantiate().expect("acyclic graph instantiates");
        let names: Vec<&str> = built.iter().map(|l| l.name()).collect();
        assert_eq!(names, vec!["Top", "Mid", "Base"]);
        assert_eq!(built[0].dependencies, vec![LibraryId::Rely(1)]);
    }
}
