pub mod dependency_graph;
mod edit;

pub use dependency_graph::{DependencyGraph, TaskEvent};
