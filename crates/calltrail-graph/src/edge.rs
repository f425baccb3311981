//! Edge families of the graph.

/// The two independent adjacency structures a graph carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeFamily {
    /// Caller to callee.
    Calls,
    /// Value source to the variable it flows into.
    DataFlow,
}

impl std::fmt::Display for EdgeFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Calls => "calls",
            Self::DataFlow => "data_flow",
        };
        write!(f, "{}", s)
    }
}
