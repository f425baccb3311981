//! Query engine over a finalized graph.
//!
//! All path enumeration goes through one iterative depth-first walker with
//! an explicit stack of `(node, remaining neighbours)` frames, so depth is
//! bounded by memory rather than the call stack. A node already on the
//! current path is never re-entered: cycles are silently excluded.
//!
//! Paths are streamed to a callback as they are found. Returning `false`
//! from the callback stops the search; the walker checks it once per path.
//!
//! Unknown symbol names are not errors. The engine logs a warning and
//! reports zero paths; callers that want "did you mean" hints use
//! [`QueryEngine::suggestions`] first.

use crate::builder::short_name;
use crate::edge::EdgeFamily;
use crate::graph::CallGraph;
use crate::symbol_table::{SymbolType, SymbolUid};
use petgraph::Direction;
use std::collections::{HashSet, VecDeque};
use tracing::warn;

/// Endpoint meaning "enumerate backwards from the end symbol to every root".
pub const START: &str = "START";
/// Endpoint meaning "enumerate forwards to the END sentinel".
pub const END: &str = crate::symbol_table::END_NAME;

/// A symbol returned by a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolMatch<'g> {
    pub uid: SymbolUid,
    pub name: &'g str,
    pub kind: SymbolType,
}

/// Read-only queries over a [`CallGraph`].
///
/// Any number of engines may share one graph across threads.
#[derive(Debug, Clone, Copy)]
pub struct QueryEngine<'g> {
    graph: &'g CallGraph,
}

impl<'g> QueryEngine<'g> {
    pub fn new(graph: &'g CallGraph) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &'g CallGraph {
        self.graph
    }

    pub fn has_symbol(&self, name: &str) -> bool {
        self.graph.lookup(name).is_some()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Symbol search
    // ─────────────────────────────────────────────────────────────────────

    /// Symbols containing every pattern, in UID order. An empty pattern
    /// list, or an empty pattern, matches everything.
    pub fn find_symbols(&self, patterns: &[&str]) -> Vec<SymbolMatch<'g>> {
        let mut matches: Vec<SymbolMatch<'g>> = self
            .all_symbols()
            .filter(|m| patterns.iter().all(|p| m.name.contains(p)))
            .collect();
        matches.sort_unstable_by_key(|m| m.uid);
        matches
    }

    pub fn symbol_type(&self, name: &str) -> Option<SymbolType> {
        self.graph.lookup(name).and_then(|uid| self.graph.type_of(uid))
    }

    /// Path of the file defining `name`, if it has one.
    pub fn file_of(&self, name: &str) -> Option<&'g str> {
        let table = self.graph.table();
        let uid = self.graph.lookup(name)?;
        table.file_of(uid).and_then(|file| table.path_of(file))
    }

    /// Names of the symbols whose value flows into `variable`.
    pub fn data_sources(&self, variable: &str) -> Vec<&'g str> {
        match self.graph.lookup(variable) {
            Some(uid) => self.names(self.graph.data_sources_of(uid)),
            None => Vec::new(),
        }
    }

    /// Names of the variables `source` flows into.
    pub fn data_sinks(&self, source: &str) -> Vec<&'g str> {
        match self.graph.lookup(source) {
            Some(uid) => self.names(self.graph.data_sinks_of(uid)),
            None => Vec::new(),
        }
    }

    /// Variables whose name contains every pattern.
    pub fn variables_in(&self, patterns: &[&str]) -> Vec<SymbolMatch<'g>> {
        let mut vars = self.find_symbols(patterns);
        vars.retain(|m| m.kind == SymbolType::Variable);
        vars
    }

    /// Variables found by member name.
    ///
    /// The first pattern is matched against the part after the last `::`
    /// or the whole name; every further pattern narrows the result.
    pub fn find_members(&self, patterns: &[&str]) -> Vec<SymbolMatch<'g>> {
        let Some((first, rest)) = patterns.split_first() else {
            return Vec::new();
        };
        let mut matches: Vec<SymbolMatch<'g>> = self
            .all_symbols()
            .filter(|m| m.kind == SymbolType::Variable)
            .filter(|m| {
                let member = m.name.rsplit("::").next().unwrap_or(m.name);
                member.contains(first) || m.name.contains(first)
            })
            .filter(|m| rest.iter().all(|p| m.name.contains(p)))
            .collect();
        matches.sort_unstable_by_key(|m| m.uid);
        matches
    }

    /// Up to `limit` known names resembling `name`, sorted.
    ///
    /// Substring matches come first; when there are none, symbols sharing
    /// the short name are offered instead.
    pub fn suggestions(&self, name: &str, limit: usize) -> Vec<&'g str> {
        let mut found: Vec<&'g str> = self
            .find_symbols(&[name])
            .into_iter()
            .map(|m| m.name)
            .collect();
        if found.is_empty() {
            let short = short_name(name);
            found = self
                .all_symbols()
                .filter(|m| short_name(m.name) == short)
                .map(|m| m.name)
                .collect();
        }
        found.sort_unstable();
        found.truncate(limit);
        found
    }

    // ─────────────────────────────────────────────────────────────────────
    // Path enumeration
    // ─────────────────────────────────────────────────────────────────────

    /// Enumerates every simple call path from `start` to `end`.
    ///
    /// `start == "START"` runs a backtrace from `end`; `end == "END"` runs
    /// a forward trace from `start`; two concrete symbols use the pruned
    /// bidirectional search. Returns the number of paths reported.
    pub fn find_paths<C>(&self, start: &str, end: &str, callback: C) -> usize
    where
        C: FnMut(&[&str]) -> bool,
    {
        match (start == START, end == END) {
            (true, true) => {
                warn!("cannot use both START and END; at least one must be a symbol");
                0
            }
            (true, false) => self.backtrace(end, callback),
            (false, true) => self.trace_forward(start, callback),
            (false, false) => self.paths_between(start, end, callback),
        }
    }

    /// Every call chain from `start` down to END.
    pub fn trace_forward<C>(&self, start: &str, mut callback: C) -> usize
    where
        C: FnMut(&[&str]) -> bool,
    {
        let Some(from) = self.resolve(start) else {
            return 0;
        };
        let end = self.graph.end();
        self.walk(
            from,
            EdgeFamily::Calls,
            Direction::Outgoing,
            |node, _| node == end,
            |_| true,
            false,
            &mut callback,
        )
    }

    /// Every call chain from a root (a function nobody calls) to `end`,
    /// reported in caller to callee order.
    pub fn backtrace<C>(&self, end: &str, callback: C) -> usize
    where
        C: FnMut(&[&str]) -> bool,
    {
        self.backtrace_until(end, None, callback)
    }

    /// Like [`backtrace`](Self::backtrace), but a path also ends when it
    /// reaches `stop_at`.
    pub fn backtrace_until<C>(&self, end: &str, stop_at: Option<&str>, mut callback: C) -> usize
    where
        C: FnMut(&[&str]) -> bool,
    {
        let Some(to) = self.resolve(end) else {
            return 0;
        };
        let stop = match stop_at {
            Some(name) => match self.resolve(name) {
                Some(uid) => Some(uid),
                None => return 0,
            },
            None => None,
        };
        let graph = self.graph;
        self.walk(
            to,
            EdgeFamily::Calls,
            Direction::Incoming,
            |node, _| Some(node) == stop || graph.callers_of(node).next().is_none(),
            |_| true,
            true,
            &mut callback,
        )
    }

    /// Every simple call path between two concrete symbols.
    ///
    /// A backward sweep from `end` first collects every node that can reach
    /// it; the forward search never steps outside that set.
    pub fn paths_between<C>(&self, start: &str, end: &str, mut callback: C) -> usize
    where
        C: FnMut(&[&str]) -> bool,
    {
        let (Some(from), Some(to)) = (self.resolve(start), self.resolve(end)) else {
            return 0;
        };
        let reaches_end = self.reachable(to, EdgeFamily::Calls, Direction::Incoming);
        if !reaches_end.contains(&from) {
            return 0;
        }
        self.walk(
            from,
            EdgeFamily::Calls,
            Direction::Outgoing,
            |node, _| node == to,
            |node| reaches_end.contains(&node),
            false,
            &mut callback,
        )
    }

    /// Every data-flow path from `source` into `variable`. Paths have at
    /// least one edge.
    pub fn data_flow_paths<C>(&self, source: &str, variable: &str, mut callback: C) -> usize
    where
        C: FnMut(&[&str]) -> bool,
    {
        let (Some(from), Some(to)) = (self.resolve(source), self.resolve(variable)) else {
            return 0;
        };
        self.walk(
            from,
            EdgeFamily::DataFlow,
            Direction::Outgoing,
            |node, len| node == to && len > 1,
            |_| true,
            false,
            &mut callback,
        )
    }

    /// Iterative simple-path enumeration.
    ///
    /// `is_goal(node, path_len)` ends a path at `node`; `allow` filters
    /// which neighbours may be entered at all. With `reverse`, paths are
    /// reported last node first.
    #[allow(clippy::too_many_arguments)]
    fn walk<G, A, C>(
        &self,
        start: SymbolUid,
        family: EdgeFamily,
        direction: Direction,
        is_goal: G,
        allow: A,
        reverse: bool,
        callback: &mut C,
    ) -> usize
    where
        G: Fn(SymbolUid, usize) -> bool,
        A: Fn(SymbolUid) -> bool,
        C: FnMut(&[&str]) -> bool,
    {
        let graph = self.graph;
        let mut path = vec![start];
        let mut on_path: HashSet<SymbolUid> = HashSet::from([start]);
        let mut frames = vec![graph.neighbors(family, start, direction)];
        let mut found = 0;

        while let Some(frame) = frames.last_mut() {
            let node = path[path.len() - 1];

            if is_goal(node, path.len()) {
                found += 1;
                let mut names: Vec<&str> = path.iter().map(|&uid| graph.name_of(uid)).collect();
                if reverse {
                    names.reverse();
                }
                if !callback(&names) {
                    return found;
                }
                frames.pop();
                on_path.remove(&node);
                path.pop();
                continue;
            }

            match frame.find(|next| !on_path.contains(next) && allow(*next)) {
                Some(next) => {
                    path.push(next);
                    on_path.insert(next);
                    frames.push(graph.neighbors(family, next, direction));
                }
                None => {
                    frames.pop();
                    on_path.remove(&node);
                    path.pop();
                }
            }
        }

        found
    }

    /// Every node reachable from `from` (inclusive), breadth first.
    fn reachable(
        &self,
        from: SymbolUid,
        family: EdgeFamily,
        direction: Direction,
    ) -> HashSet<SymbolUid> {
        let mut seen = HashSet::from([from]);
        let mut queue = VecDeque::from([from]);
        while let Some(node) = queue.pop_front() {
            for next in self.graph.neighbors(family, node, direction) {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        seen
    }

    fn resolve(&self, name: &str) -> Option<SymbolUid> {
        if name == END {
            return Some(self.graph.end());
        }
        let uid = self.graph.lookup(name);
        if uid.is_none() {
            warn!("symbol not found: {}", name);
        }
        uid
    }

    fn all_symbols(&self) -> impl Iterator<Item = SymbolMatch<'g>> + 'g {
        self.graph
            .table()
            .symbols()
            .map(|(uid, name, kind)| SymbolMatch { uid, name, kind })
    }

    fn names(&self, uids: impl Iterator<Item = SymbolUid>) -> Vec<&'g str> {
        let mut names: Vec<&'g str> = uids
            .map(|uid| self.graph.name_of(uid))
            .filter(|n| !n.is_empty())
            .collect();
        names.sort_unstable();
        names
    }
}
