//! Call-tree builder.
//!
//! Given a root symbol, walks the symbol database depth-first and
//! resolves each body-level call reference into a child node, honoring
//! Fortran binding rules: module `use` visibility, explicit interface
//! blocks, and type-bound procedures with extension chains. Nodes are
//! deduplicated by declaration identity, which also halts call cycles.
//!
//! A build is synchronous and single-threaded; it is meant to run on a
//! worker thread. Cancellation is cooperative through a shared token,
//! polled at a throttled cadence together with progress reporting.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::domain::calltree::{
    BuildOutcome, BuildStatus, CallTree, CallTreeNode, CalledByIndex, NodeId,
};
use crate::domain::database::SymbolDatabase;
use crate::domain::symbol::{CallReference, SymbolId, SymbolKey, SymbolKind};

/// Modules shipped with compilers; `use` of these never resolves
/// against user source.
pub const FORTRAN_INTRINSIC_MODULES: &[&str] = &[
    "iso_c_binding",
    "iso_fortran_env",
    "ieee_arithmetic",
    "ieee_exceptions",
    "ieee_features",
    "omp_lib",
    "omp_lib_kinds",
    "openacc",
];

/// Shared flag for cooperative cancellation of a running build.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Progress snapshot sent at the polling cadence.
#[derive(Debug, Clone, Copy)]
pub struct BuildProgress {
    pub visited: usize,
}

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Hard recursion bound against pathological call graphs.
    pub max_depth: usize,
    /// Lowercased names treated as non-calls (language keywords that
    /// look like procedure calls, e.g. `if`, `write`).
    pub keywords: HashSet<String>,
    /// Minimum interval between cancellation polls / progress reports.
    pub poll_interval: Duration,
    /// Module names skipped during `use` resolution.
    pub intrinsic_modules: HashSet<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            max_depth: 20,
            keywords: HashSet::new(),
            poll_interval: Duration::from_millis(100),
            intrinsic_modules: FORTRAN_INTRINSIC_MODULES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Static shape of a call site, deciding the resolution strategy.
enum CallShape<'a> {
    Plain,
    TypeBound { type_name: &'a str },
}

impl<'a> CallShape<'a> {
    fn of(call: &'a CallReference) -> Self {
        match &call.receiver_type {
            Some(type_name) => CallShape::TypeBound { type_name },
            None => CallShape::Plain,
        }
    }
}

/// Mutable state owned by one build invocation, discarded afterwards.
struct BuildState<'a> {
    tree: CallTree,
    node_map: HashMap<SymbolKey, NodeId>,
    cancel: &'a CancelToken,
    progress: Option<&'a Sender<BuildProgress>>,
    last_poll: Instant,
    visited: usize,
    cancelled: bool,
}

impl<'a> BuildState<'a> {
    fn new(cancel: &'a CancelToken, progress: Option<&'a Sender<BuildProgress>>) -> Self {
        Self {
            tree: CallTree::new(),
            node_map: HashMap::new(),
            cancel,
            progress,
            last_poll: Instant::now(),
            visited: 0,
            cancelled: false,
        }
    }

    /// Throttled poll: reports progress and samples the cancel flag at
    /// most once per interval, not on every node.
    fn should_stop(&mut self, interval: Duration) -> bool {
        if self.cancelled {
            return true;
        }
        if self.last_poll.elapsed() >= interval {
            self.last_poll = Instant::now();
            if let Some(tx) = self.progress {
                let _ = tx.send(BuildProgress {
                    visited: self.visited,
                });
            }
            if self.cancel.is_cancelled() {
                self.cancelled = true;
            }
        }
        self.cancelled
    }

    fn new_node(
        &mut self,
        symbol: Option<SymbolId>,
        name: String,
        call_line: u32,
        key: SymbolKey,
    ) -> NodeId {
        let id = self.tree.add_node(CallTreeNode {
            symbol,
            name,
            call_line,
            key: key.clone(),
            children: vec![],
        });
        self.node_map.insert(key, id);
        self.visited += 1;
        id
    }

    fn finish(self) -> BuildOutcome {
        BuildOutcome {
            tree: self.tree,
            status: if self.cancelled {
                BuildStatus::Cancelled
            } else {
                BuildStatus::Completed
            },
        }
    }
}

pub struct CallTreeBuilder<'d> {
    db: &'d SymbolDatabase,
    opts: BuildOptions,
}

impl<'d> CallTreeBuilder<'d> {
    pub fn new(db: &'d SymbolDatabase, opts: BuildOptions) -> Self {
        Self { db, opts }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.opts
    }

    pub fn database(&self) -> &'d SymbolDatabase {
        self.db
    }

    /// Build the call tree for the symbol at `name`/`file`/`line`.
    /// A root that cannot be located yields an empty, completed tree.
    pub fn build(
        &self,
        name: &str,
        file: &str,
        line: u32,
        cancel: &CancelToken,
        progress: Option<&Sender<BuildProgress>>,
    ) -> BuildOutcome {
        match self.db.find_at(name, file, line) {
            Some(root) => self.build_root(root, cancel, progress),
            None => BuildOutcome::empty(),
        }
    }

    /// Build the call tree rooted at a known symbol id.
    pub fn build_root(
        &self,
        root: SymbolId,
        cancel: &CancelToken,
        progress: Option<&Sender<BuildProgress>>,
    ) -> BuildOutcome {
        let Some(record) = self.db.get(root) else {
            return BuildOutcome::empty();
        };
        let mut state = BuildState::new(cancel, progress);
        let node = state.new_node(
            Some(root),
            record.name.clone(),
            record.line_start,
            record.key(),
        );
        state.tree.root = Some(node);
        self.expand(root, node, 1, &mut state);
        state.finish()
    }

    /// Build the reverse ("who calls this") tree for a symbol.
    /// Children of a node are its callers.
    pub fn build_called_by(
        &self,
        name: &str,
        file: &str,
        line: u32,
        index: &CalledByIndex,
        cancel: &CancelToken,
        progress: Option<&Sender<BuildProgress>>,
    ) -> BuildOutcome {
        let Some(root) = self.db.find_at(name, file, line) else {
            return BuildOutcome::empty();
        };
        let record = self.db.symbol(root);
        let mut state = BuildState::new(cancel, progress);
        let node = state.new_node(
            Some(root),
            record.name.clone(),
            record.line_start,
            record.key(),
        );
        state.tree.root = Some(node);
        self.expand_callers(root, node, 1, index, &mut state);
        state.finish()
    }

    fn expand(&self, sym: SymbolId, node: NodeId, depth: usize, state: &mut BuildState) {
        if state.should_stop(self.opts.poll_interval) {
            return;
        }
        if depth > self.opts.max_depth {
            return;
        }

        let visible = self.collect_use_modules(sym);
        let record = self.db.symbol(sym);

        for call in &record.calls {
            let lowered = call.name.to_ascii_lowercase();
            if self.opts.keywords.contains(&lowered) {
                continue;
            }

            match self.resolve(sym, call, &visible) {
                Some(target) => {
                    let target_rec = self.db.symbol(target);
                    let key = target_rec.key();
                    if let Some(&existing) = state.node_map.get(&key) {
                        // Already in this build: link and stop descending.
                        // This is what halts call cycles.
                        state.tree.add_child(node, existing);
                        continue;
                    }
                    let child =
                        state.new_node(Some(target), target_rec.name.clone(), call.line, key);
                    state.tree.add_child(node, child);
                    self.expand(target, child, depth + 1, state);
                    if state.cancelled {
                        return;
                    }
                }
                None => {
                    // External or unanalyzed library call: shown as a
                    // leaf, keyed by its call site, never expanded.
                    let key = SymbolKey {
                        line_start: call.line,
                        name: lowered,
                        file: record.file.clone(),
                    };
                    if let Some(&existing) = state.node_map.get(&key) {
                        state.tree.add_child(node, existing);
                        continue;
                    }
                    let child = state.new_node(None, call.name.clone(), call.line, key);
                    state.tree.add_child(node, child);
                }
            }
        }
    }

    fn expand_callers(
        &self,
        sym: SymbolId,
        node: NodeId,
        depth: usize,
        index: &CalledByIndex,
        state: &mut BuildState,
    ) {
        if state.should_stop(self.opts.poll_interval) {
            return;
        }
        if depth > self.opts.max_depth {
            return;
        }

        let target_name = self.db.symbol(sym).name.clone();
        for &caller in index.callers_of(&target_name) {
            let rec = self.db.symbol(caller);
            let key = rec.key();
            if let Some(&existing) = state.node_map.get(&key) {
                state.tree.add_child(node, existing);
                continue;
            }
            let line = rec
                .calls
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(&target_name))
                .map(|c| c.line)
                .unwrap_or(rec.line_start);
            let child = state.new_node(Some(caller), rec.name.clone(), line, key);
            state.tree.add_child(node, child);
            self.expand_callers(caller, child, depth + 1, index, state);
            if state.cancelled {
                return;
            }
        }
    }

    /// Modules visible from `sym` through its own and its ancestors'
    /// `use` statements, transitively, in collection order. Intrinsic
    /// modules are skipped.
    fn collect_use_modules(&self, sym: SymbolId) -> Vec<SymbolId> {
        let mut queue: VecDeque<String> = VecDeque::new();
        for scope in self.db.scope_chain(sym) {
            for used in &self.db.symbol(scope).use_modules {
                queue.push_back(used.clone());
            }
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut out = Vec::new();
        while let Some(name) = queue.pop_front() {
            let lowered = name.to_ascii_lowercase();
            if self.opts.intrinsic_modules.contains(&lowered) || !seen.insert(lowered.clone()) {
                continue;
            }
            if let Some(module) = self.db.module_by_name(&lowered) {
                out.push(module);
                for used in &self.db.symbol(module).use_modules {
                    queue.push_back(used.clone());
                }
            }
        }
        out
    }

    /// Resolve one call reference to a declared symbol, or None for an
    /// unresolved external call.
    fn resolve(
        &self,
        scope: SymbolId,
        call: &CallReference,
        visible: &[SymbolId],
    ) -> Option<SymbolId> {
        match CallShape::of(call) {
            CallShape::TypeBound { type_name } => {
                self.resolve_type_bound(scope, type_name, &call.name, visible)
            }
            CallShape::Plain => self.resolve_plain(scope, &call.name, call.arg_count, visible),
        }
    }

    /// Plain name lookup: enclosing scopes, then used modules in
    /// collection order, then globally. First match wins.
    fn resolve_plain(
        &self,
        scope: SymbolId,
        name: &str,
        arg_count: Option<usize>,
        visible: &[SymbolId],
    ) -> Option<SymbolId> {
        for s in self.db.scope_chain(scope) {
            if let Some(found) = self.db.find_child_callable(s, name) {
                return self.disambiguate(found, arg_count);
            }
        }
        for &module in visible {
            if let Some(found) = self.db.find_child_callable(module, name) {
                return self.disambiguate(found, arg_count);
            }
        }
        for id in self.db.find_by_name(name) {
            if self.db.symbol(id).kind.is_callable() {
                return self.disambiguate(id, arg_count);
            }
        }
        None
    }

    /// An interface block is a set of candidate procedures; pick the
    /// first with a matching argument count. Arity-only, declaration
    /// order: two candidates sharing a count resolve to the earlier one.
    fn disambiguate(&self, found: SymbolId, arg_count: Option<usize>) -> Option<SymbolId> {
        if self.db.symbol(found).kind != SymbolKind::Interface {
            return Some(found);
        }
        let members: Vec<SymbolId> = self
            .db
            .symbol(found)
            .children
            .iter()
            .copied()
            .filter(|&m| self.db.symbol(m).kind.is_procedure())
            .collect();
        match arg_count {
            Some(n) => members
                .into_iter()
                .find(|&m| self.db.symbol(m).args.len() == n),
            None => members.first().copied(),
        }
    }

    /// Resolve a `var%proc` access through the receiver type's binding
    /// table, walking the `extends` chain upward until a binding is
    /// found or the chain ends.
    fn resolve_type_bound(
        &self,
        scope: SymbolId,
        type_name: &str,
        binding_name: &str,
        visible: &[SymbolId],
    ) -> Option<SymbolId> {
        let mut current = self.lookup_type(scope, type_name, visible)?;
        let mut walked: HashSet<SymbolId> = HashSet::new();
        loop {
            if !walked.insert(current) {
                // Cyclic extends chain in a malformed database.
                return None;
            }
            let type_rec = self.db.symbol(current);
            let binding = type_rec.children.iter().copied().find(|&c| {
                let child = self.db.symbol(c);
                child.kind == SymbolKind::TypeBoundProcedure && child.named(binding_name)
            });
            if let Some(binding) = binding {
                let bind_rec = self.db.symbol(binding);
                let target = bind_rec
                    .bind_target
                    .clone()
                    .unwrap_or_else(|| bind_rec.name.clone());
                // The implementation lives in the type's enclosing
                // scope (usually its module) or somewhere visible.
                let impl_scope = type_rec.parent.unwrap_or(current);
                return self.resolve_plain(impl_scope, &target, None, visible);
            }
            let parent_name = type_rec.extends.clone()?;
            current = self.lookup_type(scope, &parent_name, visible)?;
        }
    }

    /// Find a derived type by name: enclosing scopes, used modules,
    /// then globally.
    fn lookup_type(
        &self,
        scope: SymbolId,
        type_name: &str,
        visible: &[SymbolId],
    ) -> Option<SymbolId> {
        let is_type = |id: &&SymbolId| self.db.symbol(**id).kind == SymbolKind::DerivedType;
        for s in self.db.scope_chain(scope) {
            if let Some(&found) = self
                .db
                .symbol(s)
                .children
                .iter()
                .filter(|c| self.db.symbol(**c).named(type_name))
                .find(is_type)
            {
                return Some(found);
            }
        }
        for &module in visible {
            if let Some(&found) = self
                .db
                .symbol(module)
                .children
                .iter()
                .filter(|c| self.db.symbol(**c).named(type_name))
                .find(is_type)
            {
                return Some(found);
            }
        }
        self.db.type_by_name(type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn default_options_skip_intrinsic_modules() {
        let opts = BuildOptions::default();
        assert!(opts.intrinsic_modules.contains("iso_c_binding"));
        assert!(opts.intrinsic_modules.contains("iso_fortran_env"));
        assert!(!opts.intrinsic_modules.contains("my_module"));
    }
}
