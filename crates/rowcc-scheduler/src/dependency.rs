//! Conflict graph for execution histories
//!
//! Builds the precedence graph of a log: an edge `Ti -> Tj` for every pair
//! of conflicting operations where `Ti`'s comes first.

use rowcc_primitives::{RowId, TxId};
use rowcc_types::{OpKind, Operation};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};
use std::fmt;

/// Kind of conflict that induced an edge
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConflictKind {
    /// Write followed by a read of the same row
    WriteRead,
    /// Write followed by a write of the same row
    WriteWrite,
    /// Read followed by a write of the same row
    ReadWrite,
}

impl ConflictKind {
    /// Kind of conflict between an earlier and a later access, if any
    pub fn between(earlier: OpKind, later: OpKind) -> Option<Self> {
        match (earlier, later) {
            (OpKind::Write, OpKind::Read) => Some(ConflictKind::WriteRead),
            (OpKind::Write, OpKind::Write) => Some(ConflictKind::WriteWrite),
            (OpKind::Read, OpKind::Write) => Some(ConflictKind::ReadWrite),
            (OpKind::Read, OpKind::Read) => None,
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::WriteRead => f.write_str("wr"),
            ConflictKind::WriteWrite => f.write_str("ww"),
            ConflictKind::ReadWrite => f.write_str("rw"),
        }
    }
}

/// Edge of the conflict graph, with the first conflict that induced it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConflictEdge {
    /// Transaction whose operation came first
    pub from: TxId,
    /// Transaction whose operation came later
    pub to: TxId,
    /// Conflict kind
    pub kind: ConflictKind,
    /// Row both operations touched
    pub row: RowId,
}

impl fmt::Display for ConflictEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({} on {})", self.from, self.to, self.kind, self.row)
    }
}

/// Transaction precedence graph
///
/// Nodes are every transaction id appearing in the log, including ones
/// with no conflicts.
#[derive(Clone, Debug, Default)]
pub struct ConflictGraph {
    nodes: BTreeSet<TxId>,
    /// Forward edges: tx -> transactions that must follow it
    forward: BTreeMap<TxId, BTreeSet<TxId>>,
    /// Backward edges: tx -> transactions that must precede it
    backward: BTreeMap<TxId, BTreeSet<TxId>>,
    edges: BTreeMap<(TxId, TxId), ConflictEdge>,
}

impl ConflictGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the conflict graph of `log`.
    ///
    /// Conflicts only exist between operations on the same row, so the log
    /// is grouped by row and every ordered pair within a group is compared.
    /// This yields exactly the edges of a full pairwise scan.
    pub fn build(log: &[Operation]) -> Self {
        let mut graph = Self::new();
        let mut by_row: BTreeMap<RowId, Vec<&Operation>> = BTreeMap::new();

        for op in log {
            graph.add_transaction(op.tx_id());
            by_row.entry(op.row()).or_default().push(op);
        }

        for (row, ops) in by_row {
            for (i, earlier) in ops.iter().enumerate() {
                for later in ops[i + 1..].iter().filter(|later| earlier.conflicts_with(later)) {
                    if let Some(kind) = ConflictKind::between(earlier.kind(), later.kind()) {
                        graph.add_edge(ConflictEdge {
                            from: earlier.tx_id(),
                            to: later.tx_id(),
                            kind,
                            row,
                        });
                    }
                }
            }
        }
        graph
    }

    /// Register a transaction node
    pub fn add_transaction(&mut self, tx: TxId) {
        self.nodes.insert(tx);
    }

    /// Add an edge; the first edge recorded for a pair is kept as witness
    pub fn add_edge(&mut self, edge: ConflictEdge) {
        self.nodes.insert(edge.from);
        self.nodes.insert(edge.to);
        self.forward.entry(edge.from).or_default().insert(edge.to);
        self.backward.entry(edge.to).or_default().insert(edge.from);
        self.edges.entry((edge.from, edge.to)).or_insert(edge);
    }

    /// Every node, ascending
    pub fn nodes(&self) -> impl Iterator<Item = TxId> + '_ {
        self.nodes.iter().copied()
    }

    /// Every edge, ordered by `(from, to)`
    pub fn edges(&self) -> impl Iterator<Item = &ConflictEdge> + '_ {
        self.edges.values()
    }

    /// Edge `from -> to`, if present
    pub fn edge(&self, from: TxId, to: TxId) -> Option<&ConflictEdge> {
        self.edges.get(&(from, to))
    }

    /// Whether `from -> to` exists
    pub fn has_edge(&self, from: TxId, to: TxId) -> bool {
        self.edges.contains_key(&(from, to))
    }

    /// Transactions that must follow `tx`
    pub fn successors(&self, tx: TxId) -> impl Iterator<Item = TxId> + '_ {
        self.forward.get(&tx).into_iter().flatten().copied()
    }

    /// Transactions that must precede `tx`
    pub fn predecessors(&self, tx: TxId) -> impl Iterator<Item = TxId> + '_ {
        self.backward.get(&tx).into_iter().flatten().copied()
    }

    /// Number of transactions that must precede `tx`
    pub fn in_degree(&self, tx: TxId) -> usize {
        self.backward.get(&tx).map_or(0, |deps| deps.len())
    }

    /// Order the nodes with Kahn's algorithm.
    ///
    /// Among ready nodes the smallest transaction id goes first, so the
    /// result depends only on the graph. Returns one cycle (first node
    /// repeated at the end) if the graph is cyclic.
    pub fn topological_order(&self) -> Result<Vec<TxId>, Vec<TxId>> {
        let mut in_degree: BTreeMap<TxId, usize> =
            self.nodes.iter().map(|tx| (*tx, self.in_degree(*tx))).collect();
        let mut ready: BinaryHeap<Reverse<TxId>> = in_degree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(tx, _)| Reverse(*tx))
            .collect();

        if ready.is_empty() && !self.nodes.is_empty() {
            // no valid starting point
            return Err(self.find_cycle(&self.nodes));
        }

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(Reverse(tx)) = ready.pop() {
            order.push(tx);
            for next in self.successors(tx) {
                if let Some(deg) = in_degree.get_mut(&next) {
                    *deg -= 1;
                    if *deg == 0 {
                        ready.push(Reverse(next));
                    }
                }
            }
        }

        if order.len() == self.nodes.len() {
            return Ok(order);
        }
        let residual: BTreeSet<TxId> = in_degree
            .into_iter()
            .filter(|(_, deg)| *deg > 0)
            .map(|(tx, _)| tx)
            .collect();
        Err(self.find_cycle(&residual))
    }

    /// Walk predecessors inside `residual` until a node repeats.
    ///
    /// Every node left after Kahn's algorithm stalls has a predecessor that
    /// was also left, so the walk always closes a cycle.
    fn find_cycle(&self, residual: &BTreeSet<TxId>) -> Vec<TxId> {
        let Some(&start) = residual.iter().next() else {
            return Vec::new();
        };
        let mut path = vec![start];
        let mut position: BTreeMap<TxId, usize> = BTreeMap::from([(start, 0)]);
        let mut current = start;

        loop {
            let Some(pred) = self.predecessors(current).find(|p| residual.contains(p)) else {
                return path;
            };
            if let Some(&i) = position.get(&pred) {
                // edges run pred -> current, so the walk is reversed
                let mut cycle: Vec<TxId> = path[i..].iter().rev().copied().collect();
                cycle.insert(0, pred);
                return cycle;
            }
            position.insert(pred, path.len());
            path.push(pred);
            current = pred;
        }
    }

    /// Number of transactions
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no node
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of distinct edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
