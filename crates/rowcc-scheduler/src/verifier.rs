//! Conflict-serializability verification

use crate::dependency::ConflictGraph;
use rowcc_metrics::{timed, Metrics, Timer};
use rowcc_primitives::TxId;
use rowcc_types::Operation;
use std::fmt;
use std::sync::Arc;

/// Judgment on an execution history
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// The history is equivalent to running the transactions serially in
    /// `order`
    Serializable {
        /// A topological order of the conflict graph
        order: Vec<TxId>,
    },
    /// The conflict graph has a cycle
    NotSerializable {
        /// One cycle, first transaction repeated at the end
        cycle: Vec<TxId>,
    },
}

impl Verdict {
    /// Whether the history is conflict-serializable
    pub fn is_serializable(&self) -> bool {
        matches!(self, Verdict::Serializable { .. })
    }

    /// Equivalent serial order, if serializable
    pub fn order(&self) -> Option<&[TxId]> {
        match self {
            Verdict::Serializable { order } => Some(order),
            Verdict::NotSerializable { .. } => None,
        }
    }

    /// Witness cycle, if not serializable
    pub fn cycle(&self) -> Option<&[TxId]> {
        match self {
            Verdict::Serializable { .. } => None,
            Verdict::NotSerializable { cycle } => Some(cycle),
        }
    }
}

fn join<F>(ids: &[TxId], f: &mut fmt::Formatter<'_>, item: F) -> fmt::Result
where
    F: Fn(&TxId, &mut fmt::Formatter<'_>) -> fmt::Result,
{
    for (i, id) in ids.iter().enumerate() {
        if i > 0 {
            f.write_str(" -> ")?;
        }
        item(id, f)?;
    }
    Ok(())
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Serializable { order } => {
                f.write_str("This execution is equivalent to a serial execution of: ")?;
                join(order, f, |id, f| write!(f, "Transaction {}", id.as_u32()))
            }
            Verdict::NotSerializable { cycle } => {
                f.write_str("This is not a serializable execution")?;
                if !cycle.is_empty() {
                    f.write_str(" (cycle: ")?;
                    join(cycle, f, |id, f| write!(f, "{}", id))?;
                    f.write_str(")")?;
                }
                Ok(())
            }
        }
    }
}

/// Checks histories for conflict-serializability
#[derive(Clone, Debug, Default)]
pub struct SerializabilityVerifier {
    metrics: Option<Arc<Metrics>>,
}

impl SerializabilityVerifier {
    /// Create a verifier
    pub fn new() -> Self {
        Self::default()
    }

    /// Record conflict-graph build times into `metrics`
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Judge `log`
    pub fn verify(&self, log: &[Operation]) -> Verdict {
        self.verify_with_graph(log).1
    }

    /// Judge `log`, also returning the conflict graph it was judged on
    pub fn verify_with_graph(&self, log: &[Operation]) -> (ConflictGraph, Verdict) {
        let graph = match &self.metrics {
            Some(metrics) => timed!(metrics, Timer::GraphBuild, { ConflictGraph::build(log) }),
            None => ConflictGraph::build(log),
        };
        let verdict = match graph.topological_order() {
            Ok(order) => Verdict::Serializable { order },
            Err(cycle) => Verdict::NotSerializable { cycle },
        };
        tracing::debug!(
            operations = log.len(),
            transactions = graph.len(),
            edges = graph.edge_count(),
            serializable = verdict.is_serializable(),
            "verified history"
        );
        (graph, verdict)
    }
}

/// Judge whether `log` is conflict-serializable.
///
/// Pure: the same log always yields the same verdict.
pub fn verify_serializability(log: &[Operation]) -> Verdict {
    SerializabilityVerifier::new().verify(log)
}
