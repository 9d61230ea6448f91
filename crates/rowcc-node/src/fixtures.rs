//! Demo batches and reference histories

use crate::cli::Scenario;
use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rowcc_core::{Batch, Operation, RowId, Transaction, TxId};

/// Input of one demo step
#[derive(Debug, Clone)]
pub enum Input {
    /// Run under every selected strategy, then verify the log
    Batch(Batch),
    /// Verify directly
    Log(Vec<Operation>),
}

/// A named demo step
#[derive(Debug, Clone)]
pub struct Fixture {
    /// Heading printed before the step
    pub title: String,
    /// What to run or verify
    pub input: Input,
}

impl Fixture {
    fn batch(title: &str, batch: Batch) -> Self {
        Self {
            title: title.to_string(),
            input: Input::Batch(batch),
        }
    }

    fn log(title: &str, log: Vec<Operation>) -> Self {
        Self {
            title: title.to_string(),
            input: Input::Log(log),
        }
    }
}

/// T1 = r1[x] r1[z] w1[x], T2 = r2[y] r2[z] w2[y], T3 = w3[x] r3[y] w3[z],
/// submitted as T3, T2, T1
pub fn batch_one() -> Result<Batch> {
    let (x, y, z): (usize, usize, usize) = (3, 4, 5);
    let t1 = Transaction::new(TxId::new(1)).read(x).read(z).write(x, 5);
    let t2 = Transaction::new(TxId::new(2)).read(y).read(z).write(y, 0);
    let t3 = Transaction::new(TxId::new(3)).write(x, 99).read(y).write(z, 0);
    Ok(Batch::new(vec![t3, t2, t1])?)
}

/// T1 = w1[x] w1[x], T2 = w2[x]
pub fn batch_two() -> Result<Batch> {
    let x: usize = 3;
    let t1 = Transaction::new(TxId::new(1)).write(x, 0).write(x, 0);
    let t2 = Transaction::new(TxId::new(2)).write(x, 99);
    Ok(Batch::new(vec![t1, t2])?)
}

/// w1[3] w2[3] w1[3]
pub fn cyclic_log() -> Vec<Operation> {
    let row = RowId::new(3);
    vec![
        Operation::write(TxId::new(1), row, 0),
        Operation::write(TxId::new(2), row, 5),
        Operation::write(TxId::new(1), row, 99),
    ]
}

/// w3[x] r1[x] r3[y] r2[y] w3[z] r2[z] r1[z] w2[y] w1[x]
pub fn acyclic_log() -> Vec<Operation> {
    let (x, y, z) = (RowId::new(1), RowId::new(2), RowId::new(3));
    let (t1, t2, t3) = (TxId::new(1), TxId::new(2), TxId::new(3));
    vec![
        Operation::write(t3, x, 0),
        Operation::read(t1, x),
        Operation::read(t3, y),
        Operation::read(t2, y),
        Operation::write(t3, z, 0),
        Operation::read(t2, z),
        Operation::read(t1, z),
        Operation::write(t2, y, 0),
        Operation::write(t1, x, 0),
    ]
}

/// Reproducible random batch: ids `1..=transactions`, one to four
/// operations each, half of them writes
pub fn random_batch(seed: u64, transactions: u32, row_count: usize) -> Result<Batch> {
    let mut rng = StdRng::seed_from_u64(seed);
    let txs = (1..=transactions)
        .map(|id| {
            let ops = rng.gen_range(1..=4);
            (0..ops).fold(Transaction::new(TxId::new(id)), |tx, _| {
                let row = rng.gen_range(0..row_count);
                if rng.gen_bool(0.5) {
                    tx.write(row, rng.gen_range(0..1000))
                } else {
                    tx.read(row)
                }
            })
        })
        .collect();
    Ok(Batch::new(txs)?)
}

/// Demo steps for `scenario`
pub fn fixtures(scenario: Scenario, seed: u64, transactions: u32, row_count: usize) -> Result<Vec<Fixture>> {
    let mut steps = Vec::new();
    if matches!(scenario, Scenario::All | Scenario::Batch1) {
        steps.push(Fixture::batch("Test 1", batch_one()?));
    }
    if matches!(scenario, Scenario::All | Scenario::Batch2) {
        steps.push(Fixture::batch("Test 2", batch_two()?));
    }
    if matches!(scenario, Scenario::All | Scenario::Logs) {
        steps.push(Fixture::log("Test 3: cyclic log", cyclic_log()));
        steps.push(Fixture::log("Test 4: acyclic log", acyclic_log()));
    }
    if scenario == Scenario::Random {
        steps.push(Fixture::batch(
            &format!("Random batch (seed {})", seed),
            random_batch(seed, transactions, row_count)?,
        ));
    }
    Ok(steps)
}
