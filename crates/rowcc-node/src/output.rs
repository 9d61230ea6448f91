//! Output formatting

use rowcc_core::{Operation, RunReport, Strategy, Value, Verdict};
use std::fmt::Write;

/// Heading for a demo step
pub fn heading(title: &str) -> String {
    format!("========== {} ==========", title)
}

/// Executed history, one operation per line
pub fn history(log: &[Operation]) -> String {
    let mut out = String::new();
    for op in log {
        let _ = writeln!(out, "  {}", op);
    }
    out
}

/// One-line summary of a run
pub fn run_summary(strategy: Strategy, report: &RunReport) -> String {
    let mut line = format!(
        "{}: {} committed, {} aborted, {} operations in {:?}",
        strategy,
        report.committed(),
        report.aborted(),
        report.operations_executed,
        report.elapsed
    );
    for err in &report.errors {
        let _ = write!(line, "\n  error: {}", err);
    }
    line
}

/// Values of the rows touched by a history
pub fn touched_rows(log: &[Operation], rows: &[Value]) -> String {
    let mut touched: Vec<usize> = log.iter().map(|op| op.row().index()).collect();
    touched.sort_unstable();
    touched.dedup();
    touched
        .into_iter()
        .filter_map(|row| rows.get(row).map(|value| format!("row {} = {}", row, value)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Print everything about one strategy run
pub fn print_run(strategy: Strategy, report: &RunReport, log: &[Operation], rows: &[Value], verdict: &Verdict) {
    println!("{}", run_summary(strategy, report));
    print!("{}", history(log));
    println!("  final: {}", touched_rows(log, rows));
    println!("{}", verdict);
}
