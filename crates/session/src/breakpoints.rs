use std::collections::{BTreeSet, HashMap};
use xdbg_types::{BreakpointStatus, Line};

/// A mapping from normalized absolute file path to a set of line numbers
/// (§3). Setting breakpoints for a file replaces prior entries.
#[derive(Debug, Default)]
pub struct BreakpointTable {
    by_file: HashMap<String, BTreeSet<Line>>,
    /// Lines the instrumentation pass actually mapped to a probe, per file.
    /// Used to decide `verified` when breakpoints are (re)set.
    instrumented_lines: HashMap<String, BTreeSet<Line>>,
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}

impl BreakpointTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records which lines the instrumentation pass mapped to a probe for
    /// `file`, so subsequent `set` calls can report `verified` correctly.
    pub fn record_instrumented_lines(&mut self, file: &str, lines: BTreeSet<Line>) {
        self.instrumented_lines.insert(normalize(file), lines);
    }

    /// Replaces the breakpoint set for `file` and reports each line's
    /// verification status.
    pub fn set(&mut self, file: &str, lines: Vec<Line>) -> Vec<BreakpointStatus> {
        let file = normalize(file);
        let instrumented = self.instrumented_lines.get(&file).cloned().unwrap_or_default();
        let statuses: Vec<BreakpointStatus> = lines
            .iter()
            .map(|&line| BreakpointStatus {
                line,
                verified: instrumented.contains(&line),
            })
            .collect();
        self.by_file.insert(file, lines.into_iter().collect());
        statuses
    }

    pub fn contains(&self, file: &str, line: Line) -> bool {
        self.by_file
            .get(&normalize(file))
            .is_some_and(|lines| lines.contains(&line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_verified_only_for_instrumented_lines() {
        let mut table = BreakpointTable::new();
        table.record_instrumented_lines("/a.xsl", BTreeSet::from([3, 5]));
        let statuses = table.set("/a.xsl", vec![3, 4, 5]);
        assert_eq!(statuses[0], BreakpointStatus { line: 3, verified: true });
        assert_eq!(statuses[1], BreakpointStatus { line: 4, verified: false });
        assert_eq!(statuses[2], BreakpointStatus { line: 5, verified: true });
    }

    #[test]
    fn normalizes_path_separators() {
        let mut table = BreakpointTable::new();
        table.set(r"C:\stylesheets\a.xsl", vec![10]);
        assert!(table.contains("C:/stylesheets/a.xsl", 10));
    }
}
