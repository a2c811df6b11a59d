//! Aggregator / Reporter
//!
//! Turns task events into report lines and running totals.

use crate::dispatch::{AssetCountResult, AssetTask, TaskEvent};
use crate::provider::{Provider, Scope};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::Path;

pub const DEFAULT_REPORT_PATH: &str = "asset_count.txt";

/// Per-scope totals in first-seen order, plus the grand total
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    totals: Vec<(String, u64)>,
    index: HashMap<String, usize>,
    grand_total: u64,
}

impl Summary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `scope_id` has an entry, without changing totals
    pub fn touch(&mut self, scope_id: &str) {
        if !self.index.contains_key(scope_id) {
            self.index.insert(scope_id.to_string(), self.totals.len());
            self.totals.push((scope_id.to_string(), 0));
        }
    }

    pub fn add(&mut self, scope_id: &str, count: u64) {
        self.touch(scope_id);
        let slot = self.index[scope_id];
        self.totals[slot].1 += count;
        self.grand_total += count;
    }

    pub fn get(&self, scope_id: &str) -> Option<u64> {
        self.index.get(scope_id).map(|&slot| self.totals[slot].1)
    }

    pub fn grand_total(&self) -> u64 {
        self.grand_total
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.totals.iter().map(|(id, n)| (id.as_str(), *n))
    }

    /// Console summary printed at the end of a run
    pub fn render(&self, provider: Provider, report_path: &Path) -> String {
        let mut out = format!(
            "\nSummary of asset counts per {}:\n",
            provider.scope_label()
        );
        for (scope_id, count) in self.iter() {
            out.push_str(&format!("{}: {}\n", scope_id, count));
        }
        out.push_str(&format!("Grand Total of All Assets: {}\n", self.grand_total));
        out.push_str(&format!(
            "Asset counting complete. Detailed results are in {}\n",
            report_path.display()
        ));
        out
    }
}

/// How detail lines are arranged in the report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// One line per pair, in completion order
    Flat,
    /// One block per scope, closed by a `Total for` line
    Grouped,
}

impl From<Provider> for Layout {
    fn from(provider: Provider) -> Self {
        match provider {
            Provider::Azure => Layout::Flat,
            Provider::Gcp => Layout::Grouped,
        }
    }
}

/// Buffered lines of one scope in the grouped layout
#[derive(Debug)]
struct Block {
    scope_id: String,
    remaining: usize,
    lines: Vec<(usize, String)>,
    written: bool,
}

/// Report writer
pub struct Report<W: Write> {
    out: W,
    layout: Layout,
    summary: Summary,
    blocks: Vec<Block>,
    block_index: HashMap<String, usize>,
    /// First block not yet written; blocks go out in enumeration order
    next_block: usize,
}

impl<W: Write> Report<W> {
    /// Create a report for `scopes`, each expecting `types_per_scope` tasks.
    pub fn new(out: W, layout: Layout, scopes: &[Scope], types_per_scope: usize) -> Self {
        let mut report = Self {
            out,
            layout,
            summary: Summary::new(),
            blocks: Vec::new(),
            block_index: HashMap::new(),
            next_block: 0,
        };

        if layout == Layout::Grouped {
            for scope in scopes {
                report.summary.touch(&scope.id);
                match report.block_index.get(&scope.id) {
                    Some(&slot) => report.blocks[slot].remaining += types_per_scope,
                    None => {
                        report
                            .block_index
                            .insert(scope.id.clone(), report.blocks.len());
                        report.blocks.push(Block {
                            scope_id: scope.id.clone(),
                            remaining: types_per_scope,
                            lines: Vec::new(),
                            written: false,
                        });
                    }
                }
            }
        }

        report
    }

    pub fn record(&mut self, event: &TaskEvent) -> io::Result<()> {
        match event {
            TaskEvent::Counted(result) => self.record_result(result),
            TaskEvent::Failed { task, .. } => self.record_failure(task),
        }
    }

    pub fn record_result(&mut self, result: &AssetCountResult) -> io::Result<()> {
        let task = &result.task;
        let line = detail_line(result);

        // a scope with nothing but errors stays out of the flat summary
        if let Ok(count) = &result.outcome {
            self.summary.add(&task.scope.id, *count as u64);
        }

        match self.layout {
            Layout::Flat => writeln!(self.out, "{}", line),
            Layout::Grouped => {
                if let Some(&slot) = self.block_index.get(&task.scope.id) {
                    self.blocks[slot].lines.push((task.type_index, line));
                }
                self.complete_one(&task.scope.id)
            }
        }
    }

    /// A task that produced nothing still closes its slot in the block
    pub fn record_failure(&mut self, task: &AssetTask) -> io::Result<()> {
        match self.layout {
            Layout::Flat => Ok(()),
            Layout::Grouped => self.complete_one(&task.scope.id),
        }
    }

    fn complete_one(&mut self, scope_id: &str) -> io::Result<()> {
        let Some(&slot) = self.block_index.get(scope_id) else {
            return Ok(());
        };
        let block = &mut self.blocks[slot];
        block.remaining = block.remaining.saturating_sub(1);

        while self.next_block < self.blocks.len() && self.blocks[self.next_block].remaining == 0 {
            self.write_block(self.next_block)?;
            self.next_block += 1;
        }
        Ok(())
    }

    fn write_block(&mut self, slot: usize) -> io::Result<()> {
        let block = &mut self.blocks[slot];
        if block.written {
            return Ok(());
        }
        block.written = true;
        block.lines.sort_by_key(|(type_index, _)| *type_index);

        let total = self.summary.get(&block.scope_id).unwrap_or(0);

        for (_, line) in &block.lines {
            writeln!(self.out, "{}", line)?;
        }
        writeln!(self.out, "Total for {}: {}\n", block.scope_id, total)
    }

    /// Flush unfinished blocks, write the grand total, return the summary
    pub fn finish(mut self) -> io::Result<Summary> {
        for slot in self.next_block..self.blocks.len() {
            self.write_block(slot)?;
        }
        writeln!(
            self.out,
            "\nGrand Total of All Assets: {}",
            self.summary.grand_total()
        )?;
        self.out.flush()?;
        Ok(self.summary)
    }
}

/// `{scope}: {type} - Count: {n}` or `{scope}: {type} - {tag}`
pub fn detail_line(result: &AssetCountResult) -> String {
    let task = &result.task;
    match &result.outcome {
        Ok(count) => format!("{}: {} - Count: {}", task.scope, task.asset_type, count),
        Err(err) => format!("{}: {} - {}", task.scope, task.asset_type, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CountError;

    fn result(scope: Scope, asset_type: &str, type_index: usize, outcome: Result<usize, CountError>) -> TaskEvent {
        TaskEvent::Counted(AssetCountResult {
            task: AssetTask {
                scope,
                asset_type: asset_type.to_string(),
                type_index,
            },
            outcome,
        })
    }

    fn denied() -> CountError {
        CountError::PermissionDenied {
            detail: "AuthorizationFailed".to_string(),
        }
    }

    #[test]
    fn test_flat_layout() {
        let scopes = vec![Scope::with_group("sub", "rg")];
        let mut report = Report::new(Vec::new(), Layout::Flat, &scopes, 2);

        report.record(&result(scopes[0].clone(), "vm", 0, Ok(3))).unwrap();
        report.record(&result(scopes[0].clone(), "disk", 1, Err(denied()))).unwrap();
        let summary = report.finish().unwrap();
        assert_eq!(summary.grand_total(), 3);
        assert_eq!(summary.get("sub"), Some(3));

        let mut buf = Vec::new();
        let mut report = Report::new(&mut buf, Layout::Flat, &scopes, 2);
        report.record(&result(scopes[0].clone(), "vm", 0, Ok(3))).unwrap();
        report.record(&result(scopes[0].clone(), "disk", 1, Err(denied()))).unwrap();
        report.finish().unwrap();

        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "sub/rg: vm - Count: 3\n\
             sub/rg: disk - Permission Denied\n\
             \n\
             Grand Total of All Assets: 3\n"
        );
    }

    #[test]
    fn test_grouped_layout_orders_block_by_asset_type() {
        let scopes = vec![Scope::new("p1"), Scope::new("p2")];
        let mut buf = Vec::new();
        let mut report = Report::new(&mut buf, Layout::Grouped, &scopes, 2);

        // completion order interleaves projects and reverses types
        report.record(&result(Scope::new("p2"), "b", 1, Ok(5))).unwrap();
        report.record(&result(Scope::new("p1"), "b", 1, Ok(1))).unwrap();
        report.record(&result(Scope::new("p1"), "a", 0, Ok(2))).unwrap();
        report
            .record(&result(
                Scope::new("p2"),
                "a",
                0,
                Err(CountError::Decode {
                    detail: "eof".to_string(),
                }),
            ))
            .unwrap();
        let summary = report.finish().unwrap();

        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "p1: a - Count: 2\n\
             p1: b - Count: 1\n\
             Total for p1: 3\n\
             \n\
             p2: a - JSON decoding error\n\
             p2: b - Count: 5\n\
             Total for p2: 5\n\
             \n\
             \n\
             Grand Total of All Assets: 8\n"
        );
        assert_eq!(summary.iter().collect::<Vec<_>>(), vec![("p1", 3), ("p2", 5)]);
    }

    #[test]
    fn test_grouped_blocks_follow_enumeration_order() {
        let scopes = vec![Scope::new("p1"), Scope::new("p2")];
        let mut buf = Vec::new();
        let mut report = Report::new(&mut buf, Layout::Grouped, &scopes, 1);

        // p2 finishes first but is written after p1
        report.record(&result(Scope::new("p2"), "a", 0, Ok(7))).unwrap();
        report.record(&result(Scope::new("p1"), "a", 0, Ok(1))).unwrap();
        let summary = report.finish().unwrap();

        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "p1: a - Count: 1\n\
             Total for p1: 1\n\
             \n\
             p2: a - Count: 7\n\
             Total for p2: 7\n\
             \n\
             \n\
             Grand Total of All Assets: 8\n"
        );
        assert_eq!(summary.iter().collect::<Vec<_>>(), vec![("p1", 1), ("p2", 7)]);
    }

    #[test]
    fn test_flat_summary_skips_subscriptions_without_successes() {
        let scopes = vec![
            Scope::with_group("sub-ok", "rg"),
            Scope::with_group("sub-denied", "rg"),
        ];
        let mut buf = Vec::new();
        let mut report = Report::new(&mut buf, Layout::Flat, &scopes, 1);
        report.record(&result(scopes[1].clone(), "vm", 0, Err(denied()))).unwrap();
        report.record(&result(scopes[0].clone(), "vm", 0, Ok(2))).unwrap();
        let summary = report.finish().unwrap();

        assert_eq!(summary.iter().collect::<Vec<_>>(), vec![("sub-ok", 2)]);
        assert_eq!(summary.get("sub-denied"), None);
        assert!(String::from_utf8(buf)
            .unwrap()
            .contains("sub-denied/rg: vm - Permission Denied\n"));
    }

    #[test]
    fn test_grouped_summary_lists_projects_without_successes() {
        let scopes = vec![Scope::new("p1")];
        let mut buf = Vec::new();
        let mut report = Report::new(&mut buf, Layout::Grouped, &scopes, 1);
        report.record(&result(Scope::new("p1"), "a", 0, Err(denied()))).unwrap();
        let summary = report.finish().unwrap();

        assert_eq!(summary.iter().collect::<Vec<_>>(), vec![("p1", 0)]);
    }

    #[test]
    fn test_grouped_flushes_projects_without_asset_types() {
        let scopes = vec![Scope::new("p1")];
        let mut buf = Vec::new();
        let report = Report::new(&mut buf, Layout::Grouped, &scopes, 0);
        let summary = report.finish().unwrap();

        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "Total for p1: 0\n\n\nGrand Total of All Assets: 0\n"
        );
        assert_eq!(summary.get("p1"), Some(0));
    }

    #[test]
    fn test_failed_task_closes_block_without_line() {
        let scopes = vec![Scope::new("p1")];
        let mut buf = Vec::new();
        let mut report = Report::new(&mut buf, Layout::Grouped, &scopes, 2);
        report.record(&result(Scope::new("p1"), "a", 0, Ok(4))).unwrap();
        report
            .record(&TaskEvent::Failed {
                task: AssetTask {
                    scope: Scope::new("p1"),
                    asset_type: "b".to_string(),
                    type_index: 1,
                },
                reason: "boom".to_string(),
            })
            .unwrap();
        report.finish().unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("p1: a - Count: 4\nTotal for p1: 4\n"));
        assert!(!text.contains("p1: b"));
    }

    #[test]
    fn test_summary_render() {
        let mut summary = Summary::new();
        summary.add("sub-1", 4);
        summary.add("sub-2", 1);
        summary.add("sub-1", 2);

        let text = summary.render(Provider::Azure, Path::new("asset_count.txt"));
        assert_eq!(
            text,
            "\nSummary of asset counts per subscription:\n\
             sub-1: 6\n\
             sub-2: 1\n\
             Grand Total of All Assets: 7\n\
             Asset counting complete. Detailed results are in asset_count.txt\n"
        );
    }
}
