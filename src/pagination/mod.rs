//! Page layout over a filtered view.
//!
//! Without collapse, page `n` is simply the `n`-th block of `page_size`
//! records. With collapse, a page is a span of records whose collapsed rows
//! come close to `page_size`, and page `n` can only be computed once page
//! `n - 1` is known because it starts where that page ends.

pub mod task;

use crate::collapse::CollapseEngine;
use crate::record::SharedRecord;
use serde::Serialize;
use std::collections::BTreeMap;

/// Growth passes when a collapsed span still shows too few rows.
const MAX_GROWTH_ATTEMPTS: usize = 5;
/// A page never spans more than this many multiples of `page_size` records.
const MAX_SPAN_FACTOR: usize = 50;
const MIN_GROWTH_STEP: usize = 100;
const MAX_GROWTH_STEP_FACTOR: usize = 10;

/// Half-open range of view indices `start..end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

impl PageRange {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.end
    }
}

/// Computed collapse-mode pages, always a prefix `1..=k` with no holes.
#[derive(Debug, Clone, Default)]
pub struct PageTable {
    pages: BTreeMap<usize, PageRange>,
}

impl PageTable {
    pub fn get(&self, page: usize) -> Option<PageRange> {
        self.pages.get(&page).copied()
    }

    /// Record `range` for `page` if it extends the table.
    ///
    /// Rejects pages whose predecessor is unknown or whose start differs from
    /// the predecessor's end. Re-inserting a known page is a no-op.
    pub fn insert(&mut self, page: usize, range: PageRange) -> bool {
        if page == 0 {
            return false;
        }
        if let Some(existing) = self.pages.get(&page) {
            return *existing == range;
        }
        let expected_start = if page == 1 {
            0
        } else {
            match self.pages.get(&(page - 1)) {
                Some(prev) => prev.end,
                None => return false,
            }
        };
        if range.start != expected_start {
            return false;
        }
        self.pages.insert(page, range);
        true
    }

    pub fn clear(&mut self) {
        self.pages.clear();
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Highest computed page.
    pub fn last(&self) -> Option<(usize, PageRange)> {
        self.pages.iter().next_back().map(|(p, r)| (*p, *r))
    }

    pub fn page_containing(&self, index: usize) -> Option<usize> {
        self.pages
            .iter()
            .find(|(_, range)| range.contains(index))
            .map(|(page, _)| *page)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageCount {
    pub pages: usize,
    /// True while later pages are not computed yet, or when the count is
    /// derived from the file size rather than from buffered records.
    pub estimated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JumpResolution {
    pub page: usize,
    /// False when the line is not in the view and the page is only a guess
    /// from its line number.
    pub exact: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagePlanner {
    page_size: usize,
}

impl PagePlanner {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Plain page `page` of a view with `len` records.
    pub fn uniform_range(&self, page: usize, len: usize) -> PageRange {
        let start = page.saturating_sub(1).saturating_mul(self.page_size).min(len);
        PageRange {
            start,
            end: start.saturating_add(self.page_size).min(len),
        }
    }

    /// The page that starts at view index `start`.
    ///
    /// With an engine the span grows until its collapsed rows reach
    /// `page_size`, the view ends, the span exceeds `50 * page_size` records
    /// or five growth passes have run. Each pass grows the span in proportion
    /// to the missing rows and the observed records-per-row ratio.
    pub fn plan_from(
        &self,
        start: usize,
        view: &[SharedRecord],
        engine: Option<&CollapseEngine>,
    ) -> PageRange {
        let len = view.len();
        let start = start.min(len);
        let mut end = start.saturating_add(self.page_size).min(len);

        let Some(engine) = engine else {
            return PageRange { start, end };
        };

        let target = self.page_size;
        let max_span = self.page_size.saturating_mul(MAX_SPAN_FACTOR);
        let max_step = self.page_size.saturating_mul(MAX_GROWTH_STEP_FACTOR);
        let mut attempts = 0;

        while end < len && attempts < MAX_GROWTH_ATTEMPTS {
            if end - start > max_span {
                break;
            }
            let rows = engine.display_count(&view[start..end]);
            if rows >= target {
                break;
            }

            let span = (end - start) as f64;
            let ratio = if rows > 0 { span / rows as f64 } else { 1.0 };
            let factor = if ratio > 50.0 {
                1.0
            } else if ratio > 10.0 {
                0.8
            } else {
                0.5
            };
            let step = ((target - rows) as f64 * ratio * factor).ceil() as usize;
            // The upper bound wins, so pages under 10 rows grow by less than 100.
            let step = step.max(MIN_GROWTH_STEP).min(max_step);

            end = end.saturating_add(step).min(len);
            attempts += 1;
        }

        PageRange { start, end }
    }

    /// Compute `page` and any missing predecessors, in order.
    ///
    /// Returns `None` when `page` lies beyond the end of the view.
    pub fn ensure_page(
        &self,
        table: &mut PageTable,
        page: usize,
        view: &[SharedRecord],
        engine: &CollapseEngine,
    ) -> Option<PageRange> {
        if page == 0 {
            return None;
        }
        if let Some(range) = table.get(page) {
            return Some(range);
        }

        let (mut next_page, mut start) = match table.last() {
            Some((last, range)) => (last + 1, range.end),
            None => (1, 0),
        };

        while next_page <= page {
            if start >= view.len() && next_page > 1 {
                return None;
            }
            let range = self.plan_from(start, view, Some(engine));
            table.insert(next_page, range);
            start = range.end;
            next_page += 1;
        }

        table.get(page)
    }

    /// Range of `page` in the current mode.
    ///
    /// In collapse mode missing predecessors are computed first.
    pub fn page_range(
        &self,
        table: &mut PageTable,
        page: usize,
        view: &[SharedRecord],
        engine: Option<&CollapseEngine>,
    ) -> Option<PageRange> {
        match engine {
            Some(engine) => self.ensure_page(table, page, view, engine),
            None => {
                let count = self.plain_page_count(view.len());
                (page >= 1 && page <= count).then(|| self.uniform_range(page, view.len()))
            }
        }
    }

    fn plain_page_count(&self, len: usize) -> usize {
        len.div_ceil(self.page_size).max(1)
    }

    /// Page count for the current mode.
    ///
    /// `file_lines` is the file's total line count when the buffer holds
    /// only a slice of an unfiltered file; the count is then derived from it
    /// and marked estimated.
    pub fn page_count(
        &self,
        table: &PageTable,
        view_len: usize,
        collapsed: bool,
        file_lines: Option<usize>,
    ) -> PageCount {
        if let Some(total) = file_lines {
            return PageCount {
                pages: self.plain_page_count(total),
                estimated: true,
            };
        }
        if !collapsed {
            return PageCount {
                pages: self.plain_page_count(view_len),
                estimated: false,
            };
        }
        match table.last() {
            None => PageCount {
                pages: self.plain_page_count(view_len),
                estimated: view_len > 0,
            },
            Some((page, range)) if range.end >= view_len => PageCount {
                pages: page,
                estimated: false,
            },
            Some((page, _)) => PageCount {
                pages: page + 1,
                estimated: true,
            },
        }
    }

    /// Page showing `line_number`.
    ///
    /// A line outside the view resolves to the page its line number would
    /// fall on with plain paging, flagged as inexact.
    pub fn resolve_line(
        &self,
        table: &mut PageTable,
        view: &[SharedRecord],
        line_number: usize,
        engine: Option<&CollapseEngine>,
    ) -> JumpResolution {
        let position = view
            .binary_search_by_key(&line_number, |r| r.line_number)
            .ok();

        let Some(index) = position else {
            return JumpResolution {
                page: line_number.div_ceil(self.page_size).max(1),
                exact: false,
            };
        };

        let Some(engine) = engine else {
            return JumpResolution {
                page: index / self.page_size + 1,
                exact: true,
            };
        };

        if let Some(page) = table.page_containing(index) {
            return JumpResolution { page, exact: true };
        }

        let mut page = table.last().map_or(1, |(p, _)| p + 1);
        while let Some(range) = self.ensure_page(table, page, view, engine) {
            if range.contains(index) {
                return JumpResolution { page, exact: true };
            }
            if range.end >= view.len() {
                break;
            }
            page += 1;
        }

        JumpResolution {
            page: index / self.page_size + 1,
            exact: false,
        }
    }
}
