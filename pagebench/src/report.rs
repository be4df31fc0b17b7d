use std::{
    fmt::{self, Display, Formatter},
    io::{self, Write},
};

use tracing::warn;

use crate::{
    meminfo::SystemPageInfo,
    page_size::{MaybePretty, PageSizeClass, Pretty, MB},
    plan::{Entry, Plan},
    trial::{Bench, TrialResult},
};

// used to size the reservation hint when the kernel doesn't report a huge page size
const FALLBACK_HUGE_PAGE_SIZE: usize = 2 * MB;

pub(crate) fn header(info: &SystemPageInfo, out: &mut impl Write) -> io::Result<()> {
    writeln!(
        out,
        "has huge page support: {}",
        if info.huge_pages_enabled { "on" } else { "off" }
    )?;
    writeln!(out, "huge    page size: {}", MaybePretty(info.huge_page_size))?;
    writeln!(out, "default page size: {}", Pretty(info.default_page_size))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Outcome {
    pub(crate) entry: Entry,
    pub(crate) result: TrialResult,
    // only for completed non default trials that have a completed baseline
    pub(crate) speedup: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Comparison {
    outcomes: Vec<Outcome>,
}

impl Comparison {
    pub(crate) fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    pub(crate) fn any_failed(&self) -> bool {
        self.outcomes
            .iter()
            .any(|outcome| outcome.result.cycles().is_none())
    }

    /// Returns the reservation hint if huge pages are off, a trial failed or verbose output was requested.
    pub(crate) fn hint(&self, info: &SystemPageInfo, total_size: usize, verbose: bool) -> Option<Hint> {
        if verbose || !info.huge_pages_enabled || self.any_failed() {
            Some(Hint::new(total_size, info.huge_page_size))
        } else {
            None
        }
    }

    pub(crate) fn summary(&self) -> Summary<'_> {
        Summary(&self.outcomes)
    }
}

/// Runs every trial of the plan in order, printing status lines to `out` as they complete.
pub(crate) fn compare(plan: &Plan, bench: &mut impl Bench, out: &mut impl Write) -> io::Result<Comparison> {
    let mut baseline = None;
    let mut outcomes = Vec::with_capacity(plan.len());
    for entry in plan.iter() {
        let size = MaybePretty(entry.page_size);
        writeln!(out, "testing {} pagesize {}..", entry.label, size)?;
        out.flush()?;
        let result = bench.run(entry.class);
        let speedup = match result {
            TrialResult::Completed { cycles, checksum, .. } => {
                writeln!(out, "Cycles for {} = {}  char sum {}", size, cycles, checksum)?;
                if entry.is_baseline() {
                    baseline = Some(cycles);
                    writeln!(out, "default page size took {} cycles", cycles)?;
                    None
                } else {
                    let speedup = baseline.map(|baseline| speedup(baseline, cycles));
                    match speedup {
                        Some(speedup) => writeln!(
                            out,
                            "{} took {} cycles: speedup = {:.3}",
                            describe(entry),
                            cycles,
                            speedup
                        )?,
                        None => writeln!(out, "{} took {} cycles", describe(entry), cycles)?,
                    }
                    speedup
                }
            }
            TrialResult::NotHonored => {
                warn!("allocation with {} pages was not honored", size);
                writeln!(out, "{} pages were not honored", size)?;
                None
            }
        };
        outcomes.push(Outcome {
            entry: *entry,
            result,
            speedup,
        });
    }
    Ok(Comparison { outcomes })
}

pub(crate) fn speedup(baseline: u64, candidate: u64) -> f64 {
    baseline as f64 / candidate.max(1) as f64
}

fn describe(entry: &Entry) -> &'static str {
    match entry.class {
        PageSizeClass::Default => "default page size",
        PageSizeClass::HugeDefault => "default huge page",
        _ => "huge page size",
    }
}

/// Suggests how many huge pages to reserve to fit the whole mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Hint {
    pages: usize,
}

impl Hint {
    pub(crate) fn new(total_size: usize, huge_page_size: Option<usize>) -> Self {
        let huge_page_size = huge_page_size.unwrap_or(FALLBACK_HUGE_PAGE_SIZE);
        Hint {
            pages: total_size.div_ceil(huge_page_size),
        }
    }

    pub(crate) fn pages(&self) -> usize {
        self.pages
    }
}

impl Display for Hint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "check/test if huge pages are possible with:")?;
        writeln!(f, "  echo {} | sudo tee /proc/sys/vm/nr_hugepages", self.pages)?;
        writeln!(f, "or")?;
        writeln!(f, "  sudo sysctl -w vm.nr_hugepages={}", self.pages)
    }
}

pub(crate) struct Summary<'a>(&'a [Outcome]);

impl Display for Summary<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return Ok(());
        }
        writeln!(
            f,
            "{:<6} | {:<15} | {:<10} | {:<15} | {:<15} | {:<10}",
            "test", "class", "page size", "cycles", "wall", "speedup"
        )?;
        for outcome in self.0 {
            let class: &str = outcome.entry.class.into();
            let page_size = MaybePretty(outcome.entry.page_size).to_string();
            match outcome.result {
                TrialResult::Completed { cycles, wall, .. } => {
                    let wall = humantime::format_duration(wall).to_string();
                    let speedup = outcome.speedup.map_or_else(|| "-".to_string(), |s| format!("{:.3}", s));
                    writeln!(
                        f,
                        "{:<6} | {:<15} | {:<10} | {:<15} | {:<15} | {:<10}",
                        outcome.entry.test, class, page_size, cycles, wall, speedup
                    )?;
                }
                TrialResult::NotHonored => {
                    writeln!(
                        f,
                        "{:<6} | {:<15} | {:<10} | {:<15} | {:<15} | {:<10}",
                        outcome.entry.test, class, page_size, "not honored", "-", "-"
                    )?;
                }
            }
        }
        Ok(())
    }
}
