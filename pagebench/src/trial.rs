use std::time::{Duration, Instant};

use anyhow::{ensure, Result};
use tracing::{debug, info_span};

use crate::{
    cycles,
    meminfo::SystemPageInfo,
    page_size::PageSizeClass,
    region::Region,
    touch::{touch, zero_fill},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum TrialResult {
    Completed {
        cycles: u64,
        // sum of all touched bytes, zero unless something wrote after zero fill
        checksum: u8,
        wall: Duration,
    },
    // the kernel refused a mapping with this page size
    NotHonored,
}

impl TrialResult {
    pub(crate) fn cycles(&self) -> Option<u64> {
        match self {
            TrialResult::Completed { cycles, .. } => Some(*cycles),
            TrialResult::NotHonored => None,
        }
    }
}

pub(crate) trait Bench {
    fn run(&mut self, class: PageSizeClass) -> TrialResult;
}

/// Runs trials over the same total size, one stride per default page.
#[derive(Debug, Clone)]
pub(crate) struct CycleBench {
    total_size: usize,
    stride_count: usize,
    info: SystemPageInfo,
}

impl CycleBench {
    pub(crate) fn new(total_size: usize, info: SystemPageInfo) -> Result<Self> {
        ensure!(info.default_page_size > 0, "default page size is unknown");
        ensure!(
            total_size >= 2 * info.default_page_size,
            "total size {} must cover at least two pages of {} bytes",
            total_size,
            info.default_page_size
        );
        Ok(CycleBench {
            total_size,
            stride_count: total_size / info.default_page_size,
            info,
        })
    }

    pub(crate) fn total_size(&self) -> usize {
        self.total_size
    }

    pub(crate) fn stride_count(&self) -> usize {
        self.stride_count
    }
}

impl Bench for CycleBench {
    fn run(&mut self, class: PageSizeClass) -> TrialResult {
        run_trial(self.total_size, self.stride_count, class, &self.info)
    }
}

/// Page size the mapping for `class` will be backed with.
pub(crate) fn granule(class: PageSizeClass, info: &SystemPageInfo) -> usize {
    match class {
        PageSizeClass::Default => info.default_page_size,
        PageSizeClass::HugeDefault => info.huge_page_size.unwrap_or(info.default_page_size),
        fixed => fixed.size().unwrap_or(info.default_page_size),
    }
}

/// Maps `total_size` bytes with `class` pages, zero fills them and touches
/// `default_page_size` offsets of every stride. Timed from before the mapping
/// until after it is released.
pub(crate) fn run_trial(
    total_size: usize,
    stride_count: usize,
    class: PageSizeClass,
    info: &SystemPageInfo,
) -> TrialResult {
    let span = info_span!("trial", %class, total_size);
    let _guard = span.enter();

    assert!(stride_count > 0, "at least one stride is required");
    let stride_size = total_size / stride_count;
    let wall = Instant::now();
    let start = cycles::now();
    let mut region = match Region::map(total_size, class, granule(class, info)) {
        Ok(region) => region,
        Err(err) => {
            debug!("allocation not honored: {}", err);
            return TrialResult::NotHonored;
        }
    };
    debug_assert_eq!(region.len(), total_size);
    zero_fill(region.as_mut_slice());
    let mut checksum = 0u8;
    // offsets are bounded by the default page size, not the stride,
    // so the work stays proportional to the total size for every page size
    for offset in 0..info.default_page_size {
        checksum = checksum.wrapping_add(touch(region.as_slice(), stride_count, stride_size, offset));
    }
    region.release();
    let end = cycles::now();
    let wall = wall.elapsed();
    debug!(
        "completed in {} ({} cycles)",
        humantime::format_duration(wall),
        cycles::elapsed(start, end)
    );
    TrialResult::Completed {
        cycles: cycles::elapsed(start, end),
        checksum,
        wall,
    }
}

#[cfg(test)]
mod tests {
    use proptest::{prelude::*, test_runner::Config};

    use super::*;
    use crate::{meminfo::default_page_size, page_size::MB};

    fn info() -> SystemPageInfo {
        SystemPageInfo {
            default_page_size: default_page_size(),
            huge_pages_enabled: false,
            huge_page_size: Some(2 * MB),
        }
    }

    #[test]
    fn test_bench_rejects_small_sizes() {
        let page = default_page_size();
        assert!(CycleBench::new(0, info()).is_err());
        assert!(CycleBench::new(page, info()).is_err());
        let bench = CycleBench::new(2 * page, info()).unwrap();
        assert_eq!(bench.stride_count(), 2);
        assert_eq!(bench.total_size(), 2 * page);
    }

    #[test]
    fn test_stride_per_default_page() {
        let page = default_page_size();
        let bench = CycleBench::new(64 * page + 17, info()).unwrap();
        assert_eq!(bench.stride_count(), 64);
    }

    #[test]
    fn test_granule() {
        let info = info();
        assert_eq!(granule(PageSizeClass::Default, &info), info.default_page_size);
        assert_eq!(granule(PageSizeClass::HugeDefault, &info), 2 * MB);
        assert_eq!(granule(PageSizeClass::Huge1G, &info), 1024 * MB);
        let unknown = SystemPageInfo {
            huge_page_size: None,
            ..info
        };
        assert_eq!(granule(PageSizeClass::HugeDefault, &unknown), info.default_page_size);
    }

    #[test]
    fn test_default_trial_completes() {
        let mut bench = CycleBench::new(MB, info()).unwrap();
        match bench.run(PageSizeClass::Default) {
            TrialResult::Completed { checksum, .. } => assert_eq!(checksum, 0),
            TrialResult::NotHonored => panic!("default pages must always be honored"),
        }
    }

    #[test]
    fn test_huge_trial_never_panics() {
        // 1GB pages are rarely reserved, either outcome is valid
        let mut bench = CycleBench::new(2 * MB, info()).unwrap();
        let rst = bench.run(PageSizeClass::Huge1G);
        if let TrialResult::Completed { checksum, .. } = rst {
            assert_eq!(checksum, 0);
        }
    }

    proptest! {
        #![proptest_config(Config {
            cases: 16,
            .. Config::default()
        })]
        #[test]
        fn default_trial_is_always_honored(pages in 2usize..256) {
            let info = info();
            let total_size = pages * info.default_page_size;
            let rst = run_trial(total_size, pages, PageSizeClass::Default, &info);
            prop_assert!(rst.cycles().is_some());
        }
    }
}
