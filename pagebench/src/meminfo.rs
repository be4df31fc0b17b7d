use std::{
    fs::{self, File},
    io::{self, BufRead, BufReader},
    path::Path,
};

use once_cell::sync::OnceCell;
use tracing::debug;

pub(crate) const MEMINFO: &str = "/proc/meminfo";
pub(crate) const HUGEPAGES_DIR: &str = "/sys/kernel/mm/hugepages";

const HUGE_PAGES_TOTAL: &str = "HugePages_Total:";
const HUGE_PAGE_SIZE: &str = "Hugepagesize:";

/// Returns the system page size.
pub(crate) fn default_page_size() -> usize {
    static PAGE_SIZE: OnceCell<usize> = OnceCell::new();
    *PAGE_SIZE.get_or_init(|| {
        let ret = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if ret <= 0 {
            panic!("unable to find page size: {}", io::Error::last_os_error());
        }
        ret as usize
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SystemPageInfo {
    pub(crate) default_page_size: usize,
    pub(crate) huge_pages_enabled: bool,
    pub(crate) huge_page_size: Option<usize>,
}

impl SystemPageInfo {
    /// Reads huge page facts from `meminfo` and the page size from sysconf.
    /// An unreadable source is treated as if no key was present.
    pub(crate) fn probe(meminfo: &Path) -> Self {
        let facts = match File::open(meminfo) {
            Ok(file) => MemInfo::parse(BufReader::new(file)),
            Err(err) => {
                debug!("unable to open {}: {}", meminfo.display(), err);
                MemInfo::default()
            }
        };
        facts.with_page_size(default_page_size())
    }
}

/// The two keys of /proc/meminfo that matter for huge pages.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MemInfo {
    huge_pages_total: Option<u64>,
    huge_page_size_kb: Option<u64>,
}

impl MemInfo {
    pub(crate) fn parse(reader: impl BufRead) -> Self {
        let mut info = MemInfo::default();
        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    debug!("reading meminfo: {}", err);
                    break;
                }
            };
            // example format
            // HugePages_Total:       0
            // Hugepagesize:       2048 kB
            let mut parts = line.split_whitespace();
            let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
                continue;
            };
            let slot = match key {
                HUGE_PAGES_TOTAL => &mut info.huge_pages_total,
                HUGE_PAGE_SIZE => &mut info.huge_page_size_kb,
                _ => continue,
            };
            // first occurrence wins
            if slot.is_some() {
                continue;
            }
            match value.parse::<u64>() {
                Ok(value) => *slot = Some(value),
                Err(err) => debug!("invalid value {:?} for {}: {}", value, key, err),
            }
        }
        info
    }

    pub(crate) fn huge_pages_enabled(&self) -> bool {
        self.huge_pages_total.map_or(false, |total| total > 0)
    }

    pub(crate) fn huge_page_size(&self) -> Option<usize> {
        self.huge_page_size_kb
            .filter(|&kb| kb > 0)
            .and_then(|kb| usize::try_from(kb).ok())
            .and_then(|kb| kb.checked_mul(1024))
    }

    pub(crate) fn with_page_size(&self, default_page_size: usize) -> SystemPageInfo {
        SystemPageInfo {
            default_page_size,
            huge_pages_enabled: self.huge_pages_enabled(),
            huge_page_size: self.huge_page_size(),
        }
    }
}

/// Lists huge page sizes the kernel exposes as `hugepages-<N>kB` directories, in ascending order.
pub(crate) fn supported_huge_page_sizes(dir: &Path) -> Vec<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!("unable to list {}: {}", dir.display(), err);
            return vec![];
        }
    };
    let mut sizes = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name();
            let kb = name
                .to_str()?
                .strip_prefix("hugepages-")?
                .strip_suffix("kB")?
                .parse::<usize>()
                .ok()?;
            kb.checked_mul(1024)
        })
        .collect::<Vec<_>>();
    sizes.sort_unstable();
    sizes
}
