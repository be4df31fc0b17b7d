use std::fmt::{self, Display, Formatter};

pub(crate) const KB: usize = 1024;
pub(crate) const MB: usize = 1024 * KB;

/// Granularity requested for a single mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum PageSizeClass {
    Default,
    // large page of whatever size the kernel uses by default (Hugepagesize in /proc/meminfo)
    HugeDefault,
    Huge64K,
    Huge2M,
    Huge32M,
    Huge1G,
}

impl PageSizeClass {
    pub(crate) const ALL: [PageSizeClass; 6] = [
        PageSizeClass::Default,
        PageSizeClass::HugeDefault,
        PageSizeClass::Huge64K,
        PageSizeClass::Huge2M,
        PageSizeClass::Huge32M,
        PageSizeClass::Huge1G,
    ];

    /// Returns the size in bytes for classes that pin a specific granularity.
    pub(crate) const fn size(&self) -> Option<usize> {
        match self {
            PageSizeClass::Default | PageSizeClass::HugeDefault => None,
            PageSizeClass::Huge64K => Some(64 * KB),
            PageSizeClass::Huge2M => Some(2 * MB),
            PageSizeClass::Huge32M => Some(32 * MB),
            PageSizeClass::Huge1G => Some(1024 * MB),
        }
    }

    pub(crate) const fn is_huge(&self) -> bool {
        !matches!(self, PageSizeClass::Default)
    }

    /// Returns mmap flags for the class, or None if the platform can't express it.
    pub(crate) const fn flags(&self) -> Option<libc::c_int> {
        flags::for_class(*self)
    }
}

impl From<PageSizeClass> for &'static str {
    fn from(class: PageSizeClass) -> &'static str {
        match class {
            PageSizeClass::Default => "default",
            PageSizeClass::HugeDefault => "huge",
            PageSizeClass::Huge64K => "huge-64kB",
            PageSizeClass::Huge2M => "huge-2MB",
            PageSizeClass::Huge32M => "huge-32MB",
            PageSizeClass::Huge1G => "huge-1GB",
        }
    }
}

impl Display for PageSizeClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name: &str = (*self).into();
        write!(f, "{}", name)
    }
}

#[cfg(target_os = "linux")]
mod flags {
    use super::PageSizeClass;

    // bits 26..32 of the mmap flags carry log2 of the requested huge page size.
    const MAP_HUGE_SHIFT: libc::c_int = 26;

    const fn huge(log2: libc::c_int) -> libc::c_int {
        libc::MAP_HUGETLB | (log2 << MAP_HUGE_SHIFT)
    }

    pub(super) const fn for_class(class: PageSizeClass) -> Option<libc::c_int> {
        let extra = match class {
            PageSizeClass::Default => 0,
            PageSizeClass::HugeDefault => libc::MAP_HUGETLB,
            PageSizeClass::Huge64K => huge(16),
            PageSizeClass::Huge2M => huge(21),
            PageSizeClass::Huge32M => huge(25),
            PageSizeClass::Huge1G => huge(30),
        };
        Some(libc::MAP_ANONYMOUS | libc::MAP_PRIVATE | extra)
    }
}

#[cfg(not(target_os = "linux"))]
mod flags {
    use super::PageSizeClass;

    pub(super) const fn for_class(class: PageSizeClass) -> Option<libc::c_int> {
        match class {
            PageSizeClass::Default => Some(libc::MAP_ANONYMOUS | libc::MAP_PRIVATE),
            _ => None,
        }
    }
}

/// Formats a byte count the way the report prints page sizes: `4kB`, `2MB`, `1024MB`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Pretty(pub(crate) usize);

impl Display for Pretty {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0 >= MB {
            write!(f, "{}MB", self.0 / MB)
        } else {
            write!(f, "{}kB", self.0 / KB)
        }
    }
}

/// Same as [`Pretty`] but for sizes that may be unknown.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MaybePretty(pub(crate) Option<usize>);

impl Display for MaybePretty {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(size) => Pretty(size).fmt(f),
            None => write!(f, "unknown"),
        }
    }
}
