use std::fmt::{self, Display, Formatter};

use tracing::debug;

use crate::{
    meminfo::SystemPageInfo,
    page_size::{PageSizeClass, Pretty},
};

/// Test number, page size class and label for every configuration that can be benchmarked.
pub(crate) const TESTS: [(u8, PageSizeClass, &str); 6] = [
    (1, PageSizeClass::Default, "default"),
    (2, PageSizeClass::HugeDefault, "default huge"),
    (3, PageSizeClass::Huge64K, "specific"),
    (4, PageSizeClass::Huge2M, "specific"),
    (5, PageSizeClass::Huge32M, "specific"),
    (6, PageSizeClass::Huge1G, "specific"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Selection {
    All,
    Only(u8),
}

impl From<u8> for Selection {
    fn from(test: u8) -> Self {
        match test {
            0 => Selection::All,
            test => Selection::Only(test),
        }
    }
}

impl Selection {
    fn includes(&self, test: u8) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(only) => *only == test,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Entry {
    pub(crate) test: u8,
    pub(crate) class: PageSizeClass,
    pub(crate) label: &'static str,
    // None when the class is HugeDefault and the kernel didn't report a size
    pub(crate) page_size: Option<usize>,
}

impl Entry {
    pub(crate) fn is_baseline(&self) -> bool {
        self.class == PageSizeClass::Default
    }
}

/// Ordered list of trials to run. The default page size always comes first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Plan {
    entries: Vec<Entry>,
}

impl Plan {
    pub(crate) fn new(selection: Selection, info: &SystemPageInfo) -> Self {
        let entries = TESTS
            .iter()
            .filter(|(test, _, _)| selection.includes(*test))
            .filter_map(|&(test, class, label)| {
                let page_size = match class {
                    PageSizeClass::Default => Some(info.default_page_size),
                    PageSizeClass::HugeDefault => info.huge_page_size,
                    fixed => fixed.size(),
                };
                // a fixed size that matches the default or the reported huge page
                // size would repeat one of the first two trials
                if let Some(size) = class.size() {
                    if size == info.default_page_size || Some(size) == info.huge_page_size {
                        debug!("skipping test {} with {} pages, already covered", test, Pretty(size));
                        return None;
                    }
                }
                Some(Entry {
                    test,
                    class,
                    label,
                    page_size,
                })
            })
            .collect();
        Plan { entries }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.entries.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Describes test numbers in the command line help.
pub(crate) struct TestsHelp;

impl Display for TestsHelp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "test to run, 0 runs all of them.")?;
        for (test, class, label) in TESTS.iter() {
            match class.size() {
                Some(size) => writeln!(f, "- {}: {} {} pages", test, label, Pretty(size))?,
                None => writeln!(f, "- {}: {} pages", test, label)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_size::{KB, MB};

    fn x86_info() -> SystemPageInfo {
        SystemPageInfo {
            default_page_size: 4 * KB,
            huge_pages_enabled: true,
            huge_page_size: Some(2 * MB),
        }
    }

    fn classes(plan: &Plan) -> Vec<PageSizeClass> {
        plan.iter().map(|entry| entry.class).collect()
    }

    #[test]
    fn test_all_skips_reported_huge_size() {
        let plan = Plan::new(Selection::All, &x86_info());
        assert_eq!(
            classes(&plan),
            vec![
                PageSizeClass::Default,
                PageSizeClass::HugeDefault,
                PageSizeClass::Huge64K,
                PageSizeClass::Huge32M,
                PageSizeClass::Huge1G,
            ]
        );
        assert!(plan.iter().next().unwrap().is_baseline());
        assert_eq!(plan.iter().nth(1).unwrap().page_size, Some(2 * MB));
    }

    #[test]
    fn test_all_skips_default_size() {
        let info = SystemPageInfo {
            default_page_size: 64 * KB,
            huge_pages_enabled: false,
            huge_page_size: Some(512 * MB),
        };
        let plan = Plan::new(Selection::All, &info);
        assert_eq!(
            classes(&plan),
            vec![
                PageSizeClass::Default,
                PageSizeClass::HugeDefault,
                PageSizeClass::Huge2M,
                PageSizeClass::Huge32M,
                PageSizeClass::Huge1G,
            ]
        );
    }

    #[test]
    fn test_only_default() {
        let plan = Plan::new(Selection::from(1), &x86_info());
        assert_eq!(plan.len(), 1);
        assert_eq!(classes(&plan), vec![PageSizeClass::Default]);
    }

    #[test]
    fn test_only_skipped_entry_is_empty() {
        let plan = Plan::new(Selection::from(4), &x86_info());
        assert!(plan.is_empty());
    }

    #[test]
    fn test_only_specific() {
        let plan = Plan::new(Selection::from(6), &x86_info());
        let entries = plan.iter().collect::<Vec<_>>();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].test, 6);
        assert_eq!(entries[0].label, "specific");
        assert_eq!(entries[0].page_size, Some(1024 * MB));
    }

    #[test]
    fn test_unknown_huge_size_keeps_every_fixed_size() {
        let info = SystemPageInfo {
            huge_page_size: None,
            ..x86_info()
        };
        let plan = Plan::new(Selection::All, &info);
        assert_eq!(plan.len(), 6);
        assert_eq!(plan.iter().nth(1).unwrap().page_size, None);
    }

    #[test]
    fn test_selection_from() {
        assert_eq!(Selection::from(0), Selection::All);
        assert_eq!(Selection::from(3), Selection::Only(3));
    }

    #[test]
    fn test_help_lists_all_tests() {
        let help = TestsHelp.to_string();
        for test in 1..=6 {
            assert!(help.contains(&format!("- {}:", test)), "{}", help);
        }
        assert!(help.contains("specific 32MB pages"));
    }
}
