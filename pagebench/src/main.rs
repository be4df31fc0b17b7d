use std::{fmt::Write as _, io, path::PathBuf};

use anyhow::{Context, Result};
use clap::{
    builder::{IntoResettable, Resettable, StyledStr},
    Parser,
};
use tracing::{debug, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{prelude::*, EnvFilter, Registry};

use crate::{
    meminfo::{supported_huge_page_sizes, SystemPageInfo},
    page_size::{PageSizeClass, Pretty, MB},
    plan::{Plan, TestsHelp},
    trial::CycleBench,
};

mod cycles;
mod meminfo;
mod page_size;
mod plan;
mod region;
mod report;
mod touch;
mod trial;

// small boards running arm usually have much less memory
#[cfg(any(target_arch = "aarch64", target_arch = "arm"))]
const DEFAULT_SIZE_MB: u64 = 512;
#[cfg(not(any(target_arch = "aarch64", target_arch = "arm")))]
const DEFAULT_SIZE_MB: u64 = 8192;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Opt {
    #[clap(
        short,
        long,
        default_value = "false",
        help = "enable debug output and always print how to reserve huge pages"
    )]
    verbose: bool,

    #[clap(
        default_value_t = DEFAULT_SIZE_MB,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "total size of the mapping in MiB"
    )]
    size: u64,

    #[clap(
        default_value_t = 0,
        value_parser = clap::value_parser!(u8).range(0..=6),
        help = TestsHelp,
    )]
    test: u8,

    #[clap(
        long,
        default_value = meminfo::MEMINFO,
        help = "source of HugePages_Total and Hugepagesize"
    )]
    meminfo: PathBuf,

    #[clap(
        long,
        default_value = meminfo::HUGEPAGES_DIR,
        help = "directory listing huge page sizes supported by the kernel"
    )]
    hugepages_dir: PathBuf,
}

fn main() -> Result<()> {
    let opt: Opt = Opt::parse();

    let level = if opt.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let registry = Registry::default().with(
        tracing_subscriber::fmt::layer().with_writer(io::stderr).with_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        ),
    );
    tracing::dispatcher::set_global_default(registry.into()).expect("failed to set global default subscriber");

    for class in PageSizeClass::ALL {
        if class.is_huge() && class.flags().is_none() {
            warn!("{} pages are not supported on this platform", class);
        }
    }

    let info = SystemPageInfo::probe(&opt.meminfo);
    if opt.verbose {
        let sizes = supported_huge_page_sizes(&opt.hugepages_dir);
        let sizes = sizes.iter().map(|size| Pretty(*size).to_string()).collect::<Vec<_>>();
        info!("kernel exposes huge page sizes: [{}]", sizes.join(", "));
    }

    let total_size = usize::try_from(opt.size)
        .ok()
        .and_then(|mb| mb.checked_mul(MB))
        .with_context(|| format!("size of {} MiB doesn't fit into the address space", opt.size))?;
    let mut bench = CycleBench::new(total_size, info).context("configure benchmark")?;
    let plan = Plan::new(opt.test.into(), &info);
    if plan.is_empty() {
        info!(
            "test {} has the default or the reported huge page size, nothing to run",
            opt.test
        );
    }
    info!(
        "running {} trials over {} split into {} strides",
        plan.len(),
        Pretty(bench.total_size()),
        bench.stride_count()
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    report::header(&info, &mut out).context("write report")?;
    let comparison = report::compare(&plan, &mut bench, &mut out).context("write report")?;
    debug!("SUMMARY:\n{}", comparison.summary());

    if let Some(hint) = comparison.hint(&info, total_size, opt.verbose) {
        eprint!("{}", hint);
    }
    Ok(())
}

impl IntoResettable<StyledStr> for TestsHelp {
    fn into_resettable(self) -> Resettable<StyledStr> {
        let mut rst = String::new();
        write!(&mut rst, "{}", self).expect("no error");
        Resettable::Value(StyledStr::from(rst))
    }
}
