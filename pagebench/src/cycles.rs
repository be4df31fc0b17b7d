//! Hardware cycle counter used to time trials.
//!
//! Values are only meaningful as differences between two reads in the same process.

#[cfg(target_arch = "x86_64")]
#[inline]
pub(crate) fn now() -> u64 {
    unsafe { core::arch::x86_64::_rdtsc() }
}

#[cfg(target_arch = "x86")]
#[inline]
pub(crate) fn now() -> u64 {
    unsafe { core::arch::x86::_rdtsc() }
}

// virtual counter, readable from userspace on linux
#[cfg(target_arch = "aarch64")]
#[inline]
pub(crate) fn now() -> u64 {
    let ticks: u64;
    unsafe {
        std::arch::asm!("mrs {}, cntvct_el0", out(reg) ticks, options(nomem, nostack));
    }
    ticks
}

// no counter we know how to read, fall back to monotonic nanoseconds
#[cfg(not(any(target_arch = "x86_64", target_arch = "x86", target_arch = "aarch64")))]
pub(crate) fn now() -> u64 {
    use std::time::Instant;

    use once_cell::sync::Lazy;

    static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);
    EPOCH.elapsed().as_nanos() as u64
}

/// Cycles elapsed between two reads.
#[inline]
pub(crate) fn elapsed(start: u64, end: u64) -> u64 {
    end.saturating_sub(start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_does_not_go_back() {
        let mut previous = now();
        for _ in 0..1000 {
            let current = now();
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn test_counter_advances() {
        let start = now();
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(elapsed(start, now()) > 0);
    }

    #[test]
    fn test_elapsed_saturates() {
        assert_eq!(elapsed(10, 4), 0);
        assert_eq!(elapsed(4, 10), 6);
    }
}
