use std::hint::black_box;

/// Writes zero to every byte, faulting in all pages of the mapping.
pub(crate) fn zero_fill(region: &mut [u8]) {
    region.fill(0);
}

/// Reads the byte at `byte_index` of every stride and returns their wrapping sum.
///
/// The sum carries no meaning, it only keeps the reads from being optimized away.
/// Panics if any of the reads would land outside of `region`.
#[inline]
pub(crate) fn touch(region: &[u8], stride_count: usize, stride_size: usize, byte_index: usize) -> u8 {
    assert!(
        stride_size < region.len(),
        "stride size {} must be smaller than region {}",
        stride_size,
        region.len()
    );
    assert!(
        byte_index < stride_size,
        "byte index {} is outside of stride {}",
        byte_index,
        stride_size
    );
    let mut sum = 0u8;
    for i in 0..stride_count {
        let index = i * stride_size + byte_index;
        assert!(
            index < region.len(),
            "stride {} byte {} is outside of region {}",
            i,
            byte_index,
            region.len()
        );
        sum = sum.wrapping_add(region[index]);
    }
    black_box(sum)
}
