//! Bit tricks for the segment test.

/// Pack a 16-pixel ring into a bitmask, bit `i` set when `ring[i]` holds
pub fn ring_mask(ring: &[bool; 16]) -> u16 {
    ring.iter()
        .enumerate()
        .fold(0u16, |mask, (i, &set)| if set { mask | (1 << i) } else { mask })
}

/// Check for a run of at least `arc_len` set bits on the circular 16-bit ring.
///
/// For a run of length n: `mask & rot(mask, 1) & ... & rot(mask, n-1) != 0`.
pub fn has_contiguous_arc(mask: u16, arc_len: usize) -> bool {
    if arc_len == 0 || arc_len > 16 {
        return false;
    }
    if arc_len == 16 {
        return mask == u16::MAX;
    }

    let mut test_mask = mask;
    for i in 1..arc_len {
        test_mask &= mask.rotate_left(i as u32);
        if test_mask == 0 {
            return false;
        }
    }

    test_mask != 0
}

/// Run-length reference implementation, used to cross-check the bitmask path
#[cfg(test)]
fn has_contiguous_arc_scan(mask: u16, arc_len: usize) -> bool {
    if arc_len == 0 || arc_len > 16 {
        return false;
    }
    let mut run = 0;
    for i in 0..32 {
        if mask & (1 << (i % 16)) != 0 {
            run += 1;
            if run >= arc_len {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}
