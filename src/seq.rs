//! Sequence number arithmetic modulo 2^32.
//!
//! Initial sequence numbers are random, so a connection may wrap around `u32::MAX` at any point.
//! Two sequence numbers are ordered by the sign of their wrapping difference, which is valid as
//! long as they are less than 2^31 apart.

use std::cmp::Ordering;

pub fn cmp(a: u32, b: u32) -> Ordering {
    let delta = b.wrapping_sub(a);

    if delta == 0 {
        Ordering::Equal
    } else if delta <= u32::MAX / 2 {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

pub fn lt(a: u32, b: u32) -> bool {
    cmp(a, b) == Ordering::Less
}

pub fn le(a: u32, b: u32) -> bool {
    cmp(a, b) != Ordering::Greater
}

pub fn max(a: u32, b: u32) -> u32 {
    if lt(a, b) {
        b
    } else {
        a
    }
}

/// Number of sequence numbers in `[from, to)`.
pub fn distance(from: u32, to: u32) -> u32 {
    to.wrapping_sub(from)
}
