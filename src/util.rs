//! Branch prediction hints for the hook hot path.

/// Calls to this function mark the enclosing branch as rarely taken.
#[inline(always)]
#[cold]
pub fn cold() {}

/// Hints that `b` is almost always `false`, e.g. a settings swap between events.
#[inline(always)]
pub fn unlikely(b: bool) -> bool {
    if b {
        cold()
    }
    b
}

/// Hints that `b` is almost always `true`.
#[inline(always)]
pub fn likely(b: bool) -> bool {
    if !b {
        cold()
    }
    b
}
