/// Monotonic millisecond clock.
///
/// The counter is allowed to wrap; intervals are always measured with
/// [`elapsed_ms`].
pub trait Clock {
    fn now_ms(&self) -> u32;
}

impl<F> Clock for F
where
    F: Fn() -> u32,
{
    fn now_ms(&self) -> u32 {
        self()
    }
}

/// Milliseconds from `since` to `now`, correct across one counter wrap.
#[inline]
pub fn elapsed_ms(now: u32, since: u32) -> u32 {
    now.wrapping_sub(since)
}
