/// Widens the window between reading the shared identifier counter and
/// publishing a new claim, so that concurrent tests see many more
/// conflicting claims. Compiles to nothing without the
/// `runtime_verification` feature.
#[inline]
pub(crate) fn debug_delay() {
    #[cfg(feature = "runtime_verification")]
    {
        use rand::{thread_rng, Rng};

        let mut rng = thread_rng();

        if rng.gen_ratio(1, 16) {
            std::thread::yield_now();
        } else {
            for _ in 0..rng.gen_range(0..64) {
                std::hint::spin_loop();
            }
        }
    }
}
