//! Native stack growth for the recursive parts of the interpreter.
//!
//! Nested blocks, statute invocations and parenthesised expressions all
//! recurse. Wrapping those entry points in [`ensure_sufficient_stack`] keeps
//! deep programs within the configured limits from aborting the process on
//! threads with small stacks.

/// Grow when less than this much stack remains.
const RED_ZONE: usize = 128 * 1024;

/// Size of each newly allocated stack segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_recursion_survives_a_small_thread() {
        fn nest(n: u64) -> u64 {
            ensure_sufficient_stack(|| if n == 0 { 0 } else { nest(n - 1) + 1 })
        }

        let depth = std::thread::Builder::new()
            .stack_size(64 * 1024)
            .spawn(|| nest(50_000))
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(depth, 50_000);
    }
}
