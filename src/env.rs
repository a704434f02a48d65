//! Typed environment lookups with fallbacks.

use std::env;

/// Returns the value of `key`, or `fallback` when the variable is unset or
/// not valid Unicode.
#[must_use]
pub fn str_var(key: &str, fallback: &str) -> String {
    env::var(key).unwrap_or_else(|_| fallback.to_owned())
}

/// Returns the value of `key` parsed as an integer, or `fallback` when the
/// variable is unset or does not parse.
#[must_use]
pub fn int_var(key: &str, fallback: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(fallback)
}

/// Returns the machine's hostname, preferring the kernel-reported name and
/// falling back to the `HOSTNAME` environment variable. Returns `None` when
/// neither source yields a non-empty name.
#[must_use]
pub fn hostname() -> Option<String> {
    let from_kernel = std::fs::read_to_string("/etc/hostname")
        .ok()
        .map(|name| name.trim().to_owned())
        .filter(|name| !name.is_empty());
    from_kernel.or_else(|| env::var("HOSTNAME").ok().filter(|name| !name.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn str_var_falls_back_when_unset() {
        assert_eq!(str_var("GROUNDCREW_TEST_UNSET_STR", "fallback"), "fallback");
    }

    #[test]
    fn int_var_falls_back_on_garbage() {
        // SAFETY: test-local variable name, not read concurrently.
        unsafe { env::set_var("GROUNDCREW_TEST_BAD_INT", "not-a-number") };
        assert_eq!(int_var("GROUNDCREW_TEST_BAD_INT", 7), 7);
        unsafe { env::remove_var("GROUNDCREW_TEST_BAD_INT") };
    }

    #[test]
    fn int_var_parses_numbers() {
        // SAFETY: test-local variable name, not read concurrently.
        unsafe { env::set_var("GROUNDCREW_TEST_GOOD_INT", "42") };
        assert_eq!(int_var("GROUNDCREW_TEST_GOOD_INT", 7), 42);
        unsafe { env::remove_var("GROUNDCREW_TEST_GOOD_INT") };
    }
}
