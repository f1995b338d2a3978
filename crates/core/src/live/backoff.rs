use std::time::Duration;

use rand::Rng;

use crate::cnf::{REBUILD_BACKOFF_BASE_MS, REBUILD_BACKOFF_MAX_MS};

/// The delay before build attempt `attempt + 1`: an exponential delay capped
/// at `cap`, plus a random jitter of up to half of it.
pub fn delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
	let exp = base.saturating_mul(2u32.saturating_pow(attempt)).min(cap);
	let half = exp.as_millis() as u64 / 2;
	let jitter = match half {
		0 => 0,
		half => rand::thread_rng().gen_range(0..=half),
	};
	exp + Duration::from_millis(jitter)
}

/// [`delay`] with the configured base and cap.
pub fn rebuild_delay(attempt: u32) -> Duration {
	delay(
		attempt,
		Duration::from_millis(*REBUILD_BACKOFF_BASE_MS),
		Duration::from_millis(*REBUILD_BACKOFF_MAX_MS),
	)
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	#[rstest]
	#[case(0, 100)]
	#[case(1, 200)]
	#[case(3, 800)]
	#[case(10, 5_000)]
	#[case(40, 5_000)]
	fn delays_grow_then_cap(#[case] attempt: u32, #[case] expected: u64) {
		let base = Duration::from_millis(100);
		let cap = Duration::from_secs(5);
		for _ in 0..20 {
			let d = delay(attempt, base, cap).as_millis() as u64;
			assert!(d >= expected && d <= expected + expected / 2, "{d} for attempt {attempt}");
		}
	}
}
