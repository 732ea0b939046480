//! Latency measurement for PDP round trips.

use std::future::Future;
use std::time::{Duration, Instant};

/// Await `fut` and report how long it took, whatever it resolved to.
///
/// ```rust,ignore
/// let (result, elapsed) = timed(transport.post(url, &body, &options)).await;
/// ```
pub(crate) async fn timed<F: Future>(fut: F) -> (F::Output, Duration) {
    let start = Instant::now();
    let output = fut.await;
    (output, start.elapsed())
}

/// Milliseconds with sub-millisecond precision, for log fields.
pub(crate) fn as_millis_f64(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timed_records_elapsed() {
        let (value, elapsed) = timed(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            7
        })
        .await;
        assert_eq!(value, 7);
        assert!(elapsed >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_timed_passes_errors_through() {
        let (result, _) = timed(async { Err::<(), _>("boom") }).await;
        assert_eq!(result, Err("boom"));
    }

    #[test]
    fn test_as_millis_f64() {
        assert_eq!(as_millis_f64(Duration::from_micros(1_500)), 1.5);
    }
}
