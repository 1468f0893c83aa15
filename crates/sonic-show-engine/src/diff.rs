//! Counter differencing.
//!
//! Differences are taken field by field: accumulating counters are
//! subtracted (clamped at zero unless the field allows negative deltas),
//! rates and FEC bins pass through from the newer snapshot, and the
//! cleared-at marker is reconciled. Inputs are never mutated.

use crate::counters::{Counter, CounterField, CounterSnapshot, SnapshotMap};
use crate::error::{Result, ShowError};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Difference of two counter values.
///
/// A missing new value stays missing and a missing old value counts as zero.
/// With `clamp`, a negative delta (counter reset or wrap) is reported as zero.
pub fn field_diff(old: Counter, new: Counter, clamp: bool) -> Counter {
    let Counter::Present(new) = new else {
        return Counter::Missing;
    };
    let old = old.value().unwrap_or(0);
    let delta = new.saturating_sub(old);
    if clamp && delta < 0 {
        Counter::Present(0)
    } else {
        Counter::Present(delta)
    }
}

/// Picks the cleared-at marker of a difference: a real timestamp on the
/// newer side wins, else the older one is kept.
pub fn reconcile_cleared_at(old: Option<&str>, new: Option<&str>) -> Option<String> {
    new.or(old).map(str::to_string)
}

/// Difference of two snapshots of the same interface.
pub fn diff_snapshot(old: &CounterSnapshot, new: &CounterSnapshot) -> CounterSnapshot {
    let counters = CounterField::ALL
        .iter()
        .map(|&field| {
            let value = field_diff(old.counter(field), new.counter(field), field.clamps());
            (field, value)
        })
        .collect();

    CounterSnapshot {
        state: new.state,
        counters,
        rates: new.rates,
        fec_bins: new.fec_bins,
        cleared_at: reconcile_cleared_at(old.cleared_at.as_deref(), new.cleared_at.as_deref()),
    }
}

/// Difference of two snapshot maps, keyed by the newer map.
///
/// Interfaces absent from `old` pass through unchanged.
pub fn diff(old: &SnapshotMap, new: &SnapshotMap) -> SnapshotMap {
    new.iter()
        .map(|(name, newer)| {
            let value = match old.get(name) {
                Some(older) => diff_snapshot(older, newer),
                None => {
                    debug!("Previous snapshot not found for {}, passing through", name);
                    newer.clone()
                }
            };
            (name.clone(), value)
        })
        .collect()
}

/// How a request samples counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleWindow {
    /// Time between the two samples.
    pub period: Duration,
    /// Whether a difference was asked for at all.
    pub diff_requested: bool,
}

impl SampleWindow {
    /// Single sample, no difference.
    pub fn immediate() -> Self {
        Self::default()
    }

    /// Validates a requested period against the allowed maximum.
    pub fn new(period_secs: i64, max: Duration) -> Result<Self> {
        if period_secs < 0 || period_secs as u64 > max.as_secs() {
            return Err(ShowError::invalid(format!(
                "period value must be <= {} and non negative",
                max.as_secs()
            )));
        }
        Ok(Self {
            period: Duration::from_secs(period_secs as u64),
            diff_requested: true,
        })
    }

    /// Parses the `period` option; its presence requests a difference.
    pub fn parse(value: Option<&str>, max: Duration) -> Result<Self> {
        match value {
            None => Ok(Self::immediate()),
            Some(raw) => {
                let secs = raw.trim().parse::<i64>().map_err(|_| {
                    ShowError::invalid(format!("period must be an integer, got '{}'", raw))
                })?;
                Self::new(secs, max)
            }
        }
    }

    /// Whether two samples are taken.
    pub fn is_windowed(&self) -> bool {
        self.diff_requested && !self.period.is_zero()
    }
}

/// Sleeps for `period` unless `cancel` fires first.
pub async fn wait_window(period: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        _ = cancel.cancelled() => {
            info!("Sampling window cancelled");
            Err(ShowError::Cancelled)
        }
        _ = tokio::time::sleep(period) => Ok(()),
    }
}

/// Runs the sampling workflow.
///
/// Without a difference request, or with a zero period, the first sample is
/// returned as is. Otherwise a second sample is taken `period` later and
/// `difference(first, second)` is returned. The wait occupies the calling
/// task for the whole window.
pub async fn sample_with_window<T, F, Fut>(
    window: SampleWindow,
    cancel: &CancellationToken,
    mut sample: F,
    difference: fn(&T, &T) -> T,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let first = sample().await?;
    if !window.is_windowed() {
        return Ok(first);
    }
    debug!("Waiting {:?} for the second sample", window.period);
    wait_window(window.period, cancel).await?;
    let second = sample().await?;
    Ok(difference(&first, &second))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::{LinkState, Rates};
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    fn snapshot(rx_ok: i64, rx_bps: f64) -> CounterSnapshot {
        let mut snap = CounterSnapshot {
            state: LinkState::Up,
            rates: Rates {
                rx_bps: Some(rx_bps),
                ..Default::default()
            },
            ..Default::default()
        };
        for &field in CounterField::ALL {
            snap.set(field, Counter::Present(0));
        }
        snap.set(CounterField::RxOk, Counter::Present(rx_ok));
        snap
    }

    #[test]
    fn test_field_diff_clamped_never_negative() {
        for (old, new) in [(0, 0), (5, 5), (5, 9), (9, 5), (i64::MAX, 0), (0, i64::MAX)] {
            let result = field_diff(Counter::Present(old), Counter::Present(new), true);
            let value = result.value().unwrap();
            assert!(value >= 0, "{} -> {} gave {}", old, new, value);
            if new <= old {
                assert_eq!(value, 0);
            } else {
                assert_eq!(value, new - old);
            }
        }
    }

    #[test]
    fn test_field_diff_missing_old_is_zero() {
        for new in [0, 7, 1000] {
            assert_eq!(
                field_diff(Counter::Missing, Counter::Present(new), false),
                field_diff(Counter::Present(0), Counter::Present(new), false)
            );
        }
    }

    #[test]
    fn test_field_diff_missing_new_stays_missing() {
        assert_eq!(field_diff(Counter::Present(3), Counter::Missing, true), Counter::Missing);
        assert_eq!(field_diff(Counter::Missing, Counter::Missing, false), Counter::Missing);
    }

    #[test]
    fn test_field_diff_unclamped_keeps_sign() {
        assert_eq!(
            field_diff(Counter::Present(10), Counter::Present(4), false),
            Counter::Present(-6)
        );
    }

    #[test]
    fn test_reconcile_cleared_at() {
        assert_eq!(reconcile_cleared_at(None, None), None);
        assert_eq!(reconcile_cleared_at(Some("t0"), None).as_deref(), Some("t0"));
        assert_eq!(reconcile_cleared_at(Some("t0"), Some("t1")).as_deref(), Some("t1"));
        assert_eq!(reconcile_cleared_at(None, Some("t1")).as_deref(), Some("t1"));
    }

    #[test]
    fn test_rates_pass_through() {
        let old = snapshot(100, 1.0);
        let new = snapshot(150, 42.0);
        let result = diff_snapshot(&old, &new);
        assert_eq!(result.rates, new.rates);
        assert_eq!(result.fec_bins, new.fec_bins);
        assert_eq!(result.counter(CounterField::RxOk), Counter::Present(50));
    }

    #[test]
    fn test_counter_reset_mid_window_clamps() {
        let old = snapshot(100, 0.0);
        let new = snapshot(80, 0.0);
        let result = diff_snapshot(&old, &new);
        assert_eq!(result.counter(CounterField::RxOk).to_string(), "0");
    }

    #[test]
    fn test_new_interface_passes_through() {
        let old = SnapshotMap::new();
        let mut new = SnapshotMap::new();
        new.insert("Ethernet0".to_string(), snapshot(100, 1.0));
        assert_eq!(diff(&old, &new), new);
    }

    #[test]
    fn test_sample_window_validation() {
        let max = Duration::from_secs(60);
        assert_eq!(SampleWindow::parse(None, max).unwrap(), SampleWindow::immediate());
        let zero = SampleWindow::parse(Some("0"), max).unwrap();
        assert!(zero.diff_requested);
        assert!(!zero.is_windowed());
        assert!(SampleWindow::parse(Some("5"), max).unwrap().is_windowed());
        assert!(SampleWindow::parse(Some("60"), max).is_ok());
        assert!(SampleWindow::parse(Some("61"), max).is_err());
        assert!(SampleWindow::parse(Some("-1"), max).is_err());
        assert!(SampleWindow::parse(Some("soon"), max).is_err());
    }

    fn counting_sampler(calls: Arc<AtomicI64>) -> impl FnMut() -> std::future::Ready<Result<i64>> {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok((n + 1) * 10))
        }
    }

    fn subtract(a: &i64, b: &i64) -> i64 {
        b - a
    }

    #[tokio::test(start_paused = true)]
    async fn test_windowed_sampling_takes_two_samples() {
        let calls = Arc::new(AtomicI64::new(0));
        let window = SampleWindow::new(5, Duration::from_secs(60)).unwrap();
        let start = tokio::time::Instant::now();

        let result = sample_with_window(
            window,
            &CancellationToken::new(),
            counting_sampler(calls.clone()),
            subtract,
        )
        .await
        .unwrap();

        assert_eq!(result, 10);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_zero_period_returns_first_sample() {
        let calls = Arc::new(AtomicI64::new(0));
        let window = SampleWindow::new(0, Duration::from_secs(60)).unwrap();

        let result = sample_with_window(
            window,
            &CancellationToken::new(),
            counting_sampler(calls.clone()),
            subtract,
        )
        .await
        .unwrap();

        assert_eq!(result, 10);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_wait() {
        let calls = Arc::new(AtomicI64::new(0));
        let window = SampleWindow::new(60, Duration::from_secs(60)).unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let result = sample_with_window(window, &cancel, counting_sampler(calls.clone()), subtract).await;
        assert!(matches!(result, Err(ShowError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
