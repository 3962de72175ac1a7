use chrono::{DateTime, Duration, Utc};

use crate::Bar;

/// Collapses a stream of fixed-duration bars into coarser bars.
///
/// The aggregator is driven synchronously: the consumer feeds bars in
/// producer order and forwards whatever `push` emits. State is kept between
/// pushes, so resuming a feed continues the window that was open when the
/// previous stream ended. A trailing incomplete window is never flushed.
pub enum Aggregator {
    Identity,
    Interval(IntervalAggregator),
}

impl Aggregator {
    /// Aggregator collapsing `n` 1-minute bars per emitted bar.
    pub fn for_bar_count(n: usize) -> Self {
        if n > 1 {
            Aggregator::Interval(IntervalAggregator::new(
                Duration::minutes(1),
                Duration::minutes(n as i64),
            ))
        } else {
            Aggregator::Identity
        }
    }

    pub fn push(&mut self, bar: Bar) -> Option<Bar> {
        match self {
            Aggregator::Identity => Some(bar),
            Aggregator::Interval(agg) => agg.push(bar),
        }
    }
}

struct Window {
    bar: Bar,
    end: DateTime<Utc>,
}

/// Merges consecutive bars into windows of `interval`, anchored at the bar
/// that opens each window.
///
/// A window closes when an incoming bar starts at or past its end (the old
/// window is emitted and the bar opens the next one), or as soon as the
/// merged bar's own end reaches the window end.
pub struct IntervalAggregator {
    bar_duration: Duration,
    interval: Duration,
    acc: Option<Window>,
}

impl IntervalAggregator {
    pub fn new(bar_duration: Duration, interval: Duration) -> Self {
        assert!(
            interval > bar_duration,
            "aggregation interval must exceed the bar duration"
        );
        Self {
            bar_duration,
            interval,
            acc: None,
        }
    }

    pub fn push(&mut self, bar: Bar) -> Option<Bar> {
        let mut emitted = None;
        if let Some(w) = &self.acc {
            if bar.time >= w.end {
                emitted = self.acc.take().map(|w| w.bar);
            }
        }

        let interval = self.interval;
        let w = self.acc.get_or_insert_with(|| Window {
            end: bar.time + interval,
            bar: Bar {
                time: bar.time,
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: Default::default(),
            },
        });

        w.bar.close = bar.close;
        w.bar.high = w.bar.high.max(bar.high);
        w.bar.low = w.bar.low.min(bar.low);
        w.bar.volume += bar.volume;

        if bar.time + self.bar_duration >= w.end {
            emitted = self.acc.take().map(|w| w.bar);
        }

        emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    // (minute, open, high, low, close, volume)
    type Row = (i64, f64, f64, f64, f64, f64);

    fn bar(row: Row) -> Bar {
        let (minute, o, h, l, c, v) = row;
        Bar {
            time: Utc.timestamp_opt(minute * 60, 0).unwrap(),
            open: Decimal::try_from(o).unwrap(),
            high: Decimal::try_from(h).unwrap(),
            low: Decimal::try_from(l).unwrap(),
            close: Decimal::try_from(c).unwrap(),
            volume: Decimal::try_from(v).unwrap(),
        }
    }

    fn run(agg: &mut Aggregator, input: &[Row]) -> Vec<Bar> {
        input.iter().filter_map(|r| agg.push(bar(*r))).collect()
    }

    #[test]
    fn three_minute_windows() {
        let cases: &[(&[Row], &[Row])] = &[
            // Window fills at the third bar; the trailing bar is discarded.
            (
                &[
                    (1, 1.0, 3.0, 1.0, 2.0, 1.0),
                    (2, 3.0, 5.0, 3.0, 4.0, 2.0),
                    (3, 4.0, 4.0, 2.0, 3.0, 3.0),
                    (4, 9.0, 9.0, 9.0, 9.0, 9.0),
                ],
                &[(1, 1.0, 5.0, 1.0, 3.0, 6.0)],
            ),
            // Two full back-to-back windows.
            (
                &[
                    (1, 10.0, 12.0, 9.0, 11.0, 100.0),
                    (2, 11.0, 13.0, 10.0, 12.0, 200.0),
                    (3, 12.0, 12.5, 11.0, 11.5, 150.0),
                    (4, 20.0, 21.0, 19.0, 20.5, 300.0),
                    (5, 20.5, 22.0, 20.0, 21.0, 100.0),
                    (6, 21.0, 21.5, 20.5, 21.2, 50.0),
                ],
                &[
                    (1, 10.0, 13.0, 9.0, 11.5, 450.0),
                    (4, 20.0, 22.0, 19.0, 21.2, 450.0),
                ],
            ),
            // A gap closes the short first window.
            (
                &[
                    (1, 5.0, 6.0, 5.0, 5.5, 10.0),
                    (2, 5.5, 7.0, 5.5, 6.5, 20.0),
                    (7, 8.0, 9.0, 7.5, 8.5, 30.0),
                    (8, 8.5, 9.5, 8.0, 9.0, 40.0),
                    (9, 9.0, 10.0, 8.8, 9.2, 50.0),
                ],
                &[
                    (1, 5.0, 7.0, 5.0, 6.5, 30.0),
                    (7, 8.0, 10.0, 7.5, 9.2, 120.0),
                ],
            ),
            // Bars spaced a full interval apart each form their own window.
            (
                &[
                    (0, 1.0, 2.0, 1.0, 2.0, 1.0),
                    (3, 2.0, 3.0, 2.0, 3.0, 2.0),
                    (6, 3.0, 4.0, 3.0, 3.5, 3.0),
                ],
                &[(0, 1.0, 2.0, 1.0, 2.0, 1.0), (3, 2.0, 3.0, 2.0, 3.0, 2.0)],
            ),
            // A single bar never completes a window.
            (&[(100, 1.0, 1.0, 1.0, 1.0, 1.0)], &[]),
            (
                &[
                    (10, 100.0, 101.0, 99.5, 100.5, 10.0),
                    (11, 100.5, 102.0, 98.0, 99.0, 20.0),
                    (12, 99.0, 100.0, 97.5, 98.0, 30.0),
                    (13, 98.0, 98.5, 96.0, 97.0, 40.0),
                    (14, 97.0, 99.0, 95.5, 98.5, 50.0),
                    (15, 98.5, 100.0, 97.0, 99.5, 60.0),
                    (16, 99.5, 101.0, 98.5, 100.0, 70.0),
                ],
                &[
                    (10, 100.0, 102.0, 97.5, 98.0, 60.0),
                    (13, 98.0, 100.0, 95.5, 99.5, 150.0),
                ],
            ),
        ];

        for (i, (input, expected)) in cases.iter().enumerate() {
            let mut agg = Aggregator::for_bar_count(3);
            let out = run(&mut agg, input);
            let want: Vec<Bar> = expected.iter().map(|r| bar(*r)).collect();
            assert_eq!(out, want, "case {i}");
        }
    }

    #[test]
    fn open_window_survives_stream_end() {
        let mut agg = Aggregator::for_bar_count(3);

        let out = run(
            &mut agg,
            &[(1, 1.0, 3.0, 1.0, 2.0, 1.0), (2, 3.0, 5.0, 3.0, 4.0, 2.0)],
        );
        assert!(out.is_empty());

        // The same aggregator picks the window back up on the next stream.
        let out = run(&mut agg, &[(3, 4.0, 4.0, 2.0, 3.0, 3.0)]);
        assert_eq!(out, vec![bar((1, 1.0, 5.0, 1.0, 3.0, 6.0))]);
    }

    #[test]
    fn identity_passes_through() {
        let mut agg = Aggregator::for_bar_count(1);
        let rows: &[Row] = &[(1, 1.0, 2.0, 1.0, 2.0, 5.0), (2, 2.0, 3.0, 2.0, 3.0, 6.0)];
        let out = run(&mut agg, rows);
        assert_eq!(out, rows.iter().map(|r| bar(*r)).collect::<Vec<_>>());
    }
}
