use crate::{Bar, Error, Result};

/// A fixed-capacity, time-ordered window of bars for one symbol.
///
/// `head` is the count of bars ever received minus one; -1 encodes an empty
/// buffer. Writes overwrite the oldest slot once the buffer is full.
#[derive(Debug, Clone)]
pub struct Asset {
    symbol: String,
    bars: Vec<Bar>,
    head: i64,
    capacity: usize,
}

impl Asset {
    pub fn new(symbol: impl Into<String>, capacity: usize) -> Self {
        assert!(capacity >= 1, "asset buffer capacity must be at least 1");
        Self {
            symbol: symbol.into(),
            bars: Vec::with_capacity(capacity),
            head: -1,
            capacity,
        }
    }

    /// Build an asset whose buffer is already full with `bars`, oldest first.
    pub fn with_bars(symbol: impl Into<String>, bars: Vec<Bar>) -> Self {
        assert!(!bars.is_empty(), "pre-filled asset needs at least one bar");
        let capacity = bars.len();
        Self {
            symbol: symbol.into(),
            head: capacity as i64 - 1,
            bars,
            capacity,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a bar, overwriting the oldest one once full. Never fails.
    pub fn receive(&mut self, bar: Bar) {
        self.head += 1;
        let slot = self.head as usize % self.capacity;
        if slot < self.bars.len() {
            self.bars[slot] = bar;
        } else {
            self.bars.push(bar);
        }
    }

    /// Last `count` bars in chronological order.
    pub fn bars(&self, count: usize) -> Result<Vec<Bar>> {
        if count == 0 {
            return Err(Error::InvalidArgument("requested bar count is 0".into()));
        }
        if count > self.capacity {
            return Err(Error::BufferTooSmall);
        }
        if self.head < count as i64 - 1 {
            return Err(Error::InsufficientData);
        }

        let end = self.head as usize % self.capacity + 1;
        let mut out = Vec::with_capacity(count);
        if end >= count {
            out.extend_from_slice(&self.bars[end - count..end]);
        } else {
            // Window straddles the physical end of the buffer.
            out.extend_from_slice(&self.bars[self.capacity - (count - end)..]);
            out.extend_from_slice(&self.bars[..end]);
        }
        Ok(out)
    }

    pub fn last_bar(&self) -> Result<Bar> {
        if self.head < 0 {
            return Err(Error::InsufficientData);
        }
        Ok(self.bars[self.head as usize % self.capacity].clone())
    }

    /// Whether `bars(count)` would succeed; `count` of 0 always holds.
    pub fn has_bars(&self, count: usize) -> bool {
        count <= self.capacity && self.head >= count as i64 - 1
    }

    /// Number of bars currently held, at most the capacity.
    pub fn len(&self) -> usize {
        (self.head + 1).min(self.capacity as i64) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.head < 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use rust_decimal::prelude::ToPrimitive;
    use rust_decimal::Decimal;

    fn bar(close: i64) -> Bar {
        Bar {
            time: Utc.timestamp_opt(close * 60, 0).unwrap(),
            open: Decimal::from(close),
            high: Decimal::from(close),
            low: Decimal::from(close),
            close: Decimal::from(close),
            volume: Decimal::ONE,
        }
    }

    fn closes(bars: &[Bar]) -> Vec<i64> {
        bars.iter().map(|b| b.close.to_i64().unwrap()).collect()
    }

    #[test]
    fn bars_returns_last_n_in_order() {
        let cases: &[(&[i64], usize, usize, &[i64])] = &[
            (&[1, 2, 3, 4, 5, 6], 6, 1, &[6]),
            (&[-1, -2, -3, -4, -5, -6], 6, 3, &[-4, -5, -6]),
            (&[10, -10, 20, -20], 4, 4, &[10, -10, 20, -20]),
            (&[1, 2, 3, 4, 5, 6], 4, 4, &[3, 4, 5, 6]),
        ];

        for (input, capacity, count, expected) in cases {
            let mut a = Asset::new("sym", *capacity);
            for c in *input {
                a.receive(bar(*c));
            }
            assert_eq!(&closes(&a.bars(*count).unwrap()), expected);
        }
    }

    #[test]
    fn bars_error_kinds() {
        let mut a = Asset::new("sym", 3);
        assert!(matches!(a.bars(0), Err(Error::InvalidArgument(_))));
        assert!(matches!(a.bars(4), Err(Error::BufferTooSmall)));
        assert!(matches!(a.bars(1), Err(Error::InsufficientData)));

        a.receive(bar(1));
        assert!(a.bars(1).is_ok());
        assert!(matches!(a.bars(2), Err(Error::InsufficientData)));
    }

    #[test]
    fn wrap_around_keeps_latest_window() {
        let mut a = Asset::new("sym", 3);
        for c in 1..=5 {
            a.receive(bar(c));
        }
        assert_eq!(closes(&a.bars(3).unwrap()), vec![3, 4, 5]);
        assert_eq!(a.last_bar().unwrap().close.to_i64().unwrap(), 5);
    }

    #[test]
    fn last_bar_fails_on_empty() {
        let a = Asset::new("sym", 2);
        assert!(matches!(a.last_bar(), Err(Error::InsufficientData)));
    }

    #[test]
    fn with_bars_is_full() {
        let a = Asset::with_bars("sym", vec![bar(7), bar(8)]);
        assert_eq!(closes(&a.bars(2).unwrap()), vec![7, 8]);
        assert!(a.has_bars(2));
        assert!(!a.has_bars(3));
    }

    proptest! {
        /// After any receive sequence, `bars(k)` returns the last k received
        /// bars in order, and `has_bars` agrees with its success.
        #[test]
        fn round_trip_and_has_bars_agree(
            capacity in 1usize..16,
            values in prop::collection::vec(-1000i64..1000, 0..64),
        ) {
            let mut a = Asset::new("sym", capacity);
            for v in &values {
                a.receive(bar(*v));
            }

            for k in 1..=capacity {
                let got = a.bars(k);
                prop_assert_eq!(a.has_bars(k), got.is_ok());
                if k <= values.len() {
                    let expected = &values[values.len() - k..];
                    prop_assert_eq!(closes(&got.unwrap()), expected.to_vec());
                } else {
                    prop_assert!(matches!(got, Err(Error::InsufficientData)));
                }
            }
        }
    }
}
