//! Integer rational accumulator used to walk source coordinates.
//!
//! Stepping `dst` times by `src / dst` lands exactly on `src`, with no
//! rounding drift, so every source row and column is covered once.

/// A mixed number `i + n / d` with `0 <= n < d`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rational {
    /// Integer part
    pub i: i32,
    /// Numerator
    pub n: i32,
    /// Denominator
    pub d: i32,
}

impl Rational {
    /// Builds `i + n / d`, normalizing `n` into `[0, d)`.
    ///
    /// `d` must be positive.
    pub fn new(i: i32, n: i32, d: i32) -> Self {
        debug_assert!(d > 0, "rational denominator must be positive");
        if n < d {
            Self { i, n, d }
        } else {
            Self {
                i: i + n / d,
                n: n % d,
                d,
            }
        }
    }

    /// `self += step`. Both sides must share the same denominator.
    #[inline]
    pub fn add(&mut self, step: &Rational) {
        self.i += step.i;
        self.n += step.n;
        if self.n < 0 {
            self.i -= 1;
            self.n += self.d;
        } else if self.n >= self.d {
            self.i += 1;
            self.n -= self.d;
        }
    }

    /// Rewinds to zero while keeping the denominator.
    #[inline]
    pub fn reset(&mut self) {
        self.i = 0;
        self.n = 0;
    }

    /// Advances by `step` and returns the half-open interval that was walked.
    ///
    /// A zero-width interval is widened to one unit, so every destination
    /// sample reads at least one source pixel.
    #[inline]
    pub(crate) fn span(&mut self, step: &Rational) -> (usize, usize) {
        let start = self.i as usize;
        self.add(step);
        let mut end = self.i as usize;
        if start == end {
            end += 1;
        }
        (start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes() {
        assert_eq!(Rational::new(0, 3, 4), Rational { i: 0, n: 3, d: 4 });
        assert_eq!(Rational::new(1, 9, 4), Rational { i: 3, n: 1, d: 4 });
        assert_eq!(Rational::new(0, 8, 4), Rational { i: 2, n: 0, d: 4 });
    }

    #[test]
    fn test_add_carries() {
        let step = Rational::new(0, 3, 4);
        let mut r = Rational::new(0, 0, 4);
        r.add(&step);
        assert_eq!((r.i, r.n), (0, 3));
        r.add(&step);
        assert_eq!((r.i, r.n), (1, 2));
    }

    #[test]
    fn test_add_borrows() {
        let mut r = Rational::new(2, 1, 4);
        r.add(&Rational { i: 0, n: -3, d: 4 });
        assert_eq!((r.i, r.n), (1, 2));
    }

    #[test]
    fn test_stepping_is_exact() {
        for dst in 1..=64 {
            for src in [1, 2, 3, 7, 10, 63, 64, 100, 1920, 4097] {
                let step = Rational::new(0, src, dst);
                let mut r = Rational::new(0, 0, dst);
                let mut prev = r.i;
                for _ in 0..dst {
                    r.add(&step);
                    assert!(r.i >= prev, "stepper went backwards for {src}/{dst}");
                    assert!(r.n >= 0 && r.n < r.d);
                    prev = r.i;
                }
                assert_eq!(r.i, src, "drift for {src}/{dst}");
                assert_eq!(r.n, 0);
            }
        }
    }

    #[test]
    fn test_span_never_empty() {
        // Upscaling 2 -> 5 produces repeated source positions.
        let step = Rational::new(0, 2, 5);
        let mut r = Rational::new(0, 0, 5);
        let spans: Vec<_> = (0..5).map(|_| r.span(&step)).collect();
        assert_eq!(spans, vec![(0, 1), (0, 1), (0, 1), (1, 2), (1, 2)]);
    }
}
