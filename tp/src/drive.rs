//! Fractional-progress driver
//!
//! Wraps an iteration over one or more exact-size dimensions, computing a
//! monotonically increasing completion fraction across the whole cross
//! product and throttling emission so tight loops with millions of elements
//! publish a bounded number of updates (roughly `1/threshold`).
//!
//! Dimensions are listed fastest-first: in `drive2(fast, slow, ..)` the
//! first dimension is the innermost, and comprehension mode linearizes its
//! [`Grid`] the same way, so loop and comprehension forms over the same
//! space produce identical fraction sequences.
//!
//! Each driven loop emits one indeterminate record before the first element
//! and exactly one terminal record after the loop concludes - by normal
//! completion, `ControlFlow::Break`, a body error, or a panic. Elements are
//! counted as they complete, never indexed, so plain sequential iterables
//! and offset index spaces need no special handling.

use std::ops::ControlFlow;

use tracing::debug;

use crate::reporter::Reporter;
use crate::scope::ScopeGuard;

/// Default emission threshold: at most ~200 updates per driven loop
pub const DEFAULT_THRESHOLD: f64 = 0.005;

/// Throttled fraction counter over a fixed-size iteration space
#[derive(Debug, Clone)]
pub struct Throttle {
    total: usize,
    completed: usize,
    last_emitted: f64,
    threshold: f64,
}

impl Throttle {
    /// Counter for `total` elements with the given minimum emission gap
    pub fn new(total: usize, threshold: f64) -> Self {
        Self {
            total,
            completed: 0,
            last_emitted: 0.0,
            threshold,
        }
    }

    /// Record one completed element
    ///
    /// Returns the fraction to emit when the gap since the last emitted
    /// fraction exceeds the threshold, `None` while suppressed. Fractions
    /// are in `(0, 1]` and strictly increase across calls.
    pub fn advance(&mut self) -> Option<f64> {
        self.completed += 1;
        let fraction = self.completed as f64 / self.total as f64;
        if fraction - self.last_emitted > self.threshold {
            self.last_emitted = fraction;
            Some(fraction)
        } else {
            None
        }
    }

    /// Elements completed so far
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Size of the iteration space
    pub fn total(&self) -> usize {
        self.total
    }
}

/// Cross-product shaped container for comprehension-mode results
///
/// Linearized with the first (fastest) dimension contiguous, matching the
/// order the driver visits elements in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid<T> {
    shape: Vec<usize>,
    data: Vec<T>,
}

impl<T> Grid<T> {
    fn new(shape: Vec<usize>, data: Vec<T>) -> Self {
        debug_assert_eq!(shape.iter().product::<usize>(), data.len());
        Self { shape, data }
    }

    /// Length of each dimension, fastest first
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Linearized cells, fastest dimension contiguous
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Consume the grid, keeping the linearized cells
    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    /// Cell at a zero-based multi-dimensional index, fastest first
    pub fn get(&self, index: &[usize]) -> Option<&T> {
        if index.len() != self.shape.len() {
            return None;
        }
        let mut linear = 0;
        let mut stride = 1;
        for (&i, &len) in index.iter().zip(&self.shape) {
            if i >= len {
                return None;
            }
            linear += i * stride;
            stride *= len;
        }
        self.data.get(linear)
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether any dimension was empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Reporter {
    fn step(&self, scope: &ScopeGuard, throttle: &mut Throttle) -> eyre::Result<()> {
        if let Some(fraction) = throttle.advance() {
            scope.update(fraction)?;
        }
        Ok(())
    }

    /// Drive a single loop
    ///
    /// The body runs once per element; returning `ControlFlow::Break(())`
    /// stops the loop early (skipping an element is returning `Continue`
    /// before doing its work). The terminal record is emitted either way.
    pub fn drive<I, F>(&self, name: &str, range: I, mut body: F) -> eyre::Result<()>
    where
        I: IntoIterator,
        I::IntoIter: ExactSizeIterator,
        F: FnMut(I::Item) -> ControlFlow<()>,
    {
        self.try_drive(name, range, move |item| Ok(body(item)))
    }

    /// Drive a single loop with a fallible body
    ///
    /// A body error stops the loop and propagates unchanged - after the
    /// terminal record has been emitted.
    pub fn try_drive<I, F>(&self, name: &str, range: I, mut body: F) -> eyre::Result<()>
    where
        I: IntoIterator,
        I::IntoIter: ExactSizeIterator,
        F: FnMut(I::Item) -> eyre::Result<ControlFlow<()>>,
    {
        let iter = range.into_iter();
        let mut throttle = Throttle::new(iter.len(), self.threshold());
        debug!(name, total = throttle.total(), "try_drive: starting");
        let scope = self.scope(name)?;
        for item in iter {
            let flow = body(item)?;
            self.step(&scope, &mut throttle)?;
            if flow.is_break() {
                debug!(id = %scope.id(), completed = throttle.completed(), "try_drive: body broke out");
                break;
            }
        }
        Ok(())
    }

    /// Drive two nested dimensions, `fast` innermost
    pub fn drive2<I1, I2, F>(&self, name: &str, fast: I1, slow: I2, mut body: F) -> eyre::Result<()>
    where
        I1: IntoIterator,
        I1::IntoIter: ExactSizeIterator + Clone,
        I2: IntoIterator,
        I2::IntoIter: ExactSizeIterator,
        I2::Item: Clone,
        F: FnMut(I1::Item, I2::Item) -> ControlFlow<()>,
    {
        self.try_drive2(name, fast, slow, move |a, b| Ok(body(a, b)))
    }

    /// Drive two nested dimensions with a fallible body
    pub fn try_drive2<I1, I2, F>(&self, name: &str, fast: I1, slow: I2, mut body: F) -> eyre::Result<()>
    where
        I1: IntoIterator,
        I1::IntoIter: ExactSizeIterator + Clone,
        I2: IntoIterator,
        I2::IntoIter: ExactSizeIterator,
        I2::Item: Clone,
        F: FnMut(I1::Item, I2::Item) -> eyre::Result<ControlFlow<()>>,
    {
        let fast = fast.into_iter();
        let slow = slow.into_iter();
        let mut throttle = Throttle::new(fast.len() * slow.len(), self.threshold());
        debug!(name, total = throttle.total(), "try_drive2: starting");
        let scope = self.scope(name)?;
        'outer: for slow_item in slow {
            for fast_item in fast.clone() {
                let flow = body(fast_item, slow_item.clone())?;
                self.step(&scope, &mut throttle)?;
                if flow.is_break() {
                    debug!(id = %scope.id(), completed = throttle.completed(), "try_drive2: body broke out");
                    break 'outer;
                }
            }
        }
        Ok(())
    }

    /// Drive three nested dimensions, `fast` innermost, `slow` outermost
    pub fn drive3<I1, I2, I3, F>(&self, name: &str, fast: I1, mid: I2, slow: I3, mut body: F) -> eyre::Result<()>
    where
        I1: IntoIterator,
        I1::IntoIter: ExactSizeIterator + Clone,
        I2: IntoIterator,
        I2::IntoIter: ExactSizeIterator + Clone,
        I2::Item: Clone,
        I3: IntoIterator,
        I3::IntoIter: ExactSizeIterator,
        I3::Item: Clone,
        F: FnMut(I1::Item, I2::Item, I3::Item) -> ControlFlow<()>,
    {
        let fast = fast.into_iter();
        let mid = mid.into_iter();
        let slow = slow.into_iter();
        let mut throttle = Throttle::new(fast.len() * mid.len() * slow.len(), self.threshold());
        debug!(name, total = throttle.total(), "drive3: starting");
        let scope = self.scope(name)?;
        'outer: for slow_item in slow {
            for mid_item in mid.clone() {
                for fast_item in fast.clone() {
                    let flow = body(fast_item, mid_item.clone(), slow_item.clone());
                    self.step(&scope, &mut throttle)?;
                    if flow.is_break() {
                        break 'outer;
                    }
                }
            }
        }
        Ok(())
    }

    /// Comprehension over a single dimension
    ///
    /// Collects each element's result; the container and the fraction
    /// sequence match what the loop form over the same range produces.
    pub fn collect<I, R, F>(&self, name: &str, range: I, mut f: F) -> eyre::Result<Vec<R>>
    where
        I: IntoIterator,
        I::IntoIter: ExactSizeIterator,
        F: FnMut(I::Item) -> R,
    {
        let iter = range.into_iter();
        let total = iter.len();
        let mut throttle = Throttle::new(total, self.threshold());
        debug!(name, total, "collect: starting");
        let scope = self.scope(name)?;
        let mut data = Vec::with_capacity(total);
        for item in iter {
            data.push(f(item));
            self.step(&scope, &mut throttle)?;
        }
        Ok(data)
    }

    /// Comprehension over two dimensions, `fast` contiguous in the result
    pub fn collect2<I1, I2, R, F>(&self, name: &str, fast: I1, slow: I2, mut f: F) -> eyre::Result<Grid<R>>
    where
        I1: IntoIterator,
        I1::IntoIter: ExactSizeIterator + Clone,
        I2: IntoIterator,
        I2::IntoIter: ExactSizeIterator,
        I2::Item: Clone,
        F: FnMut(I1::Item, I2::Item) -> R,
    {
        let fast = fast.into_iter();
        let slow = slow.into_iter();
        let shape = vec![fast.len(), slow.len()];
        let mut throttle = Throttle::new(fast.len() * slow.len(), self.threshold());
        debug!(name, total = throttle.total(), "collect2: starting");
        let scope = self.scope(name)?;
        let mut data = Vec::with_capacity(throttle.total());
        for slow_item in slow {
            for fast_item in fast.clone() {
                data.push(f(fast_item, slow_item.clone()));
                self.step(&scope, &mut throttle)?;
            }
        }
        Ok(Grid::new(shape, data))
    }

    /// Comprehension over three dimensions
    pub fn collect3<I1, I2, I3, R, F>(&self, name: &str, fast: I1, mid: I2, slow: I3, mut f: F) -> eyre::Result<Grid<R>>
    where
        I1: IntoIterator,
        I1::IntoIter: ExactSizeIterator + Clone,
        I2: IntoIterator,
        I2::IntoIter: ExactSizeIterator + Clone,
        I2::Item: Clone,
        I3: IntoIterator,
        I3::IntoIter: ExactSizeIterator,
        I3::Item: Clone,
        F: FnMut(I1::Item, I2::Item, I3::Item) -> R,
    {
        let fast = fast.into_iter();
        let mid = mid.into_iter();
        let slow = slow.into_iter();
        let shape = vec![fast.len(), mid.len(), slow.len()];
        let mut throttle = Throttle::new(shape.iter().product(), self.threshold());
        debug!(name, total = throttle.total(), "collect3: starting");
        let scope = self.scope(name)?;
        let mut data = Vec::with_capacity(throttle.total());
        for slow_item in slow {
            for mid_item in mid.clone() {
                for fast_item in fast.clone() {
                    data.push(f(fast_item, mid_item.clone(), slow_item.clone()));
                    self.step(&scope, &mut throttle)?;
                }
            }
        }
        Ok(Grid::new(shape, data))
    }
}
