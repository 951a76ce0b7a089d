//! Declarative queries over the primary key or a named index.
//!
//! A [`Query`] names its target (primary key or index), carries either an equality value or a
//! [`RangeCondition`], and adds limit, offset, direction and exclusions. Conditions compose from
//! bound atoms:
//!
//! ```rust
//! use redbhold::{Query, RangeCondition};
//!
//! // records whose LastAccessTime lies in [-40, 40], newest first, at most ten
//! let query = Query::index("LastAccessTime")
//!     .range(RangeCondition::ge(-40_i64).and(RangeCondition::le(40_i64)))
//!     .limit(10)
//!     .desc();
//!
//! // records whose primary key is "20"
//! let query = Query::key().equal("20");
//!
//! // two disjoint rate bands, results concatenated in declared order
//! let query = Query::index("Rate").range(
//!     RangeCondition::between(-20.0_f64, true, -10.0_f64, true)
//!         .or(RangeCondition::between(10.0_f64, true, 20.0_f64, true)),
//! );
//! ```
//!
//! Values are encoded with the key codec when the builder runs; an encoding failure is held
//! inside the builder and surfaced when the query executes, so chains stay infallible.

pub(crate) mod executor;

use crate::codecs::keys::{KeyEncode, KeyError};
use std::cmp::Ordering;
use std::ops::Bound;

// -------------------------------------------------------------------------------------------------
//
/// One contiguous range of encoded keys: a lower and an upper bound, either of which may be
/// absent. The compiled form of one or two range criteria.
#[derive(Clone, Debug)]
pub(crate) struct Interval {
    pub(crate) lower: Bound<Vec<u8>>,
    pub(crate) upper: Bound<Vec<u8>>,
}

impl Interval {
    /// Intersects two intervals: the tighter bound wins on each side.
    fn intersect(&self, other: &Self) -> Self {
        Self {
            lower: tighter(&self.lower, &other.lower, Ordering::Greater),
            upper: tighter(&self.upper, &other.upper, Ordering::Less),
        }
    }

    /// Returns `true` if no key can satisfy both bounds.
    pub(crate) fn is_empty(&self) -> bool {
        let (lower, upper) = match (&self.lower, &self.upper) {
            (
                Bound::Included(lower) | Bound::Excluded(lower),
                Bound::Included(upper) | Bound::Excluded(upper),
            ) => (lower, upper),
            _ => return false,
        };
        match lower.cmp(upper) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => {
                !matches!((&self.lower, &self.upper), (Bound::Included(_), Bound::Included(_)))
            }
        }
    }

    /// Borrows the interval as the bound pair the storage range scan takes.
    pub(crate) fn as_byte_bounds(&self) -> (Bound<&[u8]>, Bound<&[u8]>) {
        (borrow_bound(&self.lower), borrow_bound(&self.upper))
    }
}

fn borrow_bound(bound: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(value) => Bound::Included(value.as_slice()),
        Bound::Excluded(value) => Bound::Excluded(value.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

/// Picks the tighter of two like-side bounds; `wins` says which comparison result makes the
/// first bound the tighter one (`Greater` for lower bounds, `Less` for upper bounds). On equal
/// values the exclusive bound is tighter.
fn tighter(a: &Bound<Vec<u8>>, b: &Bound<Vec<u8>>, wins: Ordering) -> Bound<Vec<u8>> {
    match (a, b) {
        (Bound::Unbounded, other) | (other, Bound::Unbounded) => other.clone(),
        (
            Bound::Included(left) | Bound::Excluded(left),
            Bound::Included(right) | Bound::Excluded(right),
        ) => match left.cmp(right) {
            ordering if ordering == wins => a.clone(),
            Ordering::Equal => {
                if matches!(a, Bound::Excluded(_)) {
                    a.clone()
                } else {
                    b.clone()
                }
            }
            _ => b.clone(),
        },
    }
}

// -------------------------------------------------------------------------------------------------
//
/// A composable range condition over one field: bound atoms joined by [`and`](Self::and)
/// (intersection into one interval) and [`or`](Self::or) (an ordered union of disjoint
/// intervals).
///
/// Executed against a query target, each interval is scanned in declared order and the results
/// are concatenated; `limit` and `offset` apply across the whole union.
#[derive(Clone, Debug)]
pub struct RangeCondition {
    /// Intervals in declared order, or the first key-encoding failure met while building.
    intervals: Result<Vec<Interval>, KeyError>,
}

// -------------------------------------------------------------------------------------------------
//
// Method Implementations

impl RangeCondition {
    fn atom(value: impl KeyEncode, build: impl FnOnce(Vec<u8>) -> Interval) -> Self {
        Self {
            intervals: value.encode_key().map(|bytes| vec![build(bytes)]),
        }
    }

    /// Keys strictly greater than `value`.
    #[must_use]
    pub fn gt(value: impl KeyEncode) -> Self {
        Self::atom(value, |bytes| Interval {
            lower: Bound::Excluded(bytes),
            upper: Bound::Unbounded,
        })
    }

    /// Keys greater than or equal to `value`.
    #[must_use]
    pub fn ge(value: impl KeyEncode) -> Self {
        Self::atom(value, |bytes| Interval {
            lower: Bound::Included(bytes),
            upper: Bound::Unbounded,
        })
    }

    /// Keys strictly less than `value`.
    #[must_use]
    pub fn lt(value: impl KeyEncode) -> Self {
        Self::atom(value, |bytes| Interval {
            lower: Bound::Unbounded,
            upper: Bound::Excluded(bytes),
        })
    }

    /// Keys less than or equal to `value`.
    #[must_use]
    pub fn le(value: impl KeyEncode) -> Self {
        Self::atom(value, |bytes| Interval {
            lower: Bound::Unbounded,
            upper: Bound::Included(bytes),
        })
    }

    /// Keys between `lower` and `upper`, with each edge inclusive or exclusive as flagged.
    #[must_use]
    pub fn between(
        lower: impl KeyEncode,
        lower_inclusive: bool,
        upper: impl KeyEncode,
        upper_inclusive: bool,
    ) -> Self {
        let build = || -> Result<Interval, KeyError> {
            let lower = lower.encode_key()?;
            let upper = upper.encode_key()?;
            Ok(Interval {
                lower: if lower_inclusive { Bound::Included(lower) } else { Bound::Excluded(lower) },
                upper: if upper_inclusive { Bound::Included(upper) } else { Bound::Excluded(upper) },
            })
        };
        Self {
            intervals: build().map(|interval| vec![interval]),
        }
    }

    /// Intersects with another condition: every interval of `self` is narrowed by every
    /// interval of `other`. For two single-interval conditions this is plain conjunction.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        let intervals = match (self.intervals, other.intervals) {
            (Ok(left), Ok(right)) => Ok(left
                .iter()
                .flat_map(|a| right.iter().map(|b| a.intersect(b)))
                .collect()),
            (Err(error), _) | (_, Err(error)) => Err(error),
        };
        Self { intervals }
    }

    /// Unions with another condition: `other`'s intervals are appended after `self`'s. The
    /// executor visits intervals in this declared order.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        let intervals = match (self.intervals, other.intervals) {
            (Ok(mut left), Ok(right)) => {
                left.extend(right);
                Ok(left)
            }
            (Err(error), _) | (_, Err(error)) => Err(error),
        };
        Self { intervals }
    }

    pub(crate) fn into_intervals(self) -> Result<Vec<Interval>, KeyError> {
        self.intervals
    }
}

// -------------------------------------------------------------------------------------------------
//
/// What a query matches: a single key, or a union of key ranges.
#[derive(Clone, Debug)]
pub(crate) enum QueryKind {
    Equal(Vec<u8>),
    Range(Vec<Interval>),
}

// -------------------------------------------------------------------------------------------------
//
/// A declarative query: a target (primary key or named index), an equality value or range
/// condition, and limit/offset/direction/exclusion modifiers.
///
/// Build with [`Query::key`] or [`Query::index`], then chain modifiers. Queries are inert
/// values; nothing touches the store until they are passed to a find/count/update/delete
/// operation.
#[derive(Clone, Debug)]
pub struct Query {
    /// `None` targets the primary bucket; `Some` the named index.
    pub(crate) index: Option<&'static str>,

    /// Equality or range; `None` until one of the two builders ran.
    pub(crate) kind: Option<QueryKind>,

    /// Maximum number of results; `0` means unlimited.
    pub(crate) limit: usize,

    /// Number of matches to skip before yielding results.
    pub(crate) offset: usize,

    /// `false` ascending, `true` descending key order.
    pub(crate) reverse: bool,

    /// Encoded primary keys dropped from results before offset and limit accounting.
    pub(crate) exclude: tinyvec::TinyVec<[Vec<u8>; 4]>,

    /// First key-encoding failure met while building; surfaced when the query runs.
    pub(crate) defect: Option<KeyError>,
}

// -------------------------------------------------------------------------------------------------
//
// Method Implementations

impl Query {
    fn new(index: Option<&'static str>) -> Self {
        Self {
            index,
            kind: None,
            limit: 0,
            offset: 0,
            reverse: false,
            exclude: tinyvec::TinyVec::default(),
            defect: None,
        }
    }

    /// Starts a query against the primary key.
    #[must_use]
    pub fn key() -> Self {
        Self::new(None)
    }

    /// Starts a query against the named index.
    #[must_use]
    pub fn index(name: &'static str) -> Self {
        Self::new(Some(name))
    }

    /// Matches keys equal to `value`. Replaces any previously set condition.
    #[must_use]
    pub fn equal(mut self, value: impl KeyEncode) -> Self {
        match value.encode_key() {
            Ok(bytes) => self.kind = Some(QueryKind::Equal(bytes)),
            Err(error) => self.poison(error),
        }
        self
    }

    /// Matches keys inside `condition`. Repeated calls append further intervals to the union.
    #[must_use]
    pub fn range(mut self, condition: RangeCondition) -> Self {
        match condition.into_intervals() {
            Ok(intervals) => match &mut self.kind {
                Some(QueryKind::Range(existing)) => existing.extend(intervals),
                _ => self.kind = Some(QueryKind::Range(intervals)),
            },
            Err(error) => self.poison(error),
        }
        self
    }

    /// Caps the number of results. `0` (the default) means unlimited.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Skips the first `offset` matches.
    #[must_use]
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Traverses keys in ascending order (the default).
    #[must_use]
    pub fn asc(mut self) -> Self {
        self.reverse = false;
        self
    }

    /// Traverses keys in descending order.
    #[must_use]
    pub fn desc(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// Drops the record with the given primary key from the results, before offset and limit
    /// are accounted. May be chained to exclude several keys.
    #[must_use]
    pub fn exclude(mut self, primary_key: impl KeyEncode) -> Self {
        match primary_key.encode_key() {
            Ok(bytes) => self.exclude.push(bytes),
            Err(error) => self.poison(error),
        }
        self
    }

    /// Keeps the first builder failure; later ones would only shadow the root cause.
    fn poison(&mut self, error: KeyError) {
        self.defect.get_or_insert(error);
    }
}

// -------------------------------------------------------------------------------------------------
//
// Unit Tests

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds_of(condition: RangeCondition) -> Vec<(Bound<Vec<u8>>, Bound<Vec<u8>>)> {
        condition
            .into_intervals()
            .unwrap()
            .into_iter()
            .map(|interval| (interval.lower, interval.upper))
            .collect()
    }

    #[test]
    fn and_intersects_into_one_interval() {
        let condition = RangeCondition::ge(10_u64).and(RangeCondition::le(20_u64));
        let bounds = bounds_of(condition);
        assert_eq!(bounds.len(), 1);
        assert_eq!(
            bounds[0],
            (
                Bound::Included(10_u64.to_be_bytes().to_vec()),
                Bound::Included(20_u64.to_be_bytes().to_vec()),
            )
        );
    }

    #[test]
    fn and_keeps_the_tighter_of_two_like_bounds() {
        let condition = RangeCondition::ge(10_u64).and(RangeCondition::gt(10_u64));
        let bounds = bounds_of(condition);
        assert_eq!(bounds[0].0, Bound::Excluded(10_u64.to_be_bytes().to_vec()));

        let condition = RangeCondition::ge(5_u64).and(RangeCondition::ge(9_u64));
        let bounds = bounds_of(condition);
        assert_eq!(bounds[0].0, Bound::Included(9_u64.to_be_bytes().to_vec()));
    }

    #[test]
    fn or_keeps_declared_order() {
        let condition = RangeCondition::between(30_u64, true, 40_u64, true)
            .or(RangeCondition::between(10_u64, true, 20_u64, true));
        let bounds = bounds_of(condition);
        assert_eq!(bounds.len(), 2);
        assert_eq!(bounds[0].0, Bound::Included(30_u64.to_be_bytes().to_vec()));
        assert_eq!(bounds[1].0, Bound::Included(10_u64.to_be_bytes().to_vec()));
    }

    #[test]
    fn inverted_intervals_are_empty() {
        let intervals = RangeCondition::ge(20_u64)
            .and(RangeCondition::le(10_u64))
            .into_intervals()
            .unwrap();
        assert!(intervals[0].is_empty());

        let intervals = RangeCondition::gt(10_u64)
            .and(RangeCondition::lt(10_u64))
            .into_intervals()
            .unwrap();
        assert!(intervals[0].is_empty());
    }

    #[test]
    fn closed_point_interval_is_not_empty() {
        let intervals = RangeCondition::ge(10_u64)
            .and(RangeCondition::le(10_u64))
            .into_intervals()
            .unwrap();
        assert!(!intervals[0].is_empty());
    }
}
