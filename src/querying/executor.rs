//! Query execution: compiles a [`Query`](crate::Query) into a scan plan and walks bucket ranges
//! collecting the matching primary keys.
//!
//! The executor only produces keys. The calling operation (find, count, update, delete) fetches
//! or mutates the primary records afterwards, inside the same transaction.

use crate::querying::{Interval, Query, QueryKind};
use crate::{Error, KeySet};
use redb::ReadableTable;

// -------------------------------------------------------------------------------------------------
//
/// How the scanned bucket yields primary keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ScanMode {
    /// Primary bucket: each position's key is a primary key.
    Primary,

    /// Non-unique index bucket: each position's value decodes to a posting list of primary keys.
    Posting,

    /// Unique index bucket: each position's value is a single primary key.
    Unique,
}

// -------------------------------------------------------------------------------------------------
//
/// The compiled form of a query, ready to interpret against a bucket.
///
/// Compilation surfaces everything that was deferred while building: key-encoding failures and
/// structural misuse. Operations that need different limit semantics (`find_one`, `count`)
/// adjust the plan after compiling, not the caller's query.
#[derive(Clone, Debug)]
pub(crate) struct Plan {
    pub(crate) index: Option<&'static str>,
    pub(crate) kind: QueryKind,
    pub(crate) reverse: bool,
    pub(crate) limit: usize,
    pub(crate) offset: usize,
    pub(crate) exclude: Vec<Vec<u8>>,
}

// -------------------------------------------------------------------------------------------------
//
// Method Implementations

impl Plan {
    /// Compiles a query.
    ///
    /// # Errors
    ///
    /// * Returns [`Error::Codec`] if any value failed to encode while the query was built.
    /// * Returns [`Error::Query`] if the query has no condition, or a range condition with no
    ///   intervals.
    pub(crate) fn compile(query: &Query) -> Result<Self, Error> {
        if let Some(defect) = &query.defect {
            return Err(defect.clone().into());
        }

        let kind = match &query.kind {
            Some(QueryKind::Equal(value)) => QueryKind::Equal(value.clone()),
            Some(QueryKind::Range(intervals)) => {
                if intervals.is_empty() {
                    return Err(Error::Query {
                        reason: "range condition holds no intervals".to_owned(),
                    });
                }
                QueryKind::Range(intervals.clone())
            }
            None => {
                return Err(Error::Query {
                    reason: "query needs an equality value or a range condition".to_owned(),
                });
            }
        };

        Ok(Self {
            index: query.index,
            kind,
            reverse: query.reverse,
            limit: query.limit,
            offset: query.offset,
            exclude: query.exclude.iter().cloned().collect(),
        })
    }

    /// Returns `true` if the primary key was excluded by the query.
    fn is_excluded(&self, primary_key: &[u8]) -> bool {
        self.exclude.iter().any(|excluded| excluded == primary_key)
    }
}

// -------------------------------------------------------------------------------------------------
//
// Functions

/// Walks one bucket according to the plan and returns the matching primary keys in traversal
/// order.
///
/// Excluded keys are dropped before they count toward offset or limit. For range scans the
/// offset and limit run globally across the plan's intervals, visited in declared order.
pub(crate) fn scan_keys<T>(table: &T, plan: &Plan, mode: ScanMode) -> Result<Vec<Vec<u8>>, Error>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    match &plan.kind {
        QueryKind::Equal(value) => scan_equal(table, plan, mode, value),
        QueryKind::Range(intervals) => scan_range(table, plan, mode, intervals),
    }
}

/// Equality: a single point lookup, then exclusion, offset and limit over whatever it yielded.
fn scan_equal<T>(
    table: &T,
    plan: &Plan,
    mode: ScanMode,
    value: &[u8],
) -> Result<Vec<Vec<u8>>, Error>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let mut keys = match table.get(value)? {
        None => return Ok(Vec::new()),
        Some(guard) => match mode {
            ScanMode::Primary => vec![value.to_vec()],
            ScanMode::Unique => vec![guard.value().to_vec()],
            ScanMode::Posting => KeySet::decode(guard.value())?.into_keys(),
        },
    };

    keys.retain(|key| !plan.is_excluded(key));

    if plan.offset > 0 {
        if plan.offset >= keys.len() {
            return Ok(Vec::new());
        }
        keys.drain(..plan.offset);
    }

    if plan.limit > 0 && keys.len() > plan.limit {
        keys.truncate(plan.limit);
    }

    Ok(keys)
}

/// Range: ordered traversal of each interval, concatenated, with offset and limit applied
/// across the whole union.
fn scan_range<T>(
    table: &T,
    plan: &Plan,
    mode: ScanMode,
    intervals: &[Interval],
) -> Result<Vec<Vec<u8>>, Error>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let mut keys: Vec<Vec<u8>> = Vec::new();
    let mut left_offset = plan.offset;

    'intervals: for interval in intervals {
        if interval.is_empty() {
            continue;
        }

        let range = table.range::<&[u8]>(interval.as_byte_bounds())?;
        if plan.reverse {
            for entry in range.rev() {
                let (key, value) = entry?;
                if !consume(plan, mode, key.value(), value.value(), &mut keys, &mut left_offset)? {
                    break 'intervals;
                }
            }
        } else {
            for entry in range {
                let (key, value) = entry?;
                if !consume(plan, mode, key.value(), value.value(), &mut keys, &mut left_offset)? {
                    break 'intervals;
                }
            }
        }
    }

    Ok(keys)
}

/// Folds one cursor position into the result, honouring exclusion, offset and limit. Returns
/// `false` once the limit is reached and the scan should stop.
fn consume(
    plan: &Plan,
    mode: ScanMode,
    key: &[u8],
    value: &[u8],
    keys: &mut Vec<Vec<u8>>,
    left_offset: &mut usize,
) -> Result<bool, Error> {
    match mode {
        ScanMode::Primary | ScanMode::Unique => {
            let primary_key = match mode {
                ScanMode::Primary => key,
                _ => value,
            };
            if plan.is_excluded(primary_key) {
                return Ok(true);
            }
            if *left_offset > 0 {
                *left_offset -= 1;
                return Ok(true);
            }
            keys.push(primary_key.to_vec());
            Ok(plan.limit == 0 || keys.len() < plan.limit)
        }
        ScanMode::Posting => {
            let mut node = KeySet::decode(value)?.into_keys();
            node.retain(|primary_key| !plan.is_excluded(primary_key));

            // The whole posting list may still fall inside the offset.
            if *left_offset >= node.len() {
                *left_offset -= node.len();
                return Ok(true);
            }
            if *left_offset > 0 {
                node.drain(..*left_offset);
                *left_offset = 0;
            }

            if plan.limit > 0 {
                let room = plan.limit - keys.len();
                if node.len() > room {
                    node.truncate(room);
                }
            }

            keys.extend(node);
            Ok(plan.limit == 0 || keys.len() < plan.limit)
        }
    }
}
