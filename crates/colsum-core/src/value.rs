use std::fmt;
use std::sync::Arc;

use ordered_float::OrderedFloat;
use serde::{Serialize, Serializer};

/// One cell as yielded by a batch source, after the source's own parsing.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Missing,
    Number(f64),
    Text(Arc<str>),
}

impl CellValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Missing => serializer.serialize_none(),
            CellValue::Number(n) => serializer.serialize_f64(*n),
            CellValue::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Missing => Ok(()),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(Arc::from(value))
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CellValue::Missing)
    }
}

/// The value a row is grouped under.
///
/// Keys compare by the raw value the source yielded: `Number(1.0)` and `Text("1")` are different
/// groups. The derived ordering puts `Absent` first, then numbers in numeric order, then text in
/// lexicographic order.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKey {
    /// No grouping configured; the single implicit group.
    Absent,
    Number(OrderedFloat<f64>),
    Text(Arc<str>),
}

impl GroupKey {
    /// `None` for missing cells, which belong to no group.
    pub fn from_cell(cell: &CellValue) -> Option<GroupKey> {
        match cell {
            CellValue::Missing => None,
            CellValue::Number(n) => Some(GroupKey::Number(OrderedFloat(*n))),
            CellValue::Text(s) => Some(GroupKey::Text(Arc::clone(s))),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, GroupKey::Absent)
    }
}

impl From<&str> for GroupKey {
    fn from(value: &str) -> Self {
        GroupKey::Text(Arc::from(value))
    }
}

impl From<f64> for GroupKey {
    fn from(value: f64) -> Self {
        GroupKey::Number(OrderedFloat(value))
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Absent => Ok(()),
            GroupKey::Number(n) => {
                let n = n.into_inner();
                // `-0.0` and `0.0` are one group.
                let n = if n == 0.0 { 0.0 } else { n };
                // Integral keys (years, ids) read better without a trailing `.0`.
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{n:.0}")
                } else {
                    write!(f, "{n}")
                }
            }
            GroupKey::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for GroupKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            GroupKey::Absent => serializer.serialize_none(),
            GroupKey::Number(n) => serializer.serialize_f64(n.into_inner()),
            GroupKey::Text(s) => serializer.serialize_str(s),
        }
    }
}
