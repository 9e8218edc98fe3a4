// SPDX-License-Identifier: Apache-2.0

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One `(column, ascending)` pair of a sort specification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SortKey {
    pub column: String,
    pub ascending: bool,
}

impl SortKey {
    #[must_use]
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ascending: true,
        }
    }

    #[must_use]
    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ascending: false,
        }
    }
}

// Callers send either `["gc", 0]`, `["gc", true]` or `{"column": .., "ascending": ..}`.
impl<'de> Deserialize<'de> for SortKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        let (column, flag) = match raw {
            Value::Array(mut items) if items.len() == 2 => {
                let flag = items.pop().unwrap_or(Value::Null);
                let column = items.pop().unwrap_or(Value::Null);
                (column, flag)
            }
            Value::Object(mut map) => (
                map.remove("column").unwrap_or(Value::Null),
                map.remove("ascending").unwrap_or(Value::Bool(true)),
            ),
            _ => {
                return Err(de::Error::custom(
                    "sort key must be [column, ascending] or {column, ascending}",
                ))
            }
        };
        let column = column
            .as_str()
            .ok_or_else(|| de::Error::custom("sort column must be a string"))?
            .to_string();
        let ascending = match flag {
            Value::Bool(b) => b,
            Value::Number(n) => n.as_i64().map(|v| v > 0).unwrap_or(false),
            _ => return Err(de::Error::custom("sort direction must be a bool or 0/1")),
        };
        Ok(Self { column, ascending })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortSpec(pub Vec<SortKey>);

impl SortSpec {
    #[must_use]
    pub fn new(keys: Vec<SortKey>) -> Self {
        Self(keys)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &SortKey> {
        self.0.iter()
    }

    #[must_use]
    pub fn first(&self) -> Option<&SortKey> {
        self.0.first()
    }
}

impl From<Vec<SortKey>> for SortSpec {
    fn from(value: Vec<SortKey>) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_tuple_and_object_forms() {
        let spec: SortSpec = serde_json::from_value(json!([
            ["gc", 0],
            ["bin_id", true],
            {"column": "cov", "ascending": false}
        ]))
        .expect("spec");
        assert_eq!(
            spec,
            SortSpec(vec![
                SortKey::desc("gc"),
                SortKey::asc("bin_id"),
                SortKey::desc("cov")
            ])
        );
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(serde_json::from_value::<SortKey>(json!(["gc"])).is_err());
        assert!(serde_json::from_value::<SortKey>(json!([1, 1])).is_err());
        assert!(serde_json::from_value::<SortKey>(json!(["gc", "up"])).is_err());
    }
}
