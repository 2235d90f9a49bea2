//! JSON statement parameters → Bolt values.

use std::collections::HashMap;

use neo4rs::{BoltNull, BoltType, Query};
use serde_json::Value;

use graphsync_core::Statement;

use crate::client::GraphError;

/// Convert one JSON value. Integers outside the `i64` range are rejected.
pub fn to_bolt(value: &Value) -> Result<BoltType, GraphError> {
    Ok(match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Bool(b) => (*b).into(),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.into(),
            (None, _) if n.is_u64() => {
                return Err(GraphError::Conversion(format!("integer {n} exceeds i64")));
            }
            (None, Some(f)) => f.into(),
            (None, None) => return Err(GraphError::Conversion(n.to_string())),
        },
        Value::String(s) => s.clone().into(),
        Value::Array(items) => items
            .iter()
            .map(to_bolt)
            .collect::<Result<Vec<_>, _>>()?
            .into(),
        Value::Object(entries) => entries
            .iter()
            .map(|(key, item)| Ok((key.clone(), to_bolt(item)?)))
            .collect::<Result<HashMap<String, BoltType>, GraphError>>()?
            .into(),
    })
}

/// Build a neo4rs query from a statement's text and parameters.
pub fn to_query(statement: &Statement) -> Result<Query, GraphError> {
    let mut query = neo4rs::query(&statement.statement);
    for (name, value) in &statement.parameters {
        query = query.param(name, to_bolt(value)?);
    }
    Ok(query)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn scalars_convert() {
        assert!(matches!(to_bolt(&json!(null)).unwrap(), BoltType::Null(_)));
        assert!(matches!(to_bolt(&json!(true)).unwrap(), BoltType::Boolean(_)));
        assert!(matches!(to_bolt(&json!(-3)).unwrap(), BoltType::Integer(_)));
        assert!(matches!(to_bolt(&json!(1.5)).unwrap(), BoltType::Float(_)));
        assert!(matches!(to_bolt(&json!("x")).unwrap(), BoltType::String(_)));
    }

    #[test]
    fn rows_convert_to_list_of_maps() {
        let rows = json!([{"nodeRef": -1, "props": {"name": "f", "tags": ["a"]}}]);
        match to_bolt(&rows).unwrap() {
            BoltType::List(list) => {
                assert_eq!(list.len(), 1);
                assert!(matches!(list.value[0], BoltType::Map(_)));
            }
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn oversized_integers_are_rejected() {
        let err = to_bolt(&json!(u64::MAX)).unwrap_err();
        assert!(matches!(err, GraphError::Conversion(_)));
    }
}
