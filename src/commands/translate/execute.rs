use std::error::Error;

use serde::Serialize;
use serde_json::Value;

use super::TranslateCmd;
use crate::commands::Execute;
use crate::db::SqlValue;
use crate::store::{GraphStore, MatchTarget};

/// Result of the translate command
#[derive(Debug, Serialize)]
pub struct TranslateResult {
    pub expression: String,
    pub target: MatchTarget,
    pub sql: String,
    pub params: Vec<Value>,
}

fn json_param(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Int(i) => Value::from(*i),
        SqlValue::Float(f) => Value::from(*f),
        SqlValue::Text(s) => Value::from(s.as_str()),
    }
}

impl Execute for TranslateCmd {
    type Output = TranslateResult;

    fn execute(self, store: &mut GraphStore) -> Result<Self::Output, Box<dyn Error>> {
        let target = self.target();
        let query = store.compile(target, &self.expression, self.projection.into(), None)?;
        Ok(TranslateResult {
            expression: self.expression,
            target,
            sql: query.sql,
            params: query.params.iter().map(json_param).collect(),
        })
    }
}
