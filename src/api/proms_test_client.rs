//! Implements the `Proms` trait with canned JSON bodies so that a sync can run without network
//! access.

use crate::api::Proms;
use crate::model::Division;
use crate::Result;
use chrono::{Datelike, NaiveDate};
use serde_json::{json, Value};
use std::collections::HashMap;

/// How `TestProms` answers a request it has no canned response for.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Fallback {
    /// `{"success": false, "message": []}`
    Empty,
    /// A deterministic record per date and division.
    Synthetic,
}

/// An implementation of the `Proms` trait that does not touch the network. Every request is
/// recorded in `calls`.
#[derive(Debug, Clone)]
pub(crate) struct TestProms {
    responses: HashMap<(NaiveDate, String), Value>,
    fallback: Fallback,
    calls: Vec<(NaiveDate, String)>,
}

impl TestProms {
    /// Answers from `responses`, keyed by date and division id. Anything else is an empty
    /// `success: false` body.
    pub(crate) fn with_responses(responses: HashMap<(NaiveDate, String), Value>) -> Self {
        Self {
            responses,
            fallback: Fallback::Empty,
            calls: Vec::new(),
        }
    }

    /// Returns one plausible record for each request. Weekends have no data and a non-numeric
    /// division id is refused with an error message.
    pub(crate) fn synthetic() -> Self {
        Self {
            responses: HashMap::new(),
            fallback: Fallback::Synthetic,
            calls: Vec::new(),
        }
    }

    /// The (date, division id) pairs requested so far, in order.
    pub(crate) fn calls(&self) -> &[(NaiveDate, String)] {
        &self.calls
    }
}

#[async_trait::async_trait]
impl Proms for TestProms {
    async fn fetch(&mut self, date: NaiveDate, division: &Division) -> Result<Value> {
        let key = (date, division.id().to_string());
        self.calls.push(key.clone());
        if let Some(response) = self.responses.get(&key) {
            return Ok(response.clone());
        }
        Ok(match self.fallback {
            Fallback::Empty => json!({"success": false, "message": []}),
            Fallback::Synthetic => synthetic_response(date, division),
        })
    }
}

fn synthetic_response(date: NaiveDate, division: &Division) -> Value {
    if division.id().parse::<u64>().is_err() {
        return json!({"success": false, "message": "Invalid division_id"});
    }
    if date.weekday().number_from_monday() > 5 {
        return json!({"success": false, "message": []});
    }
    let day = date.day();
    json!({
        "success": true,
        "message": [{
            "created_at": format!("{} 09:{:02}:00", date.format("%Y-%m-%d"), day % 60),
            "ttc": 1 + day % 4,
            "cxy": 1 + day % 3,
            "rps": 1 + day % 2,
            "time_input": null,
            "remarks": format!("daily report from {}", division.name()),
            "score": 3 + day % 3,
        }]
    })
}
