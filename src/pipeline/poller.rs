use crate::api::Proms;
use crate::model::{DateRange, Division, Divisions, Row, Table};
use crate::pipeline::DIVISION;
use crate::Result;
use anyhow::{bail, Context};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// What a single PROMS request produced.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DivisionOutcome {
    /// `success` was true; these are the records from `message`.
    Available(Vec<Row>),
    /// `success` was not true and nothing explained why.
    Empty,
    /// `success` was not true and `message` carried an explanation.
    Rejected(String),
}

impl DivisionOutcome {
    /// Classifies a decoded PROMS body. A body that does not have the expected shape is an
    /// error; a body that only says "no" is not.
    pub(crate) fn classify(body: &Value) -> Result<Self> {
        let object = body
            .as_object()
            .context("PROMS response is not a JSON object")?;
        let success = object
            .get("success")
            .context("PROMS response has no 'success' field")?;
        let message = object.get("message");

        if !is_true(success) {
            return Ok(match message {
                None | Some(Value::Null) => Self::Empty,
                Some(Value::Array(items)) if items.is_empty() => Self::Empty,
                Some(Value::String(s)) if s.trim().is_empty() => Self::Empty,
                Some(Value::String(s)) => Self::Rejected(s.clone()),
                Some(other) => Self::Rejected(other.to_string()),
            });
        }

        let items = match message {
            Some(Value::Array(items)) => items,
            Some(other) => bail!("PROMS reported success but 'message' is not a list: {other}"),
            None => bail!("PROMS reported success without a 'message' field"),
        };
        let records = items
            .iter()
            .map(|item| match item {
                Value::Object(record) => Ok(record.clone()),
                other => bail!("PROMS record is not a JSON object: {other}"),
            })
            .collect::<Result<Vec<Row>>>()?;
        Ok(Self::Available(records))
    }
}

/// `true`, or `1` the way loosely typed APIs sometimes send it.
fn is_true(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() == Some(1.0),
        _ => false,
    }
}

/// The outcome of the request for one date and division.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DivisionFetch {
    pub(crate) date: NaiveDate,
    pub(crate) division: Division,
    pub(crate) outcome: DivisionOutcome,
}

/// Per-day tally of request outcomes.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct DayReport {
    pub date: NaiveDate,
    pub available: usize,
    pub empty: usize,
    pub rejected: usize,
}

impl DayReport {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            available: 0,
            empty: 0,
            rejected: 0,
        }
    }

    fn count(&mut self, outcome: &DivisionOutcome) {
        match outcome {
            DivisionOutcome::Available(_) => self.available += 1,
            DivisionOutcome::Empty => self.empty += 1,
            DivisionOutcome::Rejected(_) => self.rejected += 1,
        }
    }
}

/// Everything the poller collected, in request order.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct PollResult {
    pub(crate) fetches: Vec<DivisionFetch>,
    pub(crate) days: Vec<DayReport>,
}

impl PollResult {
    /// The requests that PROMS answered with an explanation instead of data.
    pub(crate) fn rejections(&self) -> impl Iterator<Item = (NaiveDate, &Division, &str)> {
        self.fetches.iter().filter_map(|fetch| match &fetch.outcome {
            DivisionOutcome::Rejected(reason) => {
                Some((fetch.date, &fetch.division, reason.as_str()))
            }
            _ => None,
        })
    }

    /// Folds the available records into one table, tagging each row with its division name.
    pub(crate) fn combine(&self) -> Table {
        self.fetches
            .iter()
            .filter_map(|fetch| match &fetch.outcome {
                DivisionOutcome::Available(records) => Some((fetch, records)),
                _ => None,
            })
            .flat_map(|(fetch, records)| {
                records.iter().map(|record| {
                    let mut row = record.clone();
                    row.insert(
                        DIVISION.to_string(),
                        Value::String(fetch.division.name().to_string()),
                    );
                    row
                })
            })
            .collect()
    }
}

/// Requests every division for every day of `range`, pausing `delay` between two requests.
/// Unsuccessful responses are counted; transport errors and malformed bodies abort.
pub(crate) async fn poll(
    proms: &mut (dyn Proms + Send),
    range: DateRange,
    divisions: &Divisions,
    delay: Duration,
) -> Result<PollResult> {
    let mut result = PollResult::default();
    let mut first_request = true;

    for date in range {
        info!("{date} ({})", date.format("%A"));
        info!("Requesting data from {date}...");
        let mut day = DayReport::new(date);

        for division in divisions.iter() {
            if !first_request && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            first_request = false;

            let body = proms.fetch(date, division).await?;
            let outcome = DivisionOutcome::classify(&body).with_context(|| {
                format!(
                    "Unexpected PROMS response for {date} and division {} ({})",
                    division.id(),
                    division.name()
                )
            })?;
            match &outcome {
                DivisionOutcome::Available(records) => {
                    debug!("{}: {} records", division.name(), records.len())
                }
                DivisionOutcome::Empty => debug!("{}: no data", division.name()),
                DivisionOutcome::Rejected(reason) => {
                    debug!("{}: rejected: {reason}", division.name())
                }
            }
            day.count(&outcome);
            result.fetches.push(DivisionFetch {
                date,
                division: division.clone(),
                outcome,
            });
        }

        info!("  {} divisions available for update", day.available);
        info!("  {} divisions not updated due to empty data", day.empty);
        if day.rejected > 0 {
            info!("  {} divisions rejected by PROMS", day.rejected);
        }
        result.days.push(day);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TestProms;
    use serde_json::json;
    use std::collections::HashMap;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn divisions() -> Divisions {
        Divisions::new(vec![
            Division::new("1", "Finance"),
            Division::new("2", "Legal"),
        ])
        .unwrap()
    }

    #[test]
    fn test_classify_available() {
        let body = json!({"success": true, "message": [{"ttc": 1}, {"ttc": 2}]});
        let DivisionOutcome::Available(records) = DivisionOutcome::classify(&body).unwrap() else {
            panic!("expected records");
        };
        assert_eq!(2, records.len());
        assert_eq!(Some(&json!(2)), records[1].get("ttc"));

        let body = json!({"success": 1, "message": []});
        assert_eq!(
            DivisionOutcome::Available(vec![]),
            DivisionOutcome::classify(&body).unwrap()
        );
    }

    #[test]
    fn test_classify_tolerated() {
        for body in [
            json!({"success": false}),
            json!({"success": false, "message": null}),
            json!({"success": false, "message": []}),
            json!({"success": false, "message": " "}),
            json!({"success": "true", "message": []}),
        ] {
            assert_eq!(
                DivisionOutcome::Empty,
                DivisionOutcome::classify(&body).unwrap(),
                "{body}"
            );
        }
        let body = json!({"success": false, "message": "Token expired"});
        assert_eq!(
            DivisionOutcome::Rejected("Token expired".to_string()),
            DivisionOutcome::classify(&body).unwrap()
        );
        let body = json!({"success": false, "message": {"code": 7}});
        assert_eq!(
            DivisionOutcome::Rejected(r#"{"code":7}"#.to_string()),
            DivisionOutcome::classify(&body).unwrap()
        );
    }

    #[test]
    fn test_classify_malformed() {
        for body in [
            json!([1, 2]),
            json!({"message": []}),
            json!({"success": true}),
            json!({"success": true, "message": "done"}),
            json!({"success": true, "message": [1]}),
        ] {
            assert!(DivisionOutcome::classify(&body).is_err(), "{body}");
        }
    }

    #[tokio::test]
    async fn test_poll_counts_and_order() {
        let day1 = ymd(2024, 1, 1);
        let day2 = ymd(2024, 1, 2);
        let mut proms = TestProms::with_responses(HashMap::from([
            (
                (day1, "1".to_string()),
                json!({"success": true, "message": [{"created_at": "2024-01-01 09:00:00"}]}),
            ),
            (
                (day2, "2".to_string()),
                json!({"success": false, "message": "division closed"}),
            ),
        ]));

        let result = poll(
            &mut proms,
            DateRange::new(day1, day2),
            &divisions(),
            Duration::ZERO,
        )
        .await
        .unwrap();

        assert_eq!(
            vec![
                (day1, "1".to_string()),
                (day1, "2".to_string()),
                (day2, "1".to_string()),
                (day2, "2".to_string()),
            ],
            proms.calls()
        );
        assert_eq!(
            vec![
                DayReport {
                    date: day1,
                    available: 1,
                    empty: 1,
                    rejected: 0
                },
                DayReport {
                    date: day2,
                    available: 0,
                    empty: 1,
                    rejected: 1
                },
            ],
            result.days
        );
        assert_eq!(4, result.fetches.len());
        let rejections: Vec<_> = result.rejections().collect();
        assert_eq!(1, rejections.len());
        assert_eq!(day2, rejections[0].0);
        assert_eq!("Legal", rejections[0].1.name());
        assert_eq!("division closed", rejections[0].2);
    }

    #[tokio::test]
    async fn test_poll_aborts_on_malformed_body() {
        let day = ymd(2024, 1, 1);
        let mut proms = TestProms::with_responses(HashMap::from([(
            (day, "1".to_string()),
            json!({"error": "boom"}),
        )]));
        let result = poll(&mut proms, DateRange::new(day, day), &divisions(), Duration::ZERO).await;
        assert!(result.is_err());
        // The run stops at the first malformed body.
        assert_eq!(1, proms.calls().len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_sleeps_between_requests() {
        let day = ymd(2024, 1, 1);
        let mut proms = TestProms::with_responses(HashMap::new());
        let started = tokio::time::Instant::now();
        poll(
            &mut proms,
            DateRange::new(day, ymd(2024, 1, 2)),
            &divisions(),
            Duration::from_secs(10),
        )
        .await
        .unwrap();
        // Four requests, three pauses.
        assert_eq!(Duration::from_secs(30), started.elapsed());
    }

    #[test]
    fn test_combine_tags_division() {
        let day = ymd(2024, 1, 1);
        let result = PollResult {
            fetches: vec![
                DivisionFetch {
                    date: day,
                    division: Division::new("1", "Finance"),
                    outcome: DivisionOutcome::Available(vec![
                        json!({"ttc": 1}).as_object().unwrap().clone(),
                        json!({"ttc": 2, "extra": "x"}).as_object().unwrap().clone(),
                    ]),
                },
                DivisionFetch {
                    date: day,
                    division: Division::new("2", "Legal"),
                    outcome: DivisionOutcome::Rejected("nope".to_string()),
                },
                DivisionFetch {
                    date: day,
                    division: Division::new("3", "Audit"),
                    outcome: DivisionOutcome::Available(vec![json!({"ttc": 3})
                        .as_object()
                        .unwrap()
                        .clone()]),
                },
            ],
            days: vec![],
        };

        let table = result.combine();
        assert_eq!(vec!["ttc", "division", "extra"], table.columns());
        let divisions: Vec<&Value> = table.rows().iter().map(|r| &r[DIVISION]).collect();
        assert_eq!(
            vec![&json!("Finance"), &json!("Finance"), &json!("Audit")],
            divisions
        );
    }
}
