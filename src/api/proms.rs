//! Implements the `Proms` trait by POSTing to the configured PROMS endpoint with `reqwest`.

use crate::api::Proms;
use crate::model::Division;
use crate::{PromsConfig, RequestEncoding, Result};
use anyhow::Context;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, trace};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

pub(super) struct HttpProms {
    client: reqwest::Client,
    config: PromsConfig,
}

impl HttpProms {
    pub(super) fn new(config: PromsConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Unable to build the PROMS HTTP client")?;
        debug!(
            "PROMS requests go to {} with a {} body",
            config.url(),
            config.encoding()
        );
        Ok(Self { client, config })
    }
}

#[async_trait::async_trait]
impl Proms for HttpProms {
    async fn fetch(&mut self, date: NaiveDate, division: &Division) -> Result<Value> {
        let params = request_params(&self.config, date, division);
        trace!(
            "POST {} as {} {params:?}",
            self.config.url(),
            self.config.encoding()
        );

        let mut request = self.client.post(self.config.url().clone());
        for (name, value) in self.config.headers() {
            request = request.header(name.as_str(), value.as_str());
        }
        request = match self.config.encoding() {
            RequestEncoding::Form => request.form(&params),
            RequestEncoding::Json => request.json(&params),
        };

        let response = request.send().await.with_context(|| {
            format!(
                "PROMS request for {date} and division {} failed",
                division.id()
            )
        })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .context("Unable to read the PROMS response body")?;
        serde_json::from_str(&body).with_context(|| {
            format!(
                "PROMS returned a non-JSON body (HTTP {status}) for {date} and division {}",
                division.id()
            )
        })
    }
}

fn request_params<'a>(
    config: &'a PromsConfig,
    date: NaiveDate,
    division: &Division,
) -> BTreeMap<&'a str, String> {
    BTreeMap::from([
        (config.date_param(), date.format("%Y-%m-%d").to_string()),
        (config.division_param(), division.id().to_string()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use url::Url;

    #[test]
    fn test_request_params() {
        let config = PromsConfig::new(Url::parse("https://proms.example.com/api").unwrap());
        let date = NaiveDate::from_ymd_opt(2024, 1, 9).unwrap();
        let params = request_params(&config, date, &Division::new("42", "Legal"));
        assert_eq!(Some(&"2024-01-09".to_string()), params.get("date"));
        assert_eq!(Some(&"42".to_string()), params.get("division_id"));
        assert_eq!(2, params.len());
    }

    #[test]
    fn test_new_client() {
        let config = PromsConfig::new(Url::parse("https://proms.example.com/api").unwrap());
        assert!(HttpProms::new(config).is_ok());
    }

    fn proms(server: &MockServer, encoding: &str) -> HttpProms {
        let config: PromsConfig = serde_json::from_value(json!({
            "url": server.url("/api/report"),
            "headers": {"x-api-key": "secret-key"},
            "encoding": encoding,
        }))
        .unwrap();
        HttpProms::new(config).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 9).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_form_encoded() {
        let server = MockServer::start_async().await;
        let body = json!({"success": true, "message": [{"ttc": 1}]});
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/report")
                    .header("x-api-key", "secret-key")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body("date=2024-01-09&division_id=42");
                then.status(200).json_body(body.clone());
            })
            .await;

        let mut proms = proms(&server, "form");
        let response = proms
            .fetch(date(), &Division::new("42", "Legal"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(body, response);
    }

    #[tokio::test]
    async fn test_fetch_json_encoded() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/report")
                    .header("x-api-key", "secret-key")
                    .json_body(json!({"date": "2024-01-09", "division_id": "42"}));
                then.status(200)
                    .json_body(json!({"success": false, "message": []}));
            })
            .await;

        let mut proms = proms(&server, "json");
        let response = proms
            .fetch(date(), &Division::new("42", "Legal"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(json!(false), response["success"]);
    }

    #[tokio::test]
    async fn test_fetch_only_posts() {
        let server = MockServer::start_async().await;
        let get = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/report");
                then.status(200).json_body(json!({"success": true, "message": []}));
            })
            .await;
        let post = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/report");
                then.status(200).json_body(json!({"success": true, "message": []}));
            })
            .await;

        let mut proms = proms(&server, "form");
        proms
            .fetch(date(), &Division::new("1", "Finance"))
            .await
            .unwrap();

        post.assert_hits_async(1).await;
        get.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn test_fetch_non_json_body_is_fatal() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/report");
                then.status(502).body("<html>Bad Gateway</html>");
            })
            .await;

        let mut proms = proms(&server, "form");
        let message = format!(
            "{:#}",
            proms
                .fetch(date(), &Division::new("42", "Legal"))
                .await
                .unwrap_err()
        );
        assert!(message.contains("non-JSON body (HTTP 502"), "{message}");
        assert!(message.contains("division 42"), "{message}");
    }
}
