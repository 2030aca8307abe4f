//! PostgREST-style HTTP fetcher
//!
//! Reads whole tables from `{url}/rest/v1/{table}` with the project's API key.
//! Rows come back in the order the synchronizers expect to display them.

use anyhow::{bail, Context, Result};
use futures::future::BoxFuture;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::Fetcher;
use crate::config::BackendConfig;
use crate::model::{Chore, Event, House, Player, WellnessLog};

pub struct RestFetcher {
    base: Url,
    api_key: String,
    client: Client,
}

impl RestFetcher {
    pub fn new(url: &str, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let mut normalized = url.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let base = Url::parse(&normalized)
            .with_context(|| format!("invalid backend url `{url}`"))?;
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base,
            api_key: api_key.into(),
            client,
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .context("backend url not configured")?;
        let api_key = config.api_key.clone().unwrap_or_default();

        Self::new(url, api_key, Duration::from_secs(config.request_timeout_secs))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let url = self
            .base
            .join(&format!("rest/v1/{table}"))
            .with_context(|| format!("invalid table path `{table}`"))?;

        debug!(table, "fetching table");

        let response = self
            .client
            .get(url)
            .query(query)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .with_context(|| format!("failed to fetch {table}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("fetching {table} failed with status {status}: {body}");
        }

        response
            .json::<Vec<T>>()
            .await
            .with_context(|| format!("failed to decode {table} rows"))
    }
}

impl Fetcher for RestFetcher {
    fn chores(&self) -> BoxFuture<'_, Result<Vec<Chore>>> {
        Box::pin(async move {
            self.get("chores", &[("select", "*"), ("order", "created_at.desc")])
                .await
        })
    }

    fn events(&self) -> BoxFuture<'_, Result<Vec<Event>>> {
        Box::pin(async move {
            self.get("events", &[("select", "*"), ("order", "start_time.asc")])
                .await
        })
    }

    fn player_events<'a>(&'a self, player_id: &'a str) -> BoxFuture<'a, Result<Vec<Event>>> {
        Box::pin(async move {
            let attendee = format!("eq.{player_id}");
            self.get(
                "events",
                &[
                    ("select", "*,event_attendees!inner(player_id)"),
                    ("event_attendees.player_id", attendee.as_str()),
                    ("order", "start_time.asc"),
                ],
            )
            .await
        })
    }

    fn houses(&self) -> BoxFuture<'_, Result<Vec<House>>> {
        Box::pin(async move {
            self.get("houses", &[("select", "*"), ("order", "total_points.desc")])
                .await
        })
    }

    fn players(&self) -> BoxFuture<'_, Result<Vec<Player>>> {
        Box::pin(async move {
            self.get("players", &[("select", "*"), ("order", "name.asc")])
                .await
        })
    }

    fn wellness_logs<'a>(
        &'a self,
        player_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<WellnessLog>>> {
        Box::pin(async move {
            let player = format!("eq.{player_id}");
            self.get(
                "wellness_logs",
                &[
                    ("select", "*"),
                    ("player_id", player.as_str()),
                    ("order", "created_at.desc"),
                ],
            )
            .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let fetcher =
            RestFetcher::new("https://example.test/api", "key", Duration::from_secs(5)).unwrap();
        let joined = fetcher.base.join("rest/v1/houses").unwrap();
        assert_eq!(joined.as_str(), "https://example.test/api/rest/v1/houses");
    }

    #[test]
    fn test_missing_url_is_rejected() {
        let config = BackendConfig::default();
        let err = RestFetcher::from_config(&config).err().unwrap();
        assert!(err.to_string().contains("not configured"));
    }
}
