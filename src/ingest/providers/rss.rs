use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::{OffsetDateTime, UtcOffset};

use crate::candidate::Candidate;
use crate::error::{Error, Result};
use crate::ingest::types::TrendSource;

const DESCRIPTION_CAP: usize = 300;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

/// RFC 2822 `pubDate` → RFC 3339 UTC string.
fn pub_date_to_rfc3339(ts: &str) -> Option<String> {
    OffsetDateTime::parse(ts.trim(), &Rfc2822)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC))
        .and_then(|dt| dt.format(&Rfc3339).ok())
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

/// RSS 2.0 feed, read from an in-memory document or over HTTP.
pub struct RssTrendSource {
    tag: String,
    mode: Mode,
}

impl RssTrendSource {
    pub fn from_fixture_str(tag: &str, xml: &str) -> Self {
        Self {
            tag: tag.to_string(),
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    pub fn from_url(tag: &str, url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("trend-slate/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::SenseLayer(format!("http client: {e}")))?;
        Ok(Self {
            tag: tag.to_string(),
            mode: Mode::Http {
                url: url.to_string(),
                client,
            },
        })
    }

    fn parse_items_from_str(&self, s: &str) -> Result<Vec<Candidate>> {
        let t0 = Instant::now();
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean)
            .map_err(|e| Error::SenseLayer(format!("parsing {} rss xml: {e}", self.tag)))?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let title = crate::ingest::normalize_text(it.title.as_deref().unwrap_or_default());
            if title.is_empty() {
                continue;
            }
            let description = it
                .description
                .as_deref()
                .map(crate::ingest::normalize_text)
                .filter(|d| !d.is_empty())
                .map(|d| d.chars().take(DESCRIPTION_CAP).collect::<String>());

            out.push(Candidate {
                title,
                description,
                timestamp: it.pub_date.as_deref().and_then(pub_date_to_rfc3339),
                source: self.tag.clone(),
                source_url: it.link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()),
                ..Default::default()
            });
        }

        histogram!("ingest_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("ingest_events_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl TrendSource for RssTrendSource {
    async fn fetch(&self) -> Result<Vec<Candidate>> {
        match &self.mode {
            Mode::Fixture(s) => self.parse_items_from_str(s),
            Mode::Http { url, client } => {
                let resp = client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| Error::SenseLayer(format!("{} http get: {e}", self.tag)))?;
                if !resp.status().is_success() {
                    return Err(Error::SenseLayer(format!(
                        "{} http status {}",
                        self.tag,
                        resp.status()
                    )));
                }
                let body = resp
                    .text()
                    .await
                    .map_err(|e| Error::SenseLayer(format!("{} http body: {e}", self.tag)))?;
                self.parse_items_from_str(&body)
            }
        }
    }

    fn name(&self) -> &str {
        &self.tag
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
