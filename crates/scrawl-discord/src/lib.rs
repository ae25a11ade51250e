//! Discord channel notifier for newly created reports.
//!
//! Posts each report's JSON to one channel through the Discord REST API,
//! authenticated as a bot.

pub mod error;

use std::time::Duration;

use reqwest::{Client, header::AUTHORIZATION};
use scrawl_core::notify::Notifier;
use serde_json::json;

pub use error::{Error, Result};

/// Discord's limit on the length of a message, in characters.
pub const MESSAGE_LIMIT: usize = 2000;

/// Default REST API base URL.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

const FENCE_OPEN: &str = "```json\n";
const FENCE_CLOSE: &str = "\n```";
const ELLIPSIS: char = '…';
const MAX_ERROR_BODY: usize = 512;

/// Connection settings for [`DiscordNotifier`].
#[derive(Debug, Clone)]
pub struct DiscordConfig {
  pub token:    String,
  pub channel:  String,
  pub api_base: String,
  pub timeout:  Duration,
}

impl DiscordConfig {
  pub fn new(token: impl Into<String>, channel: impl Into<String>) -> Self {
    Self {
      token:    token.into(),
      channel:  channel.into(),
      api_base: DEFAULT_API_BASE.to_string(),
      timeout:  Duration::from_secs(10),
    }
  }
}

/// Sends report JSON to a Discord channel.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct DiscordNotifier {
  client: Client,
  url:    String,
  auth:   String,
}

impl DiscordNotifier {
  pub fn new(config: DiscordConfig) -> Result<Self> {
    let client = Client::builder().timeout(config.timeout).build()?;
    let url = format!(
      "{}/channels/{}/messages",
      config.api_base.trim_end_matches('/'),
      config.channel
    );
    Ok(Self { client, url, auth: format!("Bot {}", config.token) })
  }
}

impl Notifier for DiscordNotifier {
  type Error = Error;

  async fn notify(&self, report_json: &str) -> Result<()> {
    let response = self
      .client
      .post(&self.url)
      .header(AUTHORIZATION, &self.auth)
      .json(&json!({ "content": message_content(report_json) }))
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(Error::Rejected {
        status: status.as_u16(),
        body:   truncate(&body, MAX_ERROR_BODY),
      });
    }
    tracing::debug!(status = status.as_u16(), "report forwarded to discord");
    Ok(())
  }
}

/// Wrap `report_json` in a JSON code block, shortening it to fit within
/// [`MESSAGE_LIMIT`].
pub fn message_content(report_json: &str) -> String {
  let budget = MESSAGE_LIMIT - FENCE_OPEN.chars().count() - FENCE_CLOSE.chars().count();
  let body = if report_json.chars().count() > budget {
    let mut cut = truncate(report_json, budget - 1);
    cut.push(ELLIPSIS);
    cut
  } else {
    report_json.to_string()
  };
  format!("{FENCE_OPEN}{body}{FENCE_CLOSE}")
}

/// The first `max` characters of `s`.
fn truncate(s: &str, max: usize) -> String { s.chars().take(max).collect() }
