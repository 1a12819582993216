//! YouTube Data API v3 client: keyword search plus batch detail lookup.

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{Error, Result};

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const SEARCH_PAGE_SIZE: &str = "20";

/// One catalog entry, denormalized for rendering. Immutable once received;
/// the whole result set is replaced on every search.
#[derive(Debug, Clone)]
pub struct Video {
    pub id: String,
    pub title: String,
    pub channel: String,
    pub thumbnail: String,
    /// ISO-8601 duration as reported upstream, e.g. "PT4M13S".
    pub duration: String,
    pub views: Option<u64>,
}

#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    api_key: String,
}

impl Client {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
        }
    }

    /// The two-step retrieval contract: search for ranked identifiers, then
    /// fetch full metadata in one batch. Zero identifiers is a valid empty
    /// result and skips the detail lookup entirely.
    pub async fn search_videos(&self, query: &str) -> Result<Vec<Video>> {
        let ids = self.search(query).await?;
        if ids.is_empty() {
            debug!("search for '{}' matched nothing", query);
            return Ok(Vec::new());
        }
        self.fetch_details(&ids).await
    }

    /// Keyword search constrained to videos, first page only. Items without
    /// a video identifier are silently dropped.
    pub async fn search(&self, query: &str) -> Result<Vec<String>> {
        debug!("searching catalog: q='{}'", query);

        let body: SearchResponse = self
            .get_json(
                "/search",
                &[
                    ("part", "snippet"),
                    ("q", query),
                    ("type", "video"),
                    ("maxResults", SEARCH_PAGE_SIZE),
                    ("key", &self.api_key),
                ],
            )
            .await?;

        Ok(collect_ids(body))
    }

    /// Batch metadata lookup. The upstream service may silently drop
    /// identifiers that no longer exist; a shorter response is not an error.
    pub async fn fetch_details(&self, ids: &[String]) -> Result<Vec<Video>> {
        let ids = dedupe(ids);
        let joined = ids.join(",");
        debug!("fetching details for {} video(s)", ids.len());

        let body: VideosResponse = self
            .get_json(
                "/videos",
                &[
                    ("part", "snippet,statistics,contentDetails"),
                    ("id", &joined),
                    ("key", &self.api_key),
                ],
            )
            .await?;

        let videos = collect_videos(body);
        if videos.len() < ids.len() {
            debug!(
                "detail lookup returned {} of {} requested",
                videos.len(),
                ids.len()
            );
        }
        Ok(videos)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        // Query builder keeps the key out of any logged URL.
        let response = self
            .http
            .get(format!("{}{}", API_BASE, path))
            .query(params)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorResponse>()
                .await
                .ok()
                .and_then(|body| body.error)
                .map(|e| e.message)
                .unwrap_or_else(|| format!("API returned status {}", status));
            warn!("catalog request to {} rejected: {}", path, message);
            return Err(Error::Api { message });
        }

        response.json().await.map_err(|e| Error::Api {
            message: format!("Unexpected API response: {}", e),
        })
    }
}

/// Order-preserving dedup of requested identifiers.
fn dedupe(ids: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

fn collect_ids(body: SearchResponse) -> Vec<String> {
    body.items
        .unwrap_or_default()
        .into_iter()
        .filter_map(|item| item.id.video_id)
        .filter(|id| !id.is_empty())
        .collect()
}

fn collect_videos(body: VideosResponse) -> Vec<Video> {
    body.items
        .unwrap_or_default()
        .into_iter()
        .map(|item| {
            let thumbnail = item
                .snippet
                .thumbnails
                .high
                .or(item.snippet.thumbnails.medium)
                .or(item.snippet.thumbnails.default)
                .map(|t| t.url)
                .unwrap_or_default();

            Video {
                id: item.id,
                title: item.snippet.title,
                channel: item.snippet.channel_title,
                thumbnail,
                duration: item
                    .content_details
                    .and_then(|d| d.duration)
                    .unwrap_or_default(),
                views: item
                    .statistics
                    .and_then(|s| s.view_count)
                    .and_then(|raw| raw.parse().ok()),
            }
        })
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    items: Option<Vec<SearchItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideosResponse {
    items: Option<Vec<VideoItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: Snippet,
    statistics: Option<Statistics>,
    content_details: Option<ContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    channel_title: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    // The API reports counts as decimal strings.
    view_count: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentDetails {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}
