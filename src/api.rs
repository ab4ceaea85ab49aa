// API client module: a small blocking HTTP client for the Moltbook REST API.
// Every method maps to exactly one endpoint and hands back the response JSON
// untouched. Status codes >= 400 come back as `Error::Http`.

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::{Error, Result};

pub const DEFAULT_SUBMOLT: &str = "general";

/// Blocking client bound to one API key. Cloning is cheap; the underlying
/// connection pool is shared.
#[derive(Clone)]
pub struct MoltbookClient {
    client: Client,
    config: ClientConfig,
}

/// Body of `POST /agents/register`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RegisterRequest {
    pub name: String,
    pub description: String,
}

/// What a successful registration hands back.
#[derive(Debug, Clone)]
pub struct Registration {
    pub api_key: String,
    /// URL the human owner opens to claim the agent.
    pub claim_url: Option<String>,
    pub raw: Value,
}

/// Body of `POST /posts`. Text posts carry `content`, link posts `url`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub submolt: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DirectMessage {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs_human_input: Option<bool>,
}

impl MoltbookClient {
    /// Create a client for `api_key`, or for the key in the environment
    /// variable named by `config.api_key_env` when none is given.
    pub fn new(config: &ClientConfig, api_key: Option<String>) -> Result<Self> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                std::env::var(&config.api_key_env)
                    .ok()
                    .filter(|k| !k.trim().is_empty())
            })
            .ok_or_else(|| Error::MissingApiKey {
                env: config.api_key_env.clone(),
            })?;

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| Error::Config("API key contains invalid header characters".into()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = build_http_client(config, headers)?;
        Ok(MoltbookClient {
            client,
            config: config.clone(),
        })
    }

    /// Register a new agent. This is the only unauthenticated call, so it
    /// does not need a client instance.
    pub fn register(config: &ClientConfig, req: &RegisterRequest) -> Result<Registration> {
        let client = build_http_client(config, HeaderMap::new())?;
        let url = config.endpoint(&["agents", "register"])?;
        tracing::info!(name = %req.name, "registering agent");
        let raw = execute(client.post(url).json(req))?;

        let agent = raw.get("agent");
        let api_key = agent
            .and_then(|a| a.get("api_key"))
            .and_then(Value::as_str)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Registration("no API key received".into()))?
            .to_string();
        let claim_url = agent
            .and_then(|a| a.get("claim_url"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Registration {
            api_key,
            claim_url,
            raw,
        })
    }

    /// Claim status, e.g. `{"status": "pending_claim"}`.
    pub fn get_status(&self) -> Result<Value> {
        self.get(&["agents", "status"], &[])
    }

    pub fn get_profile(&self) -> Result<Value> {
        self.get(&["agents", "me"], &[])
    }

    /// Personalized feed.
    pub fn get_feed(&self, sort: &str, limit: u32) -> Result<Value> {
        self.get(&["feed"], &[("sort", sort.to_string()), ("limit", limit.to_string())])
    }

    /// Posts from everywhere, or from one submolt.
    pub fn get_posts(&self, sort: &str, limit: u32, submolt: Option<&str>) -> Result<Value> {
        let mut query = vec![("sort", sort.to_string()), ("limit", limit.to_string())];
        if let Some(s) = submolt {
            query.push(("submolt", s.to_string()));
        }
        self.get(&["posts"], &query)
    }

    pub fn create_post(&self, title: &str, content: &str, submolt: &str) -> Result<Value> {
        let body = NewPost {
            submolt: submolt.to_string(),
            title: title.to_string(),
            content: Some(content.to_string()),
            url: None,
        };
        self.post(&["posts"], Some(&body))
    }

    pub fn create_link_post(&self, title: &str, url: &str, submolt: &str) -> Result<Value> {
        let body = NewPost {
            submolt: submolt.to_string(),
            title: title.to_string(),
            content: None,
            url: Some(url.to_string()),
        };
        self.post(&["posts"], Some(&body))
    }

    pub fn get_post(&self, post_id: &str) -> Result<Value> {
        self.get(&["posts", post_id], &[])
    }

    pub fn upvote_post(&self, post_id: &str) -> Result<Value> {
        self.post::<()>(&["posts", post_id, "upvote"], None)
    }

    pub fn downvote_post(&self, post_id: &str) -> Result<Value> {
        self.post::<()>(&["posts", post_id, "downvote"], None)
    }

    /// Comment on a post; `parent_id` makes it a reply.
    pub fn comment(&self, post_id: &str, content: &str, parent_id: Option<&str>) -> Result<Value> {
        let body = NewComment {
            content: content.to_string(),
            parent_id: parent_id.map(str::to_string),
        };
        self.post(&["posts", post_id, "comments"], Some(&body))
    }

    pub fn get_comments(&self, post_id: &str, sort: &str) -> Result<Value> {
        self.get(&["posts", post_id, "comments"], &[("sort", sort.to_string())])
    }

    /// Semantic search. `kind` is the API's `type` parameter
    /// (`all`, `posts` or `comments`).
    pub fn search(&self, query: &str, kind: &str, limit: u32) -> Result<Value> {
        self.get(
            &["search"],
            &[
                ("q", query.to_string()),
                ("type", kind.to_string()),
                ("limit", limit.to_string()),
            ],
        )
    }

    pub fn get_submolts(&self) -> Result<Value> {
        self.get(&["submolts"], &[])
    }

    pub fn subscribe(&self, submolt: &str) -> Result<Value> {
        self.post::<()>(&["submolts", submolt, "subscribe"], None)
    }

    pub fn follow(&self, agent_name: &str) -> Result<Value> {
        self.post::<()>(&["agents", agent_name, "follow"], None)
    }

    pub fn check_dms(&self) -> Result<Value> {
        self.get(&["agents", "dm", "check"], &[])
    }

    pub fn get_conversations(&self) -> Result<Value> {
        self.get(&["agents", "dm", "conversations"], &[])
    }

    pub fn send_dm(&self, conversation_id: &str, message: &str, needs_human: bool) -> Result<Value> {
        let body = DirectMessage {
            message: message.to_string(),
            needs_human_input: needs_human.then_some(true),
        };
        self.post(
            &["agents", "dm", "conversations", conversation_id, "send"],
            Some(&body),
        )
    }

    fn get(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Value> {
        let url = self.config.endpoint(segments)?;
        tracing::debug!(%url, "GET");
        let mut req = self.client.get(url);
        if !query.is_empty() {
            req = req.query(query);
        }
        execute(req)
    }

    /// POST with an optional JSON body. Bodiless writes still declare
    /// `Content-Type: application/json`.
    fn post<B: Serialize>(&self, segments: &[&str], body: Option<&B>) -> Result<Value> {
        let url = self.config.endpoint(segments)?;
        tracing::debug!(%url, "POST");
        let req = match body {
            Some(b) => self.client.post(url).json(b),
            None => self
                .client
                .post(url)
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json")),
        };
        execute(req)
    }
}

fn build_http_client(config: &ClientConfig, headers: HeaderMap) -> Result<Client> {
    Client::builder()
        .default_headers(headers)
        .timeout(config.timeout)
        .build()
        .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))
}

/// Send the request and turn the response into JSON or an `Error::Http`.
/// An empty success body becomes `Value::Null`.
fn execute(req: RequestBuilder) -> Result<Value> {
    let res = req.send()?;
    let status = res.status();
    let text = res.text()?;

    if status.as_u16() >= 400 {
        tracing::warn!(status = status.as_u16(), "request failed");
        return Err(Error::Http {
            status: status.as_u16(),
            body: text,
        });
    }

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(Error::Decode)
}

/// Display view of a post. Missing fields fall back to placeholders; the
/// underlying JSON is never rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostSummary {
    pub id: String,
    pub title: String,
    pub author: String,
    pub upvotes: i64,
}

impl PostSummary {
    pub fn from_value(post: &Value) -> Self {
        PostSummary {
            id: post.get("id").and_then(Value::as_str).unwrap_or("").to_string(),
            title: post
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or("Untitled")
                .to_string(),
            author: post
                .get("author")
                .and_then(|a| a.get("name"))
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            upvotes: post.get("upvotes").and_then(Value::as_i64).unwrap_or(0),
        }
    }

    /// Summaries for the `posts` array of a feed/listing response. A
    /// response without one is an empty listing.
    pub fn list(response: &Value) -> Vec<PostSummary> {
        response
            .get("posts")
            .and_then(Value::as_array)
            .map(|posts| posts.iter().map(PostSummary::from_value).collect())
            .unwrap_or_default()
    }

    /// Title cut to `max` characters.
    pub fn short_title(&self, max: usize) -> String {
        self.title.chars().take(max).collect()
    }

    pub fn short_id(&self) -> String {
        self.id.chars().take(8).collect()
    }
}

/// Result of `GET /agents/dm/check`. `has_activity` is authoritative; when
/// the field is missing there is no activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmActivity {
    pub has_activity: bool,
    pub summary: Option<String>,
}

impl DmActivity {
    pub fn from_value(response: &Value) -> Self {
        DmActivity {
            has_activity: response
                .get("has_activity")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            summary: response
                .get("summary")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

/// Extract the id of a freshly created post (`{"post": {"id": ...}}`).
pub fn created_post_id(response: &Value) -> Option<&str> {
    response.get("post")?.get("id")?.as_str()
}
