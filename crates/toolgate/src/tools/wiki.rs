use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use toolgate_core::tool::{Error as ToolError, Tool, ToolOutput};

const DEFAULT_ENDPOINT: &str = "https://en.wikipedia.org/w/api.php";
const TOP_K_RESULTS: usize = 3;
const MAX_OUTPUT_CHARS: usize = 4000;
const NO_RESULT: &str = "No good Wikipedia Search Result was found";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[allow(missing_docs)]
#[derive(Deserialize, JsonSchema)]
pub struct WikiSearchInput {
    #[schemars(description = "What to look up on Wikipedia.")]
    query: String,
}

/// A tool for looking up facts on Wikipedia.
///
/// It returns the introduction of the best matching pages, which is usually
/// enough for the model to answer factual questions.
pub struct WikiSearchTool {
    client: Client,
    endpoint: String,
    parameter_schema: Value,
}

impl WikiSearchTool {
    /// Creates a tool that queries the English Wikipedia.
    #[inline]
    pub fn new() -> reqwest::Result<Self> {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    /// Creates a tool that queries another MediaWiki API endpoint.
    pub fn with_endpoint<S: Into<String>>(endpoint: S) -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("toolgate/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(WikiSearchTool {
            client,
            endpoint: endpoint.into(),
            parameter_schema: schema_for!(WikiSearchInput).to_value(),
        })
    }
}

impl Tool for WikiSearchTool {
    type Input = WikiSearchInput;

    fn name(&self) -> &str {
        "wiki_search"
    }

    fn description(&self) -> &str {
        "Search Wikipedia for factual information."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: WikiSearchInput,
    ) -> impl Future<Output = ToolOutput> + Send + 'static {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        async move {
            let query = input.query.trim();
            if query.is_empty() {
                return Err(ToolError::invalid_input()
                    .with_reason("the query must not be empty"));
            }
            search(&client, &endpoint, query).await
        }
    }
}

async fn search(client: &Client, endpoint: &str, query: &str) -> ToolOutput {
    let resp: SearchResponse = get_json(
        client,
        endpoint,
        &[
            ("action", "query"),
            ("list", "search"),
            ("srsearch", query),
            ("srlimit", &TOP_K_RESULTS.to_string()),
            ("format", "json"),
            ("formatversion", "2"),
        ],
    )
    .await?;
    let titles = resp.titles();
    debug!("wikipedia search for {query:?} found {} pages", titles.len());
    if titles.is_empty() {
        return Ok(NO_RESULT.to_owned());
    }

    let resp: ExtractResponse = get_json(
        client,
        endpoint,
        &[
            ("action", "query"),
            ("prop", "extracts|pageprops"),
            ("exintro", "1"),
            ("explaintext", "1"),
            ("redirects", "1"),
            ("titles", &titles.join("|")),
            ("format", "json"),
            ("formatversion", "2"),
        ],
    )
    .await?;
    Ok(format_summaries(&titles, &resp))
}

async fn get_json<T: for<'de> Deserialize<'de>>(
    client: &Client,
    endpoint: &str,
    params: &[(&str, &str)],
) -> Result<T, ToolError> {
    let url = Url::parse_with_params(endpoint, params).map_err(|err| {
        ToolError::execution_error().with_reason(err.to_string())
    })?;
    let resp = client.get(url).send().await.map_err(transport_error)?;
    let status = resp.status();
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        warn!("wikipedia answered {status}");
        return Err(ToolError::backend_unavailable()
            .with_reason(format!("Wikipedia answered {status}")));
    }
    if !status.is_success() {
        return Err(ToolError::execution_error()
            .with_reason(format!("Wikipedia answered {status}")));
    }
    resp.json().await.map_err(|err| {
        if err.is_decode() {
            ToolError::execution_error().with_reason(format!(
                "unexpected response from Wikipedia: {err}"
            ))
        } else {
            transport_error(err)
        }
    })
}

fn transport_error(err: reqwest::Error) -> ToolError {
    warn!("wikipedia request failed: {err}");
    ToolError::backend_unavailable().with_reason(err.to_string())
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: Option<SearchQuery>,
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    title: String,
}

impl SearchResponse {
    fn titles(&self) -> Vec<String> {
        self.query
            .iter()
            .flat_map(|query| &query.search)
            .take(TOP_K_RESULTS)
            .map(|hit| hit.title.clone())
            .collect()
    }
}

#[derive(Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    query: Option<ExtractQuery>,
}

#[derive(Deserialize)]
struct ExtractQuery {
    #[serde(default)]
    redirects: Vec<Redirect>,
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Deserialize)]
struct Redirect {
    from: String,
    to: String,
}

#[derive(Deserialize)]
struct Page {
    title: String,
    #[serde(default)]
    extract: Option<String>,
    #[serde(default)]
    pageprops: Option<Value>,
}

impl Page {
    fn is_disambiguation(&self) -> bool {
        self.pageprops
            .as_ref()
            .is_some_and(|props| props.get("disambiguation").is_some())
    }
}

/// Formats the pages in search order, skipping disambiguation pages and
/// pages without an introduction.
fn format_summaries(titles: &[String], resp: &ExtractResponse) -> String {
    let Some(query) = &resp.query else {
        return NO_RESULT.to_owned();
    };

    let mut summaries = vec![];
    for title in titles {
        let title = query
            .redirects
            .iter()
            .find(|redirect| &redirect.from == title)
            .map_or(title, |redirect| &redirect.to);
        let Some(page) = query.pages.iter().find(|page| &page.title == title)
        else {
            continue;
        };
        if page.is_disambiguation() {
            continue;
        }
        let Some(extract) = page.extract.as_deref().map(str::trim) else {
            continue;
        };
        if extract.is_empty() {
            continue;
        }
        summaries.push(format!("Page: {}\nSummary: {extract}", page.title));
    }

    if summaries.is_empty() {
        return NO_RESULT.to_owned();
    }
    summaries.join("\n\n").chars().take(MAX_OUTPUT_CHARS).collect()
}
