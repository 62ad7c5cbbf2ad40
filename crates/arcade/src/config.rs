use std::fmt::Debug;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.arcade.dev";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Builder for [`ArcadeConfig`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ArcadeConfigBuilder {
    api_key: String,
    base_url: Option<String>,
    toolkits: Vec<String>,
    tools: Vec<String>,
    connect_timeout: Duration,
    timeout: Duration,
}

impl ArcadeConfigBuilder {
    /// Creates a builder with the given API key.
    #[inline]
    pub fn with_api_key<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            toolkits: vec![],
            tools: vec![],
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets a custom base URL.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Offers every tool of the given toolkits (e.g. `Gmail`).
    #[inline]
    pub fn with_toolkits<I, S>(mut self, toolkits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.toolkits.extend(toolkits.into_iter().map(Into::into));
        self
    }

    /// Offers individual tools by their qualified names (e.g.
    /// `Gmail.SendEmail`).
    #[inline]
    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools.extend(tools.into_iter().map(Into::into));
        self
    }

    /// Sets how long to wait for a connection to the API.
    #[inline]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets how long a whole API call may take. Tool executions count too,
    /// so slow tools need a generous value.
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> ArcadeConfig {
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        ArcadeConfig {
            api_key: self.api_key,
            base_url: base_url.trim_end_matches('/').to_owned(),
            toolkits: self.toolkits,
            tools: self.tools,
            connect_timeout: self.connect_timeout,
            timeout: self.timeout,
        }
    }
}

impl Debug for ArcadeConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArcadeConfigBuilder")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("toolkits", &self.toolkits)
            .field("tools", &self.tools)
            .field("connect_timeout", &self.connect_timeout)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Configuration for the Arcade client.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ArcadeConfig {
    pub(crate) api_key: String,
    pub(crate) base_url: String,
    pub(crate) toolkits: Vec<String>,
    pub(crate) tools: Vec<String>,
    pub(crate) connect_timeout: Duration,
    pub(crate) timeout: Duration,
}

impl Debug for ArcadeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArcadeConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("toolkits", &self.toolkits)
            .field("tools", &self.tools)
            .field("connect_timeout", &self.connect_timeout)
            .field("timeout", &self.timeout)
            .finish()
    }
}
