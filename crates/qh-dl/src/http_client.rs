//! Process-wide HTTP agent.
//!
//! The CLI configures proxy, user agent and default headers once at start-up; every request
//! made through [`get`] then goes out with those settings.

use std::sync::{LazyLock, PoisonError, RwLock};

use ureq::{
    http::{self, HeaderMap, Uri},
    typestate::WithoutBody,
    Agent, Proxy, RequestBuilder,
};

pub const DEFAULT_USER_AGENT: &str = concat!("qh/", env!("CARGO_PKG_VERSION"));

/// Settings the shared agent is built from.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub user_agent: String,
    pub proxy: Option<Proxy>,
    /// Sent with every request.
    pub headers: HeaderMap,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            proxy: None,
            headers: HeaderMap::new(),
        }
    }
}

impl ClientConfig {
    /// Builds an agent from this configuration.
    ///
    /// ```
    /// use qh_dl::http_client::ClientConfig;
    ///
    /// let agent = ClientConfig::default().build();
    /// let _req = agent.get("http://example.com");
    /// ```
    pub fn build(&self) -> Agent {
        Agent::config_builder()
            .proxy(self.proxy.clone())
            .user_agent(self.user_agent.as_str())
            .build()
            .into()
    }
}

struct Client {
    agent: Agent,
    config: ClientConfig,
}

impl Client {
    fn new(config: ClientConfig) -> Self {
        Self {
            agent: config.build(),
            config,
        }
    }

    fn get<T>(&self, uri: T) -> RequestBuilder<WithoutBody>
    where
        Uri: TryFrom<T>,
        <Uri as TryFrom<T>>::Error: Into<http::Error>,
    {
        self.config
            .headers
            .iter()
            .fold(self.agent.get(uri), |req, (name, value)| req.header(name, value))
    }
}

static CLIENT: LazyLock<RwLock<Client>> =
    LazyLock::new(|| RwLock::new(Client::new(ClientConfig::default())));

/// Starts a GET request on the shared agent with the configured default headers.
pub fn get<T>(uri: T) -> RequestBuilder<WithoutBody>
where
    Uri: TryFrom<T>,
    <Uri as TryFrom<T>>::Error: Into<http::Error>,
{
    CLIENT.read().unwrap_or_else(PoisonError::into_inner).get(uri)
}

/// Edits the shared configuration and rebuilds the agent from it.
///
/// ```
/// use qh_dl::http_client::configure_http_client;
///
/// configure_http_client(|cfg| cfg.user_agent = "my-app/1.0".to_string());
/// ```
pub fn configure_http_client<F>(updater: F)
where
    F: FnOnce(&mut ClientConfig),
{
    let mut client = CLIENT.write().unwrap_or_else(PoisonError::into_inner);
    let mut config = client.config.clone();
    updater(&mut config);
    *client = Client::new(config);
}

#[cfg(test)]
mod tests {
    use ureq::http::{header::ACCEPT, HeaderValue};

    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert!(config.user_agent.starts_with("qh/"));
        assert!(config.proxy.is_none());
        assert!(config.headers.is_empty());
    }

    #[test]
    fn test_client_with_proxy_and_headers() {
        let mut config = ClientConfig {
            proxy: Some(Proxy::new("http://localhost:3128").unwrap()),
            ..ClientConfig::default()
        };
        config
            .headers
            .insert(ACCEPT, HeaderValue::from_static("application/octet-stream"));

        let client = Client::new(config);
        let _req = client.get("https://example.com/pkg.tar.gz");
    }

    #[test]
    fn test_configure_keeps_previous_settings() {
        configure_http_client(|cfg| cfg.user_agent = "qh-test/1".to_string());
        configure_http_client(|cfg| {
            cfg.headers
                .insert(ACCEPT, HeaderValue::from_static("*/*"));
        });

        let client = CLIENT.read().unwrap();
        assert_eq!(client.config.user_agent, "qh-test/1");
        assert_eq!(client.config.headers[ACCEPT], "*/*");
    }
}
