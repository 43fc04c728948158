use std::time::Duration;

use crate::{Config, HttpWorkflowApi, MailflowError, Result};

pub struct ClientBuilder {
    base_url: String,
    token: String,
    timeout_ms: u64,
    client: Option<reqwest::Client>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        let config = Config::default();
        Self {
            base_url: config.api.base_url,
            token: String::new(),
            timeout_ms: config.api.timeout_ms,
            client: None,
        }
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Self {
        Self::default().base_url(config.api.base_url.clone()).timeout_ms(config.api.timeout_ms)
    }

    pub fn base_url(
        mut self,
        base_url: impl Into<String>,
    ) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// bearer access token sent with every request
    pub fn token(
        mut self,
        token: impl Into<String>,
    ) -> Self {
        self.token = token.into();
        self
    }

    pub fn timeout_ms(
        mut self,
        timeout_ms: u64,
    ) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// reuse an existing client (and its connection pool); the timeout is then the client's own
    pub fn client(
        mut self,
        client: reqwest::Client,
    ) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(&self) -> Result<HttpWorkflowApi> {
        if self.base_url.trim().is_empty() {
            return Err(MailflowError::Config("base url must not be empty".to_string()));
        }
        let client = match &self.client {
            Some(client) => client.clone(),
            None => reqwest::Client::builder().timeout(Duration::from_millis(self.timeout_ms)).build()?,
        };

        HttpWorkflowApi::new(client, &self.base_url, self.token.clone())
    }
}
