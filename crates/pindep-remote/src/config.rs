use serde::{Deserialize, Serialize};

/// One `[[remotes]]` entry of `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl RemoteConfig {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_owned(),
            url: url.trim_end_matches('/').to_owned(),
            auth_token: None,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: &str) -> Self {
        self.auth_token = Some(token.to_owned());
        self
    }

    /// Base URL without trailing slashes, however the entry was written.
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_strips_trailing_slash() {
        let config = RemoteConfig::new("central", "https://packages.example.com/");
        assert_eq!(config.url, "https://packages.example.com");
    }

    #[test]
    fn base_url_ignores_slash_from_file() {
        let config: RemoteConfig =
            toml::from_str("name = \"central\"\nurl = \"https://packages.example.com//\"").unwrap();
        assert_eq!(config.base_url(), "https://packages.example.com");
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn token_is_optional() {
        let config = RemoteConfig::new("local", "http://127.0.0.1:9000").with_token("s3cret");
        let text = toml::to_string(&config).unwrap();
        assert!(text.contains("auth_token = \"s3cret\""));
        let back: RemoteConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
