use serde::Deserialize;

use crate::error::{BroadcastError, Result};

/// Scope requested from the token endpoint when none is configured.
pub const DEFAULT_TOKEN_SCOPE: &str = "appsync/events";

/// Broadcaster configuration. Deserializable from any serde source or loaded
/// from environment variables with [`BroadcasterConfig::from_env`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BroadcasterConfig {
    /// Prefix scoping every channel name of this deployment.
    pub namespace: String,
    /// Identifies the target gateway instance.
    pub app_id: String,
    pub region: String,
    pub cache: CacheConfig,
    pub options: CognitoOptions,
    pub failure_policy: FailurePolicy,
    pub endpoints: EndpointOverrides,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// `memory` or `redis`.
    pub driver: String,
    /// Prepended to every key the broadcaster writes.
    pub prefix: String,
    /// Connection URL for the redis driver.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CognitoOptions {
    pub cognito_pool: String,
    pub cognito_region: String,
    pub cognito_client_id: String,
    pub cognito_client_secret: String,
    pub cognito_scope: Option<String>,
}

/// What a broadcast reports when only some channels fail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Partial failure is logged as a warning and the call succeeds.
    #[default]
    Lenient,
    /// Any failed channel fails the call.
    Strict,
}

impl std::str::FromStr for FailurePolicy {
    type Err = BroadcastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            _ => Err(BroadcastError::config("failure_policy")),
        }
    }
}

/// Replacement endpoints, used against private deployments and in tests.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EndpointOverrides {
    pub token_url: Option<String>,
    pub event_url: Option<String>,
}

impl BroadcasterConfig {
    /// Load configuration from environment variables and validate it.
    pub fn from_env() -> Result<Self> {
        let config = Self {
            namespace: var("BROADCAST_NAMESPACE"),
            app_id: var("APPSYNC_APP_ID"),
            region: var("APPSYNC_REGION"),
            cache: CacheConfig {
                driver: var("BROADCAST_CACHE_DRIVER"),
                prefix: var("BROADCAST_CACHE_PREFIX"),
                url: optional_var("BROADCAST_CACHE_URL"),
            },
            options: CognitoOptions {
                cognito_pool: var("COGNITO_POOL"),
                cognito_region: var("COGNITO_REGION"),
                cognito_client_id: var("COGNITO_CLIENT_ID"),
                cognito_client_secret: var("COGNITO_CLIENT_SECRET"),
                cognito_scope: optional_var("COGNITO_SCOPE"),
            },
            failure_policy: var("BROADCAST_FAILURE_POLICY").parse()?,
            endpoints: EndpointOverrides {
                token_url: optional_var("APPSYNC_TOKEN_URL"),
                event_url: optional_var("APPSYNC_EVENT_URL"),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Fail on the first required key that is missing or blank.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("namespace", &self.namespace),
            ("app_id", &self.app_id),
            ("region", &self.region),
            ("cache.driver", &self.cache.driver),
            ("cache.prefix", &self.cache.prefix),
            ("options.cognito_pool", &self.options.cognito_pool),
            ("options.cognito_region", &self.options.cognito_region),
            ("options.cognito_client_id", &self.options.cognito_client_id),
            (
                "options.cognito_client_secret",
                &self.options.cognito_client_secret,
            ),
        ];

        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((key, _)) => Err(BroadcastError::config(*key)),
            None => Ok(()),
        }
    }

    /// OAuth2 token endpoint of the configured Cognito pool.
    pub fn token_url(&self) -> String {
        match &self.endpoints.token_url {
            Some(url) => url.clone(),
            None => format!(
                "https://{}.auth.{}.amazoncognito.com/oauth2/token",
                self.options.cognito_pool, self.options.cognito_region
            ),
        }
    }

    /// Event publishing endpoint of the configured gateway.
    pub fn event_url(&self) -> String {
        match &self.endpoints.event_url {
            Some(url) => url.clone(),
            None => format!(
                "https://{}.appsync-api.{}.amazonaws.com/event",
                self.app_id, self.region
            ),
        }
    }

    pub fn token_scope(&self) -> &str {
        self.options
            .cognito_scope
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_TOKEN_SCOPE)
    }

    /// Key of the shared-cache entry holding the gateway credential.
    pub fn token_cache_key(&self) -> String {
        format!("{}auth_token", self.cache.prefix)
    }
}

fn var(name: &str) -> String {
    std::env::var(name).unwrap_or_default()
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}
