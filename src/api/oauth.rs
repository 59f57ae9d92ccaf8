//! Keeps the Google OAuth access token fresh.
//!
//! The client secret and token files are provisioned ahead of time; this module only ever uses
//! the stored refresh token and never opens a browser.

use crate::api::files::{File, SecretFile, TokenFile};
use crate::Result;
use anyhow::Context;
use chrono::Utc;
use oauth2::basic::BasicClient;
use oauth2::{reqwest, AuthUrl, ClientId, ClientSecret, RefreshToken, TokenResponse, TokenUrl};
use std::path::PathBuf;
use tracing::{debug, info};

/// Used when Google does not say how long a refreshed token lives.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Holds the OAuth client credentials and the current token, refreshing and persisting the token
/// when it is about to expire.
#[derive(Debug, Clone)]
pub(crate) struct TokenProvider {
    secret: SecretFile,
    token: File<TokenFile>,
}

impl TokenProvider {
    /// Loads both credential files and checks that the token carries the required scopes.
    pub(crate) async fn load(
        client_secret_path: impl Into<PathBuf>,
        token_path: impl Into<PathBuf>,
    ) -> Result<Self> {
        let client_secret_path = client_secret_path.into();
        let secret = File::<SecretFile>::load(&client_secret_path)
            .await
            .context("Unable to load the OAuth client secret file")?
            .data()
            .clone();
        let token = File::<TokenFile>::load(token_path)
            .await
            .context("Unable to load the OAuth token file")?;
        token.data().validate_scopes()?;
        Ok(Self { secret, token })
    }

    /// The current access token, which may be expired.
    pub(crate) fn token(&self) -> &str {
        self.token.data().access_token()
    }

    /// Returns an access token, refreshing it first if it expires within the next few minutes.
    pub(crate) async fn token_with_refresh(&mut self) -> Result<&str> {
        if self.token.data().is_expired() {
            self.refresh().await?;
        }
        Ok(self.token())
    }

    /// Exchanges the refresh token for a new access token and saves it to the token file.
    pub(crate) async fn refresh(&mut self) -> Result<()> {
        debug!("Refreshing the OAuth access token");
        let client = BasicClient::new(ClientId::new(self.secret.client_id().to_string()))
            .set_client_secret(ClientSecret::new(self.secret.client_secret().to_string()))
            .set_auth_uri(
                AuthUrl::new(self.secret.auth_uri().to_string())
                    .context("Invalid auth_uri in the client secret file")?,
            )
            .set_token_uri(
                TokenUrl::new(self.secret.token_uri().to_string())
                    .context("Invalid token_uri in the client secret file")?,
            );

        let http_client = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Unable to build the HTTP client for the token refresh")?;

        let refresh_token = RefreshToken::new(self.token.data().refresh_token().to_string());
        let response = client
            .exchange_refresh_token(&refresh_token)
            .request_async(&http_client)
            .await
            .context("Unable to refresh the OAuth access token")?;

        let lifetime = response
            .expires_in()
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .unwrap_or_else(|| chrono::Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS));
        self.token.data_mut().update(
            response.access_token().secret().to_string(),
            Utc::now() + lifetime,
            response.refresh_token().map(|rt| rt.secret().to_string()),
        );
        self.token.save().await?;
        info!("Refreshed OAuth token saved to {}", self.token.path().display());
        Ok(())
    }
}
