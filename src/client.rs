use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::models::{
    AddPreferenceRequest, ArticleResponse, CategorizedHeadlines, ErrorBody, LoginRequest,
    MessageResponse, PreferencesResponse, RegisterRequest, User, UserEnvelope, ARTICLE_NOT_FOUND,
};

/// Thin typed wrapper over the backend REST endpoints. No timeouts and no
/// retries: a request either completes or fails and the caller decides.
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let client = Client::builder()
            .user_agent("Discerno/0.1 (News Reader)")
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let path = response.url().path().to_string();
            let message = response.json::<ErrorBody>().await.ok().map(|b| b.message);
            warn!("Request to {} failed with {}", path, status);
            return Err(ClientError::from_status(status, message));
        }
        Ok(response.json::<T>().await?)
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, ClientError> {
        let body = RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        let response = self
            .client
            .post(self.url("/register"))
            .json(&body)
            .send()
            .await?;
        let envelope: UserEnvelope = Self::handle_response(response).await?;
        Ok(envelope.user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, ClientError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response = self
            .client
            .post(self.url("/login"))
            .json(&body)
            .send()
            .await?;
        let envelope: UserEnvelope = Self::handle_response(response).await?;
        Ok(envelope.user)
    }

    pub async fn fetch_news(&self) -> Result<CategorizedHeadlines, ClientError> {
        let response = self.client.get(self.url("/news")).send().await?;
        Self::handle_response(response).await
    }

    /// Body text for a headline link. The backend answers unknown links with a
    /// placeholder body; that comes back as `NotFound`.
    pub async fn fetch_article_body(&self, link: &str) -> Result<String, ClientError> {
        let response = self
            .client
            .get(self.url("/article"))
            .query(&[("link", link)])
            .send()
            .await?;
        let article: ArticleResponse = Self::handle_response(response).await?;

        if article.article == ARTICLE_NOT_FOUND {
            debug!("No article text for {}", link);
            return Err(ClientError::NotFound(ARTICLE_NOT_FOUND.to_string()));
        }
        Ok(article.article)
    }

    /// `NotFound` means the user has not marked any category yet.
    pub async fn fetch_preferences(&self, user_id: i64) -> Result<Vec<String>, ClientError> {
        let response = self
            .client
            .get(self.url("/user-preferences"))
            .query(&[("userId", user_id)])
            .send()
            .await?;
        let preferences: PreferencesResponse = Self::handle_response(response).await?;
        Ok(preferences.categories)
    }

    pub async fn add_preference(&self, user_id: i64, category: &str) -> Result<(), ClientError> {
        let body = AddPreferenceRequest {
            user_id: Some(user_id),
            category: Some(category.to_string()),
        };
        let response = self
            .client
            .post(self.url("/preferences"))
            .json(&body)
            .send()
            .await?;
        let result: MessageResponse = Self::handle_response(response).await?;
        debug!("Preference update for user {}: {}", user_id, result.message);
        Ok(())
    }
}
