//! The headless side of the reader app: what the login, home, article and
//! aggregator screens call into.

use rand::Rng;
use tracing::{info, warn};

use crate::aggregator::{build_personalized_feed, headlines_for_category};
use crate::client::ApiClient;
use crate::error::ClientError;
use crate::models::{CategorizedHeadlines, Headline, User};
use crate::session::{KeyValueStore, SessionContext};
use crate::validation::{validate_login, validate_registration};

/// Shown in place of an article body the backend has no text for.
pub const ARTICLE_PLACEHOLDER: &str = "Article content not found";

/// The aggregator screen's data: the user's categories and the shuffled feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonalizedFeed {
    pub categories: Vec<String>,
    pub headlines: Vec<Headline>,
}

pub struct Reader<S> {
    client: ApiClient,
    session: SessionContext<S>,
}

impl<S: KeyValueStore> Reader<S> {
    pub fn new(client: ApiClient, store: S) -> Self {
        Self {
            client,
            session: SessionContext::new(store),
        }
    }

    pub fn session(&self) -> &SessionContext<S> {
        &self.session
    }

    /// Logs in and persists the session. Nothing is written on failure.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ClientError> {
        validate_login(email, password).map_err(|m| ClientError::Validation(m.to_string()))?;

        let user = self.client.login(email, password).await?;
        self.session.save(&user).await?;
        info!(user_id = user.id, "Logged in");
        Ok(user)
    }

    /// Creates the account; the user still has to log in afterwards.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<User, ClientError> {
        validate_registration(name, email, password, confirm_password)
            .map_err(|m| ClientError::Validation(m.to_string()))?;

        let user = self.client.register(name.trim(), email, password).await?;
        info!(user_id = user.id, "Registered");
        Ok(user)
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        self.session.clear().await?;
        Ok(())
    }

    pub async fn current_user(&self) -> Result<Option<User>, ClientError> {
        Ok(self.session.load().await?)
    }

    async fn require_user(&self) -> Result<User, ClientError> {
        self.session.load().await?.ok_or(ClientError::NoSession)
    }

    pub async fn news(&self) -> Result<CategorizedHeadlines, ClientError> {
        self.client.fetch_news().await
    }

    /// The home screen's list for one category picked from the filter.
    pub async fn category_headlines(&self, filter: &str) -> Result<Vec<Headline>, ClientError> {
        let news = self.client.fetch_news().await?;
        Ok(headlines_for_category(&news, filter))
    }

    /// Categories the current user marked; empty when none are recorded yet.
    pub async fn preferences(&self) -> Result<Vec<String>, ClientError> {
        let user = self.require_user().await?;
        self.preferences_for(user.id).await
    }

    async fn preferences_for(&self, user_id: i64) -> Result<Vec<String>, ClientError> {
        match self.client.fetch_preferences(user_id).await {
            Ok(categories) => Ok(categories),
            Err(ClientError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    pub async fn personalized_feed(&self) -> Result<PersonalizedFeed, ClientError> {
        let (categories, news) = self.feed_inputs().await?;
        let headlines =
            build_personalized_feed(&news, categories.as_slice(), &mut rand::thread_rng());
        Ok(PersonalizedFeed {
            categories,
            headlines,
        })
    }

    /// Same as [`Reader::personalized_feed`] with the order drawn from `rng`.
    pub async fn personalized_feed_with<R>(
        &self,
        rng: &mut R,
    ) -> Result<PersonalizedFeed, ClientError>
    where
        R: Rng + Send + ?Sized,
    {
        let (categories, news) = self.feed_inputs().await?;
        let headlines = build_personalized_feed(&news, categories.as_slice(), rng);
        Ok(PersonalizedFeed {
            categories,
            headlines,
        })
    }

    async fn feed_inputs(&self) -> Result<(Vec<String>, CategorizedHeadlines), ClientError> {
        let user = self.require_user().await?;
        let categories = self.preferences_for(user.id).await?;
        if categories.is_empty() {
            return Ok((categories, CategorizedHeadlines::new()));
        }
        let news = self.client.fetch_news().await?;
        Ok((categories, news))
    }

    /// Records interest in `category` for the logged-in user.
    pub async fn mark_interest(&self, category: &str) -> Result<(), ClientError> {
        let user = self.require_user().await?;
        self.client
            .add_preference(user.id, category)
            .await
            .map_err(|e| {
                warn!(user_id = user.id, category, "Failed to save preference: {}", e);
                e
            })
    }

    /// The summary shown for `link`, taken from the headline that carries it.
    pub async fn summary(&self, link: &str) -> Result<String, ClientError> {
        let news = self.client.fetch_news().await?;
        news.into_values()
            .flatten()
            .find(|headline| headline.link == link)
            .map(|headline| headline.summary)
            .ok_or_else(|| ClientError::NotFound(format!("No headline for {}", link)))
    }

    /// Article body for display; a missing article degrades to the placeholder.
    pub async fn open_article(&self, link: &str) -> Result<String, ClientError> {
        match self.client.fetch_article_body(link).await {
            Ok(body) => Ok(body),
            Err(ClientError::NotFound(_)) => Ok(ARTICLE_PLACEHOLDER.to_string()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ARTICLE_NOT_FOUND;
    use crate::session::{MemoryStore, KEY_IS_LOGGED_IN};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_user() -> User {
        User {
            id: 7,
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
        }
    }

    async fn setup() -> (MockServer, Reader<MemoryStore>) {
        let server = MockServer::start().await;
        let client = ApiClient::new(server.uri()).unwrap();
        (server, Reader::new(client, MemoryStore::new()))
    }

    async fn logged_in() -> (MockServer, Reader<MemoryStore>) {
        let (server, reader) = setup().await;
        reader.session().save(&test_user()).await.unwrap();
        (server, reader)
    }

    async fn mount_news(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/news"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Technology": [{"title": "h1", "link": "https://example.com/h1", "summary": "s", "source": "Verge"}],
                "Business": [{"title": "h2", "link": "https://example.com/h2", "summary": "s", "source": "Verge"}]
            })))
            .mount(server)
            .await;
    }

    mod login_tests {
        use super::*;

        #[tokio::test]
        async fn test_login_saves_session() {
            let (server, reader) = setup().await;
            Mock::given(method("POST"))
                .and(path("/login"))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(json!({"user": test_user()})),
                )
                .mount(&server)
                .await;

            let user = reader.login("ada@example.com", "password123").await.unwrap();

            assert_eq!(user, test_user());
            assert_eq!(reader.current_user().await.unwrap(), Some(test_user()));
        }

        #[tokio::test]
        async fn test_wrong_password_writes_no_session() {
            let (server, reader) = setup().await;
            Mock::given(method("POST"))
                .and(path("/login"))
                .respond_with(
                    ResponseTemplate::new(401)
                        .set_body_json(json!({"message": "Invalid credentials"})),
                )
                .mount(&server)
                .await;

            let err = reader
                .login("ada@example.com", "password123")
                .await
                .unwrap_err();

            assert_eq!(err.to_string(), "Invalid email or password");
            assert!(reader.current_user().await.unwrap().is_none());
            assert!(reader
                .session()
                .store()
                .get(KEY_IS_LOGGED_IN)
                .await
                .unwrap()
                .is_none());
        }

        #[tokio::test]
        async fn test_invalid_input_never_reaches_backend() {
            let (server, reader) = setup().await;
            Mock::given(method("POST"))
                .and(path("/login"))
                .respond_with(ResponseTemplate::new(200))
                .expect(0)
                .mount(&server)
                .await;

            let err = reader.login("not-an-email", "password123").await.unwrap_err();
            assert!(matches!(err, ClientError::Validation(_)));

            let err = reader.login("ada@example.com", "short").await.unwrap_err();
            assert!(matches!(err, ClientError::Validation(_)));
        }

        #[tokio::test]
        async fn test_register_does_not_log_in() {
            let (server, reader) = setup().await;
            Mock::given(method("POST"))
                .and(path("/register"))
                .respond_with(
                    ResponseTemplate::new(201).set_body_json(json!({"user": test_user()})),
                )
                .mount(&server)
                .await;

            reader
                .register("Ada", "ada@example.com", "password123", "password123")
                .await
                .unwrap();

            assert!(reader.current_user().await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_register_password_mismatch() {
            let (_server, reader) = setup().await;

            let err = reader
                .register("Ada", "ada@example.com", "password123", "password124")
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), "Passwords do not match");
        }

        #[tokio::test]
        async fn test_logout_clears_session() {
            let (_server, reader) = logged_in().await;

            reader.logout().await.unwrap();

            assert!(reader.current_user().await.unwrap().is_none());
        }
    }

    mod feed_tests {
        use super::*;

        #[tokio::test]
        async fn test_feed_requires_session() {
            let (_server, reader) = setup().await;

            let err = reader.personalized_feed().await.unwrap_err();
            assert!(matches!(err, ClientError::NoSession));
        }

        #[tokio::test]
        async fn test_feed_filters_to_preferences() {
            let (server, reader) = logged_in().await;
            Mock::given(method("GET"))
                .and(path("/user-preferences"))
                .and(query_param("userId", "7"))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(json!({"categories": ["Technology"]})),
                )
                .mount(&server)
                .await;
            mount_news(&server).await;

            let feed = reader
                .personalized_feed_with(&mut StdRng::seed_from_u64(11))
                .await
                .unwrap();

            assert_eq!(feed.categories, vec!["Technology"]);
            assert_eq!(feed.headlines.len(), 1);
            assert_eq!(feed.headlines[0].title, "h1");
            assert_eq!(feed.headlines[0].category.as_deref(), Some("Technology"));
        }

        #[tokio::test]
        async fn test_missing_preferences_give_empty_feed() {
            let (server, reader) = logged_in().await;
            Mock::given(method("GET"))
                .and(path("/user-preferences"))
                .respond_with(
                    ResponseTemplate::new(404)
                        .set_body_json(json!({"message": "User preferences not found"})),
                )
                .mount(&server)
                .await;

            let feed = reader.personalized_feed().await.unwrap();

            assert!(feed.categories.is_empty());
            assert!(feed.headlines.is_empty());
        }

        #[tokio::test]
        async fn test_news_failure_surfaces() {
            let (server, reader) = logged_in().await;
            Mock::given(method("GET"))
                .and(path("/user-preferences"))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(json!({"categories": ["Technology"]})),
                )
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path("/news"))
                .respond_with(
                    ResponseTemplate::new(500).set_body_json(json!({"message": "Failed to fetch news"})),
                )
                .mount(&server)
                .await;

            let err = reader.personalized_feed().await.unwrap_err();
            assert!(matches!(err, ClientError::Server(_)));
        }

        #[tokio::test]
        async fn test_category_headlines() {
            let (server, reader) = setup().await;
            mount_news(&server).await;

            let headlines = reader.category_headlines("business").await.unwrap();

            assert_eq!(headlines.len(), 1);
            assert_eq!(headlines[0].title, "h2");
        }
    }

    mod interest_tests {
        use super::*;

        #[tokio::test]
        async fn test_mark_interest_requires_session() {
            let (_server, reader) = setup().await;

            let err = reader.mark_interest("Technology").await.unwrap_err();
            assert!(matches!(err, ClientError::NoSession));
        }

        #[tokio::test]
        async fn test_mark_interest_unknown_user_keeps_session() {
            let (server, reader) = setup().await;
            let stale = User {
                id: 9999,
                ..test_user()
            };
            reader.session().save(&stale).await.unwrap();
            Mock::given(method("POST"))
                .and(path("/preferences"))
                .respond_with(
                    ResponseTemplate::new(404).set_body_json(json!({"message": "User not found"})),
                )
                .mount(&server)
                .await;

            let err = reader.mark_interest("Technology").await.unwrap_err();

            assert!(matches!(err, ClientError::NotFound(_)));
            assert_eq!(reader.current_user().await.unwrap(), Some(stale));
        }
    }

    mod article_tests {
        use super::*;

        #[tokio::test]
        async fn test_open_article() {
            let (server, reader) = setup().await;
            Mock::given(method("GET"))
                .and(path("/article"))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(json!({"article": "Body text"})),
                )
                .mount(&server)
                .await;

            assert_eq!(
                reader.open_article("https://example.com/h1").await.unwrap(),
                "Body text"
            );
        }

        #[tokio::test]
        async fn test_missing_article_shows_placeholder() {
            let (server, reader) = setup().await;
            Mock::given(method("GET"))
                .and(path("/article"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(json!({"article": ARTICLE_NOT_FOUND})),
                )
                .mount(&server)
                .await;

            assert_eq!(
                reader.open_article("https://example.com/nope").await.unwrap(),
                ARTICLE_PLACEHOLDER
            );
        }

        #[tokio::test]
        async fn test_summary_for_link() {
            let (server, reader) = setup().await;
            Mock::given(method("GET"))
                .and(path("/news"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "Technology": [{"title": "h1", "link": "https://example.com/h1", "summary": "Phones got faster", "source": "Verge"}]
                })))
                .mount(&server)
                .await;

            assert_eq!(
                reader.summary("https://example.com/h1").await.unwrap(),
                "Phones got faster"
            );
            let err = reader.summary("https://example.com/nope").await.unwrap_err();
            assert!(matches!(err, ClientError::NotFound(_)));
        }

        #[tokio::test]
        async fn test_article_server_error_is_not_masked() {
            let (server, reader) = setup().await;
            Mock::given(method("GET"))
                .and(path("/article"))
                .respond_with(ResponseTemplate::new(500))
                .mount(&server)
                .await;

            let err = reader.open_article("https://example.com/h1").await.unwrap_err();
            assert!(matches!(err, ClientError::Server(_)));
        }
    }
}
