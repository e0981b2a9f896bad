use chrono::Utc;
use sqlx::{sqlite::SqlitePoolOptions, FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::info;

use crate::config::HeadlineConfig;
use crate::models::{CategorizedHeadlines, Headline, User};

/// A `users` row including the stored password hash. Never leaves the backend.
#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: String,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        User {
            id: record.id,
            name: record.name,
            email: record.email,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct HeadlineRow {
    category: String,
    title: String,
    link: String,
    summary: String,
    source: String,
}

/// Outcome of adding a category to a user's preference set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceUpdate {
    Added,
    AlreadyPresent,
    UnknownUser,
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_preferences (
                user_id INTEGER NOT NULL REFERENCES users(id),
                category TEXT NOT NULL,
                PRIMARY KEY (user_id, category)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS headlines (
                id INTEGER PRIMARY KEY,
                category TEXT NOT NULL,
                title TEXT NOT NULL,
                link TEXT NOT NULL UNIQUE,
                summary TEXT NOT NULL DEFAULT '',
                source TEXT NOT NULL DEFAULT '',
                article TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_headlines_category
            ON headlines(category, id)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Makes the stored catalog match `configs`: upserts by link and drops
    /// headlines whose link is no longer configured, in one transaction.
    pub async fn sync_headlines(&self, configs: &[HeadlineConfig]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        for config in configs {
            sqlx::query(
                r#"
                INSERT INTO headlines (category, title, link, summary, source, article)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(link) DO UPDATE SET
                    category = excluded.category,
                    title = excluded.title,
                    summary = excluded.summary,
                    source = excluded.source,
                    article = excluded.article
                "#,
            )
            .bind(&config.category)
            .bind(&config.title)
            .bind(&config.link)
            .bind(&config.summary)
            .bind(&config.source)
            .bind(&config.article)
            .execute(&mut *tx)
            .await?;
        }

        let mut prune = QueryBuilder::<Sqlite>::new("DELETE FROM headlines");
        if !configs.is_empty() {
            prune.push(" WHERE link NOT IN (");
            let mut links = prune.separated(", ");
            for config in configs {
                links.push_bind(&config.link);
            }
            links.push_unseparated(")");
        }
        let removed = prune.build().execute(&mut *tx).await?.rows_affected();

        tx.commit().await?;

        if removed > 0 {
            info!("Removed {} headlines no longer in the catalog", removed);
        }
        Ok(())
    }

    /// Inserts a user. Returns `None` when the email is already registered.
    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, name, email
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(&now)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(Some(user)),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn get_user(&self, user_id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT id, name, email FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Categories the user marked as interesting, in the order they were added.
    pub async fn get_preferences(&self, user_id: i64) -> anyhow::Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT category FROM user_preferences WHERE user_id = ? ORDER BY rowid",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(category,)| category).collect())
    }

    /// Adds `category` to the user's set in a single statement; the composite
    /// key makes a repeated category a no-op.
    pub async fn add_preference(
        &self,
        user_id: i64,
        category: &str,
    ) -> anyhow::Result<PreferenceUpdate> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_preferences (user_id, category)
            SELECT id, ? FROM users WHERE id = ?
            ON CONFLICT(user_id, category) DO NOTHING
            "#,
        )
        .bind(category)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(PreferenceUpdate::Added);
        }

        if self.get_user(user_id).await?.is_some() {
            Ok(PreferenceUpdate::AlreadyPresent)
        } else {
            Ok(PreferenceUpdate::UnknownUser)
        }
    }

    pub async fn get_categorized_headlines(&self) -> anyhow::Result<CategorizedHeadlines> {
        let rows = sqlx::query_as::<_, HeadlineRow>(
            r#"
            SELECT category, title, link, summary, source FROM headlines
            ORDER BY category, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut categorized = CategorizedHeadlines::new();
        for row in rows {
            categorized.entry(row.category).or_default().push(Headline {
                title: row.title,
                link: row.link,
                summary: row.summary,
                source: row.source,
                category: None,
            });
        }
        Ok(categorized)
    }

    /// Full article text for a headline link, if one is stored.
    pub async fn get_article(&self, link: &str) -> anyhow::Result<Option<String>> {
        let article: Option<(Option<String>,)> =
            sqlx::query_as("SELECT article FROM headlines WHERE link = ?")
                .bind(link)
                .fetch_optional(&self.pool)
                .await?;
        Ok(article.and_then(|(article,)| article))
    }
}
