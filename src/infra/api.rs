//! HTTP transport for recipe ingredient data.
//!
//! - `IngredientApi` covers the two primary endpoints (single recipe, batch).
//! - `IngredientStore` covers the raw tables used for the client-side join
//!   when the primary single-recipe endpoint comes back empty.
//!
//! Both are traits so the fetch layer can run against scripted fakes.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Ingredient, IngredientId, RecipeId, RecipeIngredientLine};
use crate::util::config::FetchConfig;

/// Ingredient lines grouped by the recipe they belong to.
pub type BatchLines = HashMap<RecipeId, Vec<RecipeIngredientLine>>;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum FetchError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("base URL cannot carry a path: {0}")]
    CannotBeABase(String),
    #[error("client error: HTTP {0}")]
    Client(u16),
    #[error("server error: HTTP {0}")]
    Server(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("malformed payload: {0}")]
    Data(String),
}

/// Failure classes the retry policy decides on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Client,
    Server,
    Transport,
    Timeout,
    Data,
    /// The task running the request ended without producing a result.
    Aborted,
}

impl FetchError {
    pub fn from_status(status: StatusCode) -> Self {
        if status.is_client_error() {
            Self::Client(status.as_u16())
        } else {
            Self::Server(status.as_u16())
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidUrl(_) | Self::CannotBeABase(_) | Self::Client(_) => FailureKind::Client,
            Self::Server(_) => FailureKind::Server,
            Self::Transport(_) => FailureKind::Transport,
            Self::Timeout => FailureKind::Timeout,
            Self::Data(_) => FailureKind::Data,
        }
    }

    /// Server errors, connection failures and timeouts are worth another try.
    /// Client errors and malformed payloads are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            FailureKind::Server | FailureKind::Transport | FailureKind::Timeout
        )
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            Self::from_status(status)
        } else if error.is_timeout() {
            Self::Timeout
        } else if error.is_decode() {
            Self::Data(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

#[async_trait]
pub trait IngredientApi: Send + Sync {
    /// `GET recipes/{id}/ingredients`
    async fn recipe_ingredients(
        &self,
        recipe_id: &str,
    ) -> Result<Vec<RecipeIngredientLine>, FetchError>;

    /// `POST recipes/ingredients/batch`
    async fn batch_recipe_ingredients(
        &self,
        recipe_ids: &[RecipeId],
    ) -> Result<BatchLines, FetchError>;
}

#[async_trait]
pub trait IngredientStore: Send + Sync {
    /// Raw recipe lines without the joined ingredient record.
    async fn recipe_lines(&self, recipe_id: &str)
        -> Result<Vec<RecipeIngredientLine>, FetchError>;

    async fn ingredients_by_id(&self, ids: &[IngredientId]) -> Result<Vec<Ingredient>, FetchError>;
}

#[derive(Debug, Deserialize)]
struct ItemsEnvelope<T> {
    items: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchRequest<'a> {
    recipe_ids: &'a [RecipeId],
}

#[derive(Clone)]
pub struct HttpIngredientApi {
    http: Client,
    base_url: Url,
}

impl HttpIngredientApi {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let base_url = Url::parse(&config.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::CannotBeABase(config.base_url.clone()));
        }
        let http = Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::CannotBeABase(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn fetch_items<T>(&self, builder: reqwest::RequestBuilder) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
    {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::from_status(status));
        }
        let envelope: ItemsEnvelope<T> = response.json().await?;
        Ok(envelope.items)
    }
}

#[async_trait]
impl IngredientApi for HttpIngredientApi {
    async fn recipe_ingredients(
        &self,
        recipe_id: &str,
    ) -> Result<Vec<RecipeIngredientLine>, FetchError> {
        let url = self.endpoint(&["recipes", recipe_id, "ingredients"])?;
        tracing::debug!(%url, "requesting recipe ingredients");
        self.fetch_items(self.http.get(url)).await
    }

    async fn batch_recipe_ingredients(
        &self,
        recipe_ids: &[RecipeId],
    ) -> Result<BatchLines, FetchError> {
        let url = self.endpoint(&["recipes", "ingredients", "batch"])?;
        tracing::debug!(%url, recipes = recipe_ids.len(), "requesting batch recipe ingredients");
        self.fetch_items(self.http.post(url).json(&BatchRequest { recipe_ids }))
            .await
    }
}

#[async_trait]
impl IngredientStore for HttpIngredientApi {
    async fn recipe_lines(
        &self,
        recipe_id: &str,
    ) -> Result<Vec<RecipeIngredientLine>, FetchError> {
        let mut url = self.endpoint(&["recipe_ingredients"])?;
        url.query_pairs_mut().append_pair("recipe_id", recipe_id);
        tracing::debug!(%url, "requesting raw recipe lines");
        self.fetch_items(self.http.get(url)).await
    }

    async fn ingredients_by_id(&self, ids: &[IngredientId]) -> Result<Vec<Ingredient>, FetchError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut url = self.endpoint(&["ingredients"])?;
        url.query_pairs_mut().append_pair("ids", &ids.join(","));
        tracing::debug!(%url, "requesting ingredient records");
        self.fetch_items(self.http.get(url)).await
    }
}
