//! Lookup traits for the element and page stores.
//!
//! Persistence is a host concern; the reload pipeline only ever resolves
//! records by primary key.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::elements::{ArticleRecord, ContentRecord, ModuleRecord};
use crate::domain::pages::{LayoutRecord, PageRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait ModulesRepo: Send + Sync {
    async fn find_module(&self, id: i64) -> Result<Option<ModuleRecord>, RepoError>;
}

#[async_trait]
pub trait ContentRepo: Send + Sync {
    async fn find_content(&self, id: i64) -> Result<Option<ContentRecord>, RepoError>;
}

#[async_trait]
pub trait ArticlesRepo: Send + Sync {
    async fn find_article(&self, id: i64) -> Result<Option<ArticleRecord>, RepoError>;
}

#[async_trait]
pub trait PagesRepo: Send + Sync {
    async fn find_page_by_slug(&self, slug: &str) -> Result<Option<PageRecord>, RepoError>;
    async fn find_layout(&self, id: i64) -> Result<Option<LayoutRecord>, RepoError>;
}
