//! In-memory element and page store.
//!
//! Persistence proper is a host concern; this store gives the reload
//! pipeline and the demo server a concrete, concurrency-safe backing.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::application::repos::{ArticlesRepo, ContentRepo, ModulesRepo, PagesRepo, RepoError};
use crate::domain::elements::{ArticleRecord, ContentRecord, ModuleRecord, validate_css_id_attr};
use crate::domain::error::DomainError;
use crate::domain::pages::{LayoutRecord, PageRecord};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    modules: DashMap<i64, ModuleRecord>,
    content: DashMap<i64, ContentRecord>,
    articles: DashMap<i64, ArticleRecord>,
    pages: DashMap<String, PageRecord>,
    layouts: DashMap<i64, LayoutRecord>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_module(&self, record: ModuleRecord) -> Result<(), DomainError> {
        validate_css_id_attr(&record.css_id_attr)?;
        self.modules.insert(record.id, record);
        Ok(())
    }

    pub fn insert_content(&self, record: ContentRecord) -> Result<(), DomainError> {
        validate_css_id_attr(&record.css_id_attr)?;
        self.content.insert(record.id, record);
        Ok(())
    }

    pub fn insert_article(&self, record: ArticleRecord) -> Result<(), DomainError> {
        validate_css_id_attr(&record.css_id_attr)?;
        self.articles.insert(record.id, record);
        Ok(())
    }

    pub fn insert_page(&self, record: PageRecord) {
        self.pages.insert(record.slug.clone(), record);
    }

    pub fn insert_layout(&self, record: LayoutRecord) {
        self.layouts.insert(record.id, record);
    }
}

#[async_trait]
impl ModulesRepo for InMemoryStore {
    async fn find_module(&self, id: i64) -> Result<Option<ModuleRecord>, RepoError> {
        Ok(self.modules.get(&id).map(|entry| entry.clone()))
    }
}

#[async_trait]
impl ContentRepo for InMemoryStore {
    async fn find_content(&self, id: i64) -> Result<Option<ContentRecord>, RepoError> {
        Ok(self.content.get(&id).map(|entry| entry.clone()))
    }
}

#[async_trait]
impl ArticlesRepo for InMemoryStore {
    async fn find_article(&self, id: i64) -> Result<Option<ArticleRecord>, RepoError> {
        Ok(self.articles.get(&id).map(|entry| entry.clone()))
    }
}

#[async_trait]
impl PagesRepo for InMemoryStore {
    async fn find_page_by_slug(&self, slug: &str) -> Result<Option<PageRecord>, RepoError> {
        Ok(self.pages.get(slug).map(|entry| entry.clone()))
    }

    async fn find_layout(&self, id: i64) -> Result<Option<LayoutRecord>, RepoError> {
        Ok(self.layouts.get(&id).map(|entry| entry.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryStore;
    use crate::application::repos::{ModulesRepo, PagesRepo};
    use crate::domain::elements::{ModuleRecord, ReloadFlags};
    use crate::domain::pages::{LayoutRecord, PageRecord, ThemeRecord};

    #[tokio::test]
    async fn module_lookup_round_trips() {
        let store = InMemoryStore::new();
        store
            .insert_module(ModuleRecord {
                id: 9,
                module_type: "navigation".to_string(),
                name: "nav".to_string(),
                css_id_attr: String::new(),
                headline: None,
                body_html: "<ul></ul>".to_string(),
                flags: ReloadFlags::enabled(),
            })
            .expect("valid record");

        let found = store.find_module(9).await.expect("lookup ok");
        assert_eq!(found.map(|record| record.id), Some(9));
        assert!(store.find_module(10).await.expect("lookup ok").is_none());
    }

    #[test]
    fn markup_in_the_css_id_attribute_is_rejected() {
        let store = InMemoryStore::new();
        let result = store.insert_module(ModuleRecord {
            id: 9,
            module_type: "navigation".to_string(),
            name: "nav".to_string(),
            css_id_attr: " id=\"x\"><script>".to_string(),
            headline: None,
            body_html: String::new(),
            flags: ReloadFlags::enabled(),
        });

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn pages_are_keyed_by_slug() {
        let store = InMemoryStore::new();
        store.insert_layout(LayoutRecord {
            id: 1,
            name: "default".to_string(),
            template: None,
            doctype: "html_5".to_string(),
            theme: ThemeRecord::default(),
        });
        store.insert_page(PageRecord {
            id: 1,
            slug: "home".to_string(),
            title: "Home".to_string(),
            layout_id: 1,
            elements: Vec::new(),
        });

        let page = store
            .find_page_by_slug("home")
            .await
            .expect("lookup ok")
            .expect("page present");
        let layout = store
            .find_layout(page.layout_id)
            .await
            .expect("lookup ok")
            .expect("layout present");
        assert_eq!(layout.doctype, "html_5");
    }
}
