//! Gallery service

use crate::db::repositories::GalleryRepository;
use crate::models::{
    CreateGalleryItemInput, GalleryItem, ListParams, PagedResult, UpdateGalleryItemInput,
};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum GalleryServiceError {
    #[error("Gallery item not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct GalleryService {
    repo: Arc<dyn GalleryRepository>,
}

impl GalleryService {
    pub fn new(repo: Arc<dyn GalleryRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(
        &self,
        input: CreateGalleryItemInput,
    ) -> Result<GalleryItem, GalleryServiceError> {
        let now = Utc::now();
        let item = GalleryItem {
            id: 0,
            title: required("Title", &input.title)?,
            description: trimmed(input.description),
            image_url: required("Image URL", &input.image_url)?,
            category: trimmed(input.category),
            sort_order: input.sort_order,
            created_at: now,
            updated_at: now,
        };
        Ok(self.repo.create(&item).await.context("Failed to create gallery item")?)
    }

    pub async fn get(&self, id: i64) -> Result<GalleryItem, GalleryServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get gallery item")?
            .ok_or(GalleryServiceError::NotFound(id))
    }

    pub async fn list(
        &self,
        category: Option<&str>,
        params: &ListParams,
    ) -> Result<PagedResult<GalleryItem>, GalleryServiceError> {
        let category = category.map(str::trim).filter(|c| !c.is_empty());
        let (items, total) = self
            .repo
            .list(category, params)
            .await
            .context("Failed to list gallery items")?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn categories(&self) -> Result<Vec<String>, GalleryServiceError> {
        Ok(self.repo.categories().await.context("Failed to list categories")?)
    }

    pub async fn update(
        &self,
        id: i64,
        input: UpdateGalleryItemInput,
    ) -> Result<GalleryItem, GalleryServiceError> {
        let mut item = self.get(id).await?;
        if let Some(title) = input.title {
            item.title = required("Title", &title)?;
        }
        if input.description.is_some() {
            item.description = trimmed(input.description);
        }
        if let Some(url) = input.image_url {
            item.image_url = required("Image URL", &url)?;
        }
        if input.category.is_some() {
            item.category = trimmed(input.category);
        }
        if let Some(sort_order) = input.sort_order {
            item.sort_order = sort_order;
        }
        Ok(self.repo.update(&item).await.context("Failed to update gallery item")?)
    }

    pub async fn delete(&self, id: i64) -> Result<(), GalleryServiceError> {
        if !self.repo.delete(id).await.context("Failed to delete gallery item")? {
            return Err(GalleryServiceError::NotFound(id));
        }
        Ok(())
    }
}

fn required(field: &str, value: &str) -> Result<String, GalleryServiceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(GalleryServiceError::ValidationError(format!(
            "{} cannot be empty",
            field
        )));
    }
    Ok(value.to_string())
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxGalleryRepository;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_service() -> GalleryService {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        GalleryService::new(SqlxGalleryRepository::boxed(pool))
    }

    fn input(title: &str, category: Option<&str>) -> CreateGalleryItemInput {
        CreateGalleryItemInput {
            title: title.to_string(),
            image_url: format!("/img/{}.jpg", title),
            category: category.map(String::from),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_list_by_category() {
        let service = setup_test_service().await;
        service.create(input("a", Some("travel"))).await.unwrap();
        service.create(input("b", Some("travel"))).await.unwrap();
        service.create(input("c", Some(" "))).await.unwrap();

        let page = service.list(Some("travel"), &ListParams::new(1, 1)).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.total_pages(), 2);
        assert_eq!(service.list(None, &ListParams::default()).await.unwrap().total, 3);
        assert_eq!(service.categories().await.unwrap(), vec!["travel"]);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let service = setup_test_service().await;
        let item = service.create(input("a", None)).await.unwrap();
        let updated = service
            .update(item.id, UpdateGalleryItemInput { category: Some("art".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(updated.category.as_deref(), Some("art"));

        assert!(matches!(
            service.update(item.id, UpdateGalleryItemInput { title: Some(" ".into()), ..Default::default() }).await,
            Err(GalleryServiceError::ValidationError(_))
        ));

        service.delete(item.id).await.unwrap();
        assert!(matches!(service.get(item.id).await, Err(GalleryServiceError::NotFound(_))));
    }
}
