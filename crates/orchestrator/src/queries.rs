//! Typed, cached reads of backend state.

use std::sync::Arc;

use morph_split_model::{BackendResponse, FetchResponse, ImageDimension, ImageMaskPair, Split};
use morph_split_storage::{Backend, ClientError, Transport};

use crate::cache::{QueryCache, QueryKey};

/// Page size used for every paginated preview collection.
pub const PAGE_SIZE: u32 = 10;

/// Backend status checks that answer with a [`BackendResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCheck {
    BackendIsRunning,
    SessionIsRunning,
    ImageUploadStatus,
    MaskUploadStatus,
    ImageMaskBalanceStatus,
    AugmentationIsRunning,
    AugmentationIsComplete,
}

impl StatusCheck {
    pub const ALL: [StatusCheck; 7] = [
        StatusCheck::BackendIsRunning,
        StatusCheck::SessionIsRunning,
        StatusCheck::ImageUploadStatus,
        StatusCheck::MaskUploadStatus,
        StatusCheck::ImageMaskBalanceStatus,
        StatusCheck::AugmentationIsRunning,
        StatusCheck::AugmentationIsComplete,
    ];

    pub fn query_key(&self) -> QueryKey {
        match self {
            StatusCheck::BackendIsRunning => QueryKey::BackendIsRunning,
            StatusCheck::SessionIsRunning => QueryKey::SessionIsRunning,
            StatusCheck::ImageUploadStatus => QueryKey::ImageUploadStatus,
            StatusCheck::MaskUploadStatus => QueryKey::MaskUploadStatus,
            StatusCheck::ImageMaskBalanceStatus => QueryKey::ImageMaskBalanceStatus,
            StatusCheck::AugmentationIsRunning => QueryKey::AugmentationIsRunning,
            StatusCheck::AugmentationIsComplete => QueryKey::AugmentationIsComplete,
        }
    }
}

/// Cache key of a split's preview collection.
pub fn split_set_key(split: Split) -> QueryKey {
    match split {
        Split::Train => QueryKey::TrainingSet,
        Split::Val => QueryKey::ValidationSet,
        Split::Test => QueryKey::TestingSet,
    }
}

/// Reads that go through the [`QueryCache`].
pub struct Queries<T: Transport> {
    backend: Backend<T>,
    cache: Arc<QueryCache>,
}

impl<T: Transport> Clone for Queries<T> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<T: Transport> Queries<T> {
    pub fn new(backend: Backend<T>, cache: Arc<QueryCache>) -> Self {
        Self { backend, cache }
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub async fn image_names(&self) -> Result<Vec<String>, ClientError> {
        self.names(QueryKey::ImageNames).await
    }

    pub async fn mask_names(&self) -> Result<Vec<String>, ClientError> {
        self.names(QueryKey::MaskNames).await
    }

    /// Name of the uploaded stratification file, if any.
    pub async fn stratification_file_name(&self) -> Result<Option<String>, ClientError> {
        let names: Vec<String> = self.names(QueryKey::StratificationFileName).await?;
        Ok(names.into_iter().next())
    }

    /// Column names of the uploaded stratification file.
    pub async fn stratified_split_parameters(&self) -> Result<Vec<String>, ClientError> {
        self.names(QueryKey::StratifiedSplitParameters).await
    }

    pub async fn status(&self, check: StatusCheck) -> Result<BackendResponse, ClientError> {
        let key: QueryKey = check.query_key();
        let backend: &Backend<T> = &self.backend;
        self.cache
            .fetch(key, None, || async move {
                backend.endpoint(key.endpoint()).get_status(&[]).await
            })
            .await
    }

    /// Shared height and width of the uploaded images and masks.
    pub async fn image_mask_dimension(&self) -> Result<Option<ImageDimension>, ClientError> {
        let key: QueryKey = QueryKey::ImageMaskDimension;
        let backend: &Backend<T> = &self.backend;
        let response: BackendResponse = self
            .cache
            .fetch(key, None, || async move {
                backend.endpoint(key.endpoint()).get_status(&[]).await
            })
            .await?;
        Ok(response.dimension)
    }

    /// One page of uploaded image/mask pairs.
    pub async fn metadata(&self, page: u32) -> Result<FetchResponse<ImageMaskPair>, ClientError> {
        self.page(QueryKey::Metadata, page, Vec::new()).await
    }

    /// One page of the augmented preview of `split`.
    pub async fn split_set(
        &self,
        split: Split,
        page: u32,
    ) -> Result<FetchResponse<ImageMaskPair>, ClientError> {
        self.page(split_set_key(split), page, Vec::new()).await
    }

    /// Freshly signed URLs for the resized uploads; never served from cache.
    pub async fn image_mask_urls(&self) -> Result<FetchResponse<ImageMaskPair>, ClientError> {
        let key: QueryKey = QueryKey::ImageMaskUrls;
        let backend: &Backend<T> = &self.backend;
        self.cache
            .fetch(key, None, || async move {
                backend
                    .endpoint(key.endpoint())
                    .get_all::<ImageMaskPair>(&[("refresh", "true".to_string())])
                    .await
            })
            .await
    }

    async fn names(&self, key: QueryKey) -> Result<Vec<String>, ClientError> {
        let backend: &Backend<T> = &self.backend;
        let response: FetchResponse<String> = self
            .cache
            .fetch(key, None, || async move {
                backend.endpoint(key.endpoint()).get_all::<String>(&[]).await
            })
            .await?;
        Ok(response.results)
    }

    async fn page(
        &self,
        key: QueryKey,
        page: u32,
        mut params: Vec<(&'static str, String)>,
    ) -> Result<FetchResponse<ImageMaskPair>, ClientError> {
        let page: u32 = page.max(1);
        params.push(("page", page.to_string()));
        params.push(("page_size", PAGE_SIZE.to_string()));
        let backend: &Backend<T> = &self.backend;
        self.cache
            .fetch(key, Some(page), || async move {
                backend.endpoint(key.endpoint()).get_all(&params).await
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_set_keys() {
        assert_eq!(split_set_key(Split::Train), QueryKey::TrainingSet);
        assert_eq!(split_set_key(Split::Val), QueryKey::ValidationSet);
        assert_eq!(split_set_key(Split::Test), QueryKey::TestingSet);
    }

    #[test]
    fn test_status_checks_map_to_status_endpoints() {
        for check in StatusCheck::ALL {
            assert!(check.query_key().endpoint().starts_with("/status_checks/"));
        }
    }
}
