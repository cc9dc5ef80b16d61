use std::sync::Arc;

use exam_core::ExamCatalog;
use exam_core::model::SessionSettings;
use storage::repository::Storage;
use tracing::debug;

use crate::Clock;
use crate::error::AppServicesError;
use crate::history_service::ResultHistoryService;
use crate::identity_service::IdentityService;
use crate::sessions::ExamSessionService;

/// Assembles app-facing services over one storage backend and one catalog.
#[derive(Clone)]
pub struct AppServices {
    catalog: Arc<ExamCatalog>,
    sessions: Arc<ExamSessionService>,
    identity: Arc<IdentityService>,
    history: Arc<ResultHistoryService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage and a JSON catalog.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the catalog is invalid or storage
    /// initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        settings: SessionSettings,
        catalog_json: &str,
    ) -> Result<Self, AppServicesError> {
        let catalog = ExamCatalog::from_json(catalog_json)?;
        Self::sqlite_with_catalog(db_url, clock, settings, catalog).await
    }

    /// Build services backed by `SQLite` storage over an already loaded catalog.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Sqlite` if storage initialization fails.
    pub async fn sqlite_with_catalog(
        db_url: &str,
        clock: Clock,
        settings: SessionSettings,
        catalog: ExamCatalog,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::assemble(storage, clock, settings, catalog))
    }

    /// Build services over in-memory storage.
    #[must_use]
    pub fn in_memory(clock: Clock, settings: SessionSettings, catalog: ExamCatalog) -> Self {
        Self::assemble(Storage::in_memory(), clock, settings, catalog)
    }

    fn assemble(
        storage: Storage,
        clock: Clock,
        settings: SessionSettings,
        catalog: ExamCatalog,
    ) -> Self {
        debug!(exams = catalog.len(), "catalog loaded");
        let catalog = Arc::new(catalog);
        let sessions = Arc::new(ExamSessionService::new(
            clock,
            settings,
            Arc::clone(&catalog),
            Arc::clone(&storage.results),
        ));
        let identity = Arc::new(IdentityService::new(clock, Arc::clone(&storage.users)));
        let history = Arc::new(ResultHistoryService::new(
            Arc::clone(&catalog),
            Arc::clone(&storage.results),
        ));

        Self {
            catalog,
            sessions,
            identity,
            history,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<ExamCatalog> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn sessions(&self) -> Arc<ExamSessionService> {
        Arc::clone(&self.sessions)
    }

    #[must_use]
    pub fn identity(&self) -> Arc<IdentityService> {
        Arc::clone(&self.identity)
    }

    #[must_use]
    pub fn history(&self) -> Arc<ResultHistoryService> {
        Arc::clone(&self.history)
    }
}
