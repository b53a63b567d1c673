//! Per-language worker cache with single-flight initialization.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::{RecognitionEngine, RecognitionWorker};
use crate::error::OcrError;
use crate::language::Language;
use crate::models::document::PageImage;
use crate::progress::{ProgressReporter, Stage};

type Slot = Arc<OnceCell<Arc<dyn RecognitionWorker>>>;

/// Process-wide cache of recognition workers, keyed by engine language code.
///
/// Lifecycle: empty on creation, populated on demand by [`acquire`], emptied
/// by [`release_all`] when the session ends.
///
/// [`acquire`]: WorkerRegistry::acquire
/// [`release_all`]: WorkerRegistry::release_all
pub struct WorkerRegistry {
    engine: Arc<dyn RecognitionEngine>,
    workers: Mutex<HashMap<String, Slot>>,
}

impl WorkerRegistry {
    pub fn new(engine: Arc<dyn RecognitionEngine>) -> Self {
        Self {
            engine,
            workers: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, code: &str) -> Slot {
        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            workers
                .entry(code.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new())),
        )
    }

    /// Return the cached worker for `language`, creating it on first use.
    ///
    /// Concurrent calls for the same uncached language share one
    /// initialization. A failed initialization is not cached.
    pub async fn acquire(&self, language: &Language) -> Result<Arc<dyn RecognitionWorker>, OcrError> {
        let code = language.engine_code();
        let slot = self.slot(code);

        let worker = slot
            .get_or_try_init(|| async {
                info!("Initializing recognition worker for '{}'", code);
                let worker = self.engine.create_worker(code).await?;
                Ok::<_, OcrError>(Arc::from(worker))
            })
            .await?;

        Ok(Arc::clone(worker))
    }

    /// Run recognition on one image, wrapping engine failures.
    pub async fn recognize(
        &self,
        worker: &dyn RecognitionWorker,
        image: &PageImage,
        progress: &ProgressReporter,
    ) -> Result<String, OcrError> {
        debug!(
            "Recognizing page {} ({}x{}) with '{}'",
            image.page,
            image.width(),
            image.height(),
            worker.language()
        );

        progress.report(0.0, Stage::Recognizing(image.page));
        let text = worker.recognize(image, progress).await.map_err(|e| match e {
            OcrError::Recognition(_) | OcrError::WorkerTerminated(_) => e,
            other => OcrError::Recognition(other.to_string()),
        })?;
        progress.report(100.0, Stage::Recognizing(image.page));

        Ok(text)
    }

    /// Terminate and evict the worker for one language.
    pub async fn release(&self, language: &Language) {
        let code = language.engine_code();
        let slot = {
            let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
            workers.remove(code)
        };

        if let Some(worker) = slot.and_then(|s| s.get().cloned()) {
            terminate(code, worker.as_ref()).await;
        }
    }

    /// Terminate and evict every cached worker.
    pub async fn release_all(&self) {
        let slots: Vec<(String, Slot)> = {
            let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
            workers.drain().collect()
        };

        for (code, slot) in slots {
            if let Some(worker) = slot.get() {
                terminate(&code, worker.as_ref()).await;
            }
        }
    }

    /// Engine codes with a live worker, sorted.
    pub fn cached_languages(&self) -> Vec<String> {
        let workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        let mut codes: Vec<String> = workers
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(code, _)| code.clone())
            .collect();
        codes.sort();
        codes
    }
}

async fn terminate(code: &str, worker: &dyn RecognitionWorker) {
    match worker.terminate().await {
        Ok(()) => info!("Terminated recognition worker for '{}'", code),
        Err(e) => warn!("Failed to terminate worker for '{}': {}", code, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeEngine;

    fn registry() -> (Arc<FakeEngine>, WorkerRegistry) {
        let engine = Arc::new(FakeEngine::default());
        let registry = WorkerRegistry::new(engine.clone());
        (engine, registry)
    }

    #[tokio::test]
    async fn test_acquire_is_cached() {
        let (engine, registry) = registry();
        let eng = Language::parse("eng").unwrap();

        let first = registry.acquire(&eng).await.unwrap();
        let second = registry.acquire(&eng).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(engine.created(), 1);
    }

    #[tokio::test]
    async fn test_distinct_languages_get_distinct_workers() {
        let (engine, registry) = registry();

        let eng = registry.acquire(&Language::parse("eng").unwrap()).await.unwrap();
        let deu = registry.acquire(&Language::parse("deu").unwrap()).await.unwrap();

        assert!(!Arc::ptr_eq(&eng, &deu));
        assert_eq!(deu.language(), "deu");
        assert_eq!(engine.created(), 2);
        assert_eq!(registry.cached_languages(), vec!["deu", "eng"]);
    }

    #[tokio::test]
    async fn test_auto_shares_default_worker() {
        let (engine, registry) = registry();

        let auto = registry.acquire(&Language::Auto).await.unwrap();
        let eng = registry.acquire(&Language::parse("eng").unwrap()).await.unwrap();

        assert!(Arc::ptr_eq(&auto, &eng));
        assert_eq!(auto.language(), "eng");
        assert_eq!(engine.created(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_acquire_is_single_flight() {
        let (engine, registry) = registry();
        let spa = Language::parse("spa").unwrap();

        let (a, b, c) = tokio::join!(
            registry.acquire(&spa),
            registry.acquire(&spa),
            registry.acquire(&spa)
        );

        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, &c));
        assert_eq!(engine.created(), 1);
    }

    #[tokio::test]
    async fn test_release_all_empties_cache() {
        let (engine, registry) = registry();
        let eng = Language::parse("eng").unwrap();

        let before = registry.acquire(&eng).await.unwrap();
        registry.release_all().await;
        assert!(registry.cached_languages().is_empty());
        assert_eq!(engine.terminated(), 1);

        let after = registry.acquire(&eng).await.unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(engine.created(), 2);
    }

    #[tokio::test]
    async fn test_release_single_language() {
        let (engine, registry) = registry();
        let eng = Language::parse("eng").unwrap();
        let fra = Language::parse("fra").unwrap();

        registry.acquire(&eng).await.unwrap();
        registry.acquire(&fra).await.unwrap();
        registry.release(&fra).await;

        assert_eq!(registry.cached_languages(), vec!["eng"]);
        assert_eq!(engine.terminated(), 1);
    }

    #[tokio::test]
    async fn test_failed_initialization_is_retried() {
        let (engine, registry) = registry();
        engine.fail_next_creation();
        let eng = Language::parse("eng").unwrap();

        assert!(matches!(
            registry.acquire(&eng).await,
            Err(OcrError::ModelLoad(_))
        ));
        assert!(registry.cached_languages().is_empty());

        assert!(registry.acquire(&eng).await.is_ok());
        assert_eq!(engine.created(), 1);
    }
}
