use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

use futures::future::try_join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{error, info, warn};

use crate::credentials::{mask, CredentialStore};
use crate::error::BatchError;
use crate::gemini::ImageBackend;
use crate::models::{ApparelType, ColorChoice, GeneratedImage, GenerationRequest, SourceImage};
use crate::prompt;

/// Turns one user action into a batch of independent generation requests,
/// runs them concurrently and returns all results or a single classified
/// failure.
pub struct BatchOrchestrator {
    backend: Arc<dyn ImageBackend>,
    credentials: Arc<dyn CredentialStore>,
}

/// Keeps the first occurrence of each key so output names stay unique.
fn dedupe_by<T: Copy, K: Eq + Hash>(items: &[T], key: impl Fn(&T) -> K) -> Vec<T> {
    let mut seen = HashSet::new();
    items.iter().copied().filter(|item| seen.insert(key(item))).collect()
}

pub fn color_variation_batch(
    image: &SourceImage,
    colors: &[ColorChoice],
) -> Vec<GenerationRequest> {
    dedupe_by(colors, |c| c.value)
        .iter()
        .map(|color| prompt::color_variation_request(image, color))
        .collect()
}

/// An empty selection yields a single auto-detect pair.
pub fn mockup_batch<R: Rng + ?Sized>(
    image: &SourceImage,
    apparel_types: &[ApparelType],
    rng: &mut R,
) -> Vec<GenerationRequest> {
    let selected: Vec<Option<ApparelType>> = if apparel_types.is_empty() {
        vec![None]
    } else {
        dedupe_by(apparel_types, |t| *t).into_iter().map(Some).collect()
    };
    selected
        .into_iter()
        .flat_map(|apparel_type| prompt::mockup_requests(image, apparel_type, &mut *rng))
        .collect()
}

impl BatchOrchestrator {
    pub fn new(backend: Arc<dyn ImageBackend>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self { backend, credentials }
    }

    /// One request per distinct color. Repeated colors collapse to their
    /// first occurrence, so a list with duplicates issues fewer calls than
    /// its length and every output name stays unique.
    pub async fn generate_color_variations(
        &self,
        image: SourceImage,
        colors: &[ColorChoice],
    ) -> Result<Vec<GeneratedImage>, BatchError> {
        if colors.is_empty() {
            return Err(BatchError::EmptySelection);
        }
        let credential = self.require_credential()?;
        let requests = color_variation_batch(&image, colors);
        info!("🎨 Generating {} color variations", requests.len());
        self.run_batch(credential, requests).await
    }

    pub async fn remake_mockups(
        &self,
        image: SourceImage,
        apparel_types: &[ApparelType],
    ) -> Result<Vec<GeneratedImage>, BatchError> {
        let credential = self.require_credential()?;
        let requests = {
            let mut rng = StdRng::from_entropy();
            mockup_batch(&image, apparel_types, &mut rng)
        };
        if apparel_types.is_empty() {
            info!("👕 Remaking mockups with auto-detected apparel type");
        } else {
            info!("👕 Remaking mockups for {:?}", apparel_types);
        }
        self.run_batch(credential, requests).await
    }

    fn require_credential(&self) -> Result<String, BatchError> {
        match self.credentials.get() {
            Some(credential) => Ok(credential),
            None => {
                warn!("🔒 No API key stored; generation refused");
                Err(BatchError::MissingCredential)
            }
        }
    }

    /// Every request runs in its own task. The first failure ends the wait;
    /// siblings still in flight finish in the background and are discarded.
    async fn run_batch(
        &self,
        credential: String,
        requests: Vec<GenerationRequest>,
    ) -> Result<Vec<GeneratedImage>, BatchError> {
        info!("🚀 Dispatching {} generation requests with key {}", requests.len(), mask(&credential));

        let handles: Vec<_> = requests
            .into_iter()
            .map(|request| {
                let backend = Arc::clone(&self.backend);
                let credential = credential.clone();
                tokio::spawn(async move {
                    let src = backend
                        .generate(&credential, &request.source_image, &request.prompt)
                        .await
                        .map_err(|e| {
                            error!("❌ '{}' failed: {}", request.output_name, e);
                            e.to_string()
                        })?;
                    info!("✅ '{}' generated", request.output_name);
                    Ok::<_, String>(GeneratedImage { src, name: request.output_name })
                })
            })
            .collect();

        let outcome = try_join_all(handles.into_iter().map(|handle| async move {
            match handle.await {
                Ok(Ok(image)) => Ok(image),
                Ok(Err(message)) => Err(BatchError::classify(message)),
                Err(join_error) => Err(BatchError::Internal(join_error.to_string())),
            }
        }))
        .await;

        match outcome {
            Ok(images) => {
                info!("📦 Batch complete with {} images", images.len());
                Ok(images)
            }
            Err(err) => {
                if let BatchError::CredentialInvalid(message) = &err {
                    warn!("🔑 API key rejected ({}); clearing stored key", message);
                    self.credentials.clear();
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentialStore;
    use crate::gemini::GeminiError;
    use crate::palette::find_color;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Barrier;

    #[derive(Clone)]
    struct Failure {
        when_prompt_contains: &'static str,
        message: &'static str,
    }

    /// Answers every prompt with a data URI derived from the call order.
    /// With `slow_ms` set, later calls finish first. With `barrier` set, no
    /// call returns until the whole batch is waiting on it.
    #[derive(Default)]
    struct FakeBackend {
        calls: AtomicUsize,
        completed: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        barrier: Option<Arc<Barrier>>,
        prompts: Mutex<Vec<String>>,
        credentials_seen: Mutex<Vec<String>>,
        failures: Vec<Failure>,
        slow_ms: u64,
    }

    impl FakeBackend {
        fn failing(failures: Vec<Failure>) -> Self {
            Self { failures, ..Self::default() }
        }
    }

    #[async_trait]
    impl ImageBackend for FakeBackend {
        async fn generate(
            &self,
            credential: &str,
            _image: &SourceImage,
            prompt: &str,
        ) -> Result<String, GeminiError> {
            let index = self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().push(prompt.to_string());

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if let Some(barrier) = &self.barrier {
                barrier.wait().await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if let Some(f) = self.failures.iter().find(|f| prompt.contains(f.when_prompt_contains)) {
                return Err(GeminiError::Other(f.message.to_string()));
            }
            if self.slow_ms > 0 {
                // earlier requests finish last
                tokio::time::sleep(Duration::from_millis(self.slow_ms * (10 - index.min(9)) as u64)).await;
            }
            self.credentials_seen.lock().push(credential.to_string());
            self.completed.fetch_add(1, Ordering::SeqCst);
            Ok(format!("data:image/png;base64,{index}"))
        }
    }

    #[derive(Default)]
    struct CountingStore {
        inner: MemoryCredentialStore,
        clears: AtomicUsize,
    }

    impl CredentialStore for CountingStore {
        fn get(&self) -> Option<String> {
            self.inner.get()
        }
        fn set(&self, credential: &str) {
            self.inner.set(credential)
        }
        fn clear(&self) {
            self.clears.fetch_add(1, Ordering::SeqCst);
            self.inner.clear()
        }
    }

    fn store_with_key() -> Arc<CountingStore> {
        let store = CountingStore::default();
        store.set("test-key");
        Arc::new(store)
    }

    fn image() -> SourceImage {
        SourceImage::new(b"design".to_vec(), "image/png")
    }

    fn colors(values: &[&str]) -> Vec<ColorChoice> {
        values.iter().map(|v| find_color(v).unwrap()).collect()
    }

    fn names(images: &[GeneratedImage]) -> Vec<&str> {
        images.iter().map(|i| i.name.as_str()).collect()
    }

    #[tokio::test]
    async fn color_variations_issue_one_call_per_color_in_order() {
        let backend = Arc::new(FakeBackend { slow_ms: 5, ..FakeBackend::default() });
        let orch = BatchOrchestrator::new(backend.clone(), store_with_key());

        let images = orch
            .generate_color_variations(image(), &colors(&["NAVY", "SAND", "ROYAL BLUE"]))
            .await
            .unwrap();

        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
        assert_eq!(names(&images), vec!["Navy.png", "Sand.png", "Royal Blue.png"]);
        assert!(images.iter().all(|i| i.src.starts_with("data:image/png;base64,")));
    }

    #[tokio::test]
    async fn color_requests_are_all_in_flight_together() {
        let batch = colors(&["BLACK", "WHITE", "NAVY", "MAROON"]);
        let backend = Arc::new(FakeBackend {
            barrier: Some(Arc::new(Barrier::new(batch.len()))),
            ..FakeBackend::default()
        });
        let orch = BatchOrchestrator::new(backend.clone(), store_with_key());

        // a sequential fan-out would park the first call on the barrier forever
        let images = tokio::time::timeout(Duration::from_secs(5), orch.generate_color_variations(image(), &batch))
            .await
            .expect("batch did not run its requests concurrently")
            .unwrap();

        assert_eq!(images.len(), batch.len());
        assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), batch.len());
    }

    #[tokio::test]
    async fn mockup_requests_are_all_in_flight_together() {
        let backend = Arc::new(FakeBackend {
            barrier: Some(Arc::new(Barrier::new(6))),
            ..FakeBackend::default()
        });
        let orch = BatchOrchestrator::new(backend.clone(), store_with_key());

        let images = tokio::time::timeout(Duration::from_secs(5), orch.remake_mockups(image(), &ApparelType::ALL))
            .await
            .expect("batch did not run its requests concurrently")
            .unwrap();

        assert_eq!(images.len(), 6);
        assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn empty_color_selection_is_rejected_without_calls() {
        let backend = Arc::new(FakeBackend::default());
        let orch = BatchOrchestrator::new(backend.clone(), store_with_key());
        let err = orch.generate_color_variations(image(), &[]).await.unwrap_err();
        assert_eq!(err, BatchError::EmptySelection);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn duplicate_colors_collapse_to_unique_names() {
        let backend = Arc::new(FakeBackend::default());
        let orch = BatchOrchestrator::new(backend.clone(), store_with_key());
        let images = orch
            .generate_color_variations(image(), &colors(&["RED", "red", "BLACK"]))
            .await
            .unwrap();
        assert_eq!(names(&images), vec!["Red.png", "Black.png"]);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn full_palette_produces_unique_file_names() {
        let backend = Arc::new(FakeBackend::default());
        let orch = BatchOrchestrator::new(backend, store_with_key());
        let images = orch.generate_color_variations(image(), crate::palette::palette()).await.unwrap();
        let unique: HashSet<_> = names(&images).into_iter().collect();
        assert_eq!(images.len(), 17);
        assert_eq!(unique.len(), 17);
    }

    #[tokio::test]
    async fn mockups_without_types_auto_detect() {
        let backend = Arc::new(FakeBackend::default());
        let orch = BatchOrchestrator::new(backend.clone(), store_with_key());
        let images = orch.remake_mockups(image(), &[]).await.unwrap();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
        assert_eq!(names(&images), vec!["model_mockup.png", "flatlay_mockup.png"]);
        assert!(backend.prompts.lock().iter().all(|p| p.contains("same type of apparel")));
    }

    #[tokio::test]
    async fn mockups_per_type_keep_model_before_flat_lay() {
        let backend = Arc::new(FakeBackend { slow_ms: 5, ..FakeBackend::default() });
        let orch = BatchOrchestrator::new(backend.clone(), store_with_key());
        let images = orch
            .remake_mockups(image(), &[ApparelType::TShirt, ApparelType::Hoodie])
            .await
            .unwrap();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 4);
        assert_eq!(
            names(&images),
            vec![
                "model_t-shirt_mockup.png",
                "flatlay_t-shirt_mockup.png",
                "model_hoodie_mockup.png",
                "flatlay_hoodie_mockup.png",
            ]
        );
    }

    #[test]
    fn mockup_batch_covers_every_type_once() {
        let mut rng = StdRng::seed_from_u64(9);
        let all = mockup_batch(&image(), &ApparelType::ALL, &mut rng);
        let unique: HashSet<_> = all.iter().map(|r| r.output_name.clone()).collect();
        assert_eq!(all.len(), 6);
        assert_eq!(unique.len(), 6);

        let dupes = mockup_batch(&image(), &[ApparelType::Sweater, ApparelType::Sweater], &mut rng);
        assert_eq!(dupes.len(), 2);
    }

    #[tokio::test]
    async fn missing_credential_short_circuits() {
        let backend = Arc::new(FakeBackend::default());
        let store = Arc::new(CountingStore::default());
        let orch = BatchOrchestrator::new(backend.clone(), store.clone());

        let err = orch.remake_mockups(image(), &[]).await.unwrap_err();
        assert_eq!(err, BatchError::MissingCredential);
        let err = orch.generate_color_variations(image(), &colors(&["RED"])).await.unwrap_err();
        assert_eq!(err, BatchError::MissingCredential);

        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.clears.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn api_key_rejection_clears_credential_once() {
        let backend = Arc::new(FakeBackend::failing(vec![
            Failure { when_prompt_contains: "'Red'", message: "API key not valid. Please pass a valid API key." },
            Failure { when_prompt_contains: "'Black'", message: "Gemini API error [400]: INVALID_ARGUMENT" },
        ]));
        let store = store_with_key();
        let orch = BatchOrchestrator::new(backend.clone(), store.clone());

        let err = orch
            .generate_color_variations(image(), &colors(&["RED", "BLACK", "WHITE"]))
            .await
            .unwrap_err();

        assert!(matches!(err, BatchError::CredentialInvalid(_)), "{err:?}");
        assert_eq!(store.clears.load(Ordering::SeqCst), 1);
        assert_eq!(store.get(), None);
    }

    #[tokio::test]
    async fn generic_failure_keeps_credential() {
        let backend = Arc::new(FakeBackend::failing(vec![Failure {
            when_prompt_contains: "flat-lay",
            message: "No image was generated.",
        }]));
        let store = store_with_key();
        let orch = BatchOrchestrator::new(backend, store.clone());

        let err = orch.remake_mockups(image(), &[ApparelType::Hoodie]).await.unwrap_err();

        assert_eq!(err, BatchError::Generation("No image was generated.".into()));
        assert_eq!(store.clears.load(Ordering::SeqCst), 0);
        assert_eq!(store.get().as_deref(), Some("test-key"));
    }

    #[tokio::test]
    async fn in_flight_requests_keep_their_credential_after_reset() {
        let backend = Arc::new(FakeBackend {
            failures: vec![Failure { when_prompt_contains: "'Orange'", message: "Gemini API error [400]: bad key" }],
            slow_ms: 2,
            ..FakeBackend::default()
        });
        let store = store_with_key();
        let orch = BatchOrchestrator::new(backend.clone(), store.clone());

        let err = orch
            .generate_color_variations(image(), &colors(&["NAVY", "SAND", "ORANGE"]))
            .await
            .unwrap_err();
        assert!(err.requires_reauthentication());
        assert_eq!(store.get(), None);

        // the two slow siblings are not cancelled by the failure
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(backend.completed.load(Ordering::SeqCst), 2);
        assert!(backend.credentials_seen.lock().iter().all(|c| c == "test-key"));
    }
}
