//! Campaign message localization with an in-process translation cache.

use std::sync::Arc;

use async_trait::async_trait;
use campaign_core::config::LocalizationConfig;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::ServiceError;
use crate::llm::LanguageModel;
use crate::openai::ChatRequest;

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target_locale: &str, region: &str) -> Result<String, ServiceError>;
}

/// Marketing translation through a chat model.
pub struct LlmTranslator {
    llm: Arc<dyn LanguageModel>,
}

impl LlmTranslator {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate(&self, text: &str, target_locale: &str, region: &str) -> Result<String, ServiceError> {
        let system = format!(
            "You are a professional marketing translator. Translate the following campaign message to \
             {target_locale} for the {region} market. Maintain brand tone and marketing impact. \
             Keep it concise and impactful. Reply with the translation only."
        );
        let translated = self
            .llm
            .chat(ChatRequest {
                system: &system,
                user: text,
                temperature: 0.3,
                max_tokens: Some(200),
                json_mode: false,
            })
            .await?;
        if translated.is_empty() {
            return Err(ServiceError::Malformed("empty translation".to_string()));
        }
        Ok(translated)
    }
}

pub struct Localizer {
    translator: Option<Arc<dyn Translator>>,
    enabled: bool,
    default_locale: String,
    cache: DashMap<(String, String), String>,
    /// Serializes concurrent misses on one (message, locale) pair.
    in_flight: DashMap<(String, String), Arc<Mutex<()>>>,
}

impl Localizer {
    pub fn new(config: &LocalizationConfig, translator: Option<Arc<dyn Translator>>) -> Self {
        Self {
            translator,
            enabled: config.enabled,
            default_locale: config.default_locale.clone(),
            cache: DashMap::new(),
            in_flight: DashMap::new(),
        }
    }

    /// Message for `locale`. The default locale, a disabled localizer, or a
    /// failed translation all yield the original message.
    pub async fn localize(&self, message: &str, locale: &str, region: &str) -> String {
        if !self.enabled || locale == self.default_locale {
            return message.to_string();
        }
        let Some(translator) = &self.translator else {
            return message.to_string();
        };

        let key = (message.to_string(), locale.to_string());
        if let Some(hit) = self.cache.get(&key) {
            return hit.value().clone();
        }

        let lock = Arc::clone(self.in_flight.entry(key.clone()).or_default().value());
        let translated = {
            let _guard = lock.lock().await;
            let cached = self.cache.get(&key).map(|hit| hit.value().clone());
            match cached {
                Some(hit) => hit,
                None => self.translate_uncached(translator.as_ref(), key.clone(), region).await,
            }
        };
        drop(lock);
        self.in_flight.remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
        translated
    }

    async fn translate_uncached(&self, translator: &dyn Translator, key: (String, String), region: &str) -> String {
        let (message, locale) = (key.0.as_str(), key.1.as_str());
        match translator.translate(message, locale, region).await {
            Ok(translated) => {
                debug!(locale, "message translated");
                metrics::counter!("localizer.translations").increment(1);
                self.cache.insert(key.clone(), translated.clone());
                translated
            }
            Err(e) => {
                warn!(locale, error = %e, "translation failed, using original message");
                metrics::counter!("localizer.fallbacks").increment(1);
                message.to_string()
            }
        }
    }

    pub fn cached_translations(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Prefixing {
        calls: AtomicUsize,
        fail: bool,
        delay: Option<std::time::Duration>,
    }

    #[async_trait]
    impl Translator for Prefixing {
        async fn translate(&self, text: &str, target_locale: &str, _region: &str) -> Result<String, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(ServiceError::Transport("offline".to_string()));
            }
            Ok(format!("[{target_locale}] {text}"))
        }
    }

    fn localizer(translator: Arc<Prefixing>) -> Localizer {
        Localizer::new(&LocalizationConfig::default(), Some(translator))
    }

    #[tokio::test]
    async fn test_default_locale_passes_through() {
        let translator = Arc::new(Prefixing::default());
        let l = localizer(Arc::clone(&translator));
        assert_eq!(l.localize("Hello there", "en", "US").await, "Hello there");
        assert_eq!(translator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_translations_are_cached() {
        let translator = Arc::new(Prefixing::default());
        let l = localizer(Arc::clone(&translator));
        assert_eq!(l.localize("Hello there", "fr", "EU").await, "[fr] Hello there");
        assert_eq!(l.localize("Hello there", "fr", "EU").await, "[fr] Hello there");
        assert_eq!(translator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(l.cached_translations(), 1);
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_original() {
        let translator = Arc::new(Prefixing {
            fail: true,
            ..Prefixing::default()
        });
        let l = localizer(Arc::clone(&translator));
        assert_eq!(l.localize("Hello there", "de", "EU").await, "Hello there");
        assert_eq!(l.cached_translations(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_callers_translate_once() {
        let translator = Arc::new(Prefixing {
            delay: Some(std::time::Duration::from_millis(50)),
            ..Prefixing::default()
        });
        let l = Arc::new(localizer(Arc::clone(&translator)));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let l = Arc::clone(&l);
                tokio::spawn(async move { l.localize("Hello there", "fr", "EU").await })
            })
            .collect();
        for h in handles {
            assert_eq!(h.await.unwrap(), "[fr] Hello there");
        }
        assert_eq!(translator.calls.load(Ordering::SeqCst), 1);
        assert!(l.in_flight.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_localizer_skips_translation() {
        let config = LocalizationConfig {
            enabled: false,
            ..LocalizationConfig::default()
        };
        let translator = Arc::new(Prefixing::default());
        let l = Localizer::new(&config, Some(translator.clone()));
        assert_eq!(l.localize("Hello there", "fr", "EU").await, "Hello there");
        assert_eq!(translator.calls.load(Ordering::SeqCst), 0);
    }
}
