use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use super::TextRegion;
use crate::error::ProcessError;

/// An image-to-text engine bound to one language set.
///
/// Engines hold native handles and are confined to the thread that
/// created them, so this trait has no `Send` bound.
pub trait RecognitionEngine {
    /// Recognizes text regions in an encoded image (PNG, JPEG, ...).
    fn recognize(&mut self, image: &[u8]) -> Result<Vec<TextRegion>, ProcessError>;
}

/// Builds engines for a normalized language key such as `deu+eng`.
pub trait EngineFactory: Send + Sync {
    fn create(&self, languages: &str) -> Result<Box<dyn RecognitionEngine>, ProcessError>;
}

/// Normalizes a language set into a cache key.
///
/// Codes are trimmed, sorted and deduplicated, then joined with `+`.
/// An empty set means English.
pub fn language_key(languages: &[String]) -> String {
    let mut codes: Vec<&str> = languages
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();
    codes.sort_unstable();
    codes.dedup();

    if codes.is_empty() {
        "eng".to_string()
    } else {
        codes.join("+")
    }
}

/// Engines keyed by language set, constructed on first use.
pub struct EngineCache {
    factory: Arc<dyn EngineFactory>,
    engines: HashMap<String, Box<dyn RecognitionEngine>>,
}

impl EngineCache {
    pub fn new(factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            factory,
            engines: HashMap::new(),
        }
    }

    /// Returns the cached engine for `languages`, creating it if needed.
    pub fn engine_for(
        &mut self,
        languages: &[String],
    ) -> Result<&mut Box<dyn RecognitionEngine>, ProcessError> {
        match self.engines.entry(language_key(languages)) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                debug!("Creating recognition engine for '{}'", entry.key());
                let engine = self.factory.create(entry.key())?;
                Ok(entry.insert(engine))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullEngine;

    impl RecognitionEngine for NullEngine {
        fn recognize(&mut self, _image: &[u8]) -> Result<Vec<TextRegion>, ProcessError> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        created: AtomicUsize,
    }

    impl EngineFactory for CountingFactory {
        fn create(&self, languages: &str) -> Result<Box<dyn RecognitionEngine>, ProcessError> {
            if languages == "xx" {
                return Err(ProcessError::OcrFailed("no traineddata for xx".to_string()));
            }
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(NullEngine))
        }
    }

    fn langs(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_language_key_is_order_insensitive() {
        assert_eq!(language_key(&langs(&["eng", "deu"])), "deu+eng");
        assert_eq!(language_key(&langs(&["deu", "eng", "deu"])), "deu+eng");
        assert_eq!(language_key(&langs(&["fra"])), "fra");
    }

    #[test]
    fn test_language_key_defaults_to_english() {
        assert_eq!(language_key(&[]), "eng");
        assert_eq!(language_key(&langs(&["", "  "])), "eng");
    }

    #[test]
    fn test_cache_reuses_engine_per_language_set() {
        let factory = Arc::new(CountingFactory::default());
        let mut cache = EngineCache::new(factory.clone());

        cache.engine_for(&langs(&["eng", "deu"])).unwrap();
        cache.engine_for(&langs(&["deu", "eng"])).unwrap();
        cache.engine_for(&langs(&["eng"])).unwrap();

        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_failed_construction_is_not_cached() {
        let factory = Arc::new(CountingFactory::default());
        let mut cache = EngineCache::new(factory);

        assert!(cache.engine_for(&langs(&["xx"])).is_err());
        assert!(cache.is_empty());
    }
}
