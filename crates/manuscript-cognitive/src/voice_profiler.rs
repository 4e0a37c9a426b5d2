//! Voice profiling service (`spec.md` §4.9 "Voice Profiler" — "Cached per
//! (document-fingerprint, entity, window)").
//!
//! Wraps `manuscript_core::voice::compute_profile` with an in-process LRU
//! cache and repository-backed persistence, so re-analyzing an unchanged
//! document never recomputes a profile it already has.

use lru::LruCache;
use manuscript_core::repository::VoiceProfileRepository;
use manuscript_core::voice::{compute_profile, VoiceProfile};
use manuscript_types::Result;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use uuid::Uuid;

const DEFAULT_CACHE_CAPACITY: usize = 256;

pub struct VoiceProfiler {
    cache: Mutex<LruCache<(String, Uuid), VoiceProfile>>,
}

impl VoiceProfiler {
    pub fn new() -> Self {
        Self { cache: Mutex::new(LruCache::new(NonZeroUsize::new(DEFAULT_CACHE_CAPACITY).expect("nonzero"))) }
    }

    /// Return the voice profile for `entity_id` at `document_fingerprint`,
    /// computing and persisting it only on a cache and repository miss.
    pub async fn profile_for<R: VoiceProfileRepository>(
        &self,
        repo: &R,
        entity_id: Uuid,
        document_fingerprint: &str,
        dialogue_lines: &[String],
    ) -> Result<VoiceProfile> {
        let cache_key = (document_fingerprint.to_string(), entity_id);

        if let Some(hit) = self.cache.lock().expect("voice profile cache lock poisoned").get(&cache_key).cloned() {
            return Ok(hit);
        }

        if let Some(stored) = repo.get_profile(entity_id).await? {
            if stored.document_fingerprint == document_fingerprint {
                self.cache.lock().expect("voice profile cache lock poisoned").put(cache_key, stored.clone());
                return Ok(stored);
            }
        }

        let profile = compute_profile(entity_id, document_fingerprint, dialogue_lines);
        repo.put_profile(profile.clone()).await?;
        self.cache.lock().expect("voice profile cache lock poisoned").put(cache_key, profile.clone());
        Ok(profile)
    }
}

impl Default for VoiceProfiler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    struct FakeVoiceRepo {
        stored: StdMutex<HashMap<Uuid, VoiceProfile>>,
        put_calls: StdMutex<u32>,
    }

    #[async_trait]
    #[allow(async_fn_in_trait)]
    impl VoiceProfileRepository for FakeVoiceRepo {
        async fn put_profile(&self, profile: VoiceProfile) -> Result<()> {
            *self.put_calls.lock().unwrap() += 1;
            self.stored.lock().unwrap().insert(profile.entity_id, profile);
            Ok(())
        }

        async fn get_profile(&self, entity_id: Uuid) -> Result<Option<VoiceProfile>> {
            Ok(self.stored.lock().unwrap().get(&entity_id).cloned())
        }
    }

    #[tokio::test]
    async fn repeated_lookup_for_same_fingerprint_does_not_recompute() {
        let repo = FakeVoiceRepo { stored: StdMutex::new(HashMap::new()), put_calls: StdMutex::new(0) };
        let profiler = VoiceProfiler::new();
        let entity_id = Uuid::new_v4();
        let lines = vec!["—Hola —dijo.".to_string()];

        profiler.profile_for(&repo, entity_id, "fp-1", &lines).await.unwrap();
        profiler.profile_for(&repo, entity_id, "fp-1", &lines).await.unwrap();

        assert_eq!(*repo.put_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn changed_fingerprint_triggers_recompute() {
        let repo = FakeVoiceRepo { stored: StdMutex::new(HashMap::new()), put_calls: StdMutex::new(0) };
        let profiler = VoiceProfiler::new();
        let entity_id = Uuid::new_v4();
        let lines = vec!["—Hola —dijo.".to_string()];

        profiler.profile_for(&repo, entity_id, "fp-1", &lines).await.unwrap();
        profiler.profile_for(&repo, entity_id, "fp-2", &lines).await.unwrap();

        assert_eq!(*repo.put_calls.lock().unwrap(), 2);
    }
}
