//! Adapter registry
//!
//! Maps each jurisdiction tier to its applicable adapter set. Within one tier
//! no two adapters may own the same field group. Tiers without adapters can
//! carry static, manually maintained profiles instead.

use crate::adapter::SourceAdapter;
use spendwatch_core::{
    ConfigError, FieldGroup, JurisdictionTier, Profile, ProfileKey, SourceKind,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock as TokioRwLock;

/// Registry of source adapters per tier and static profiles per key.
pub struct AdapterRegistry {
    adapters: TokioRwLock<HashMap<JurisdictionTier, Vec<Arc<dyn SourceAdapter>>>>,
    static_profiles: TokioRwLock<HashMap<ProfileKey, Profile>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: TokioRwLock::new(HashMap::new()),
            static_profiles: TokioRwLock::new(HashMap::new()),
        }
    }

    /// Register an adapter for a tier.
    ///
    /// # Errors
    ///
    /// Returns `IncompatibleOptions` if an adapter already registered for the
    /// tier owns one of the same field groups.
    pub async fn register(
        &self,
        tier: JurisdictionTier,
        adapter: Arc<dyn SourceAdapter>,
    ) -> Result<(), ConfigError> {
        let mut adapters = self.adapters.write().await;
        let existing = adapters.entry(tier).or_default();

        for registered in existing.iter() {
            if let Some(group) = adapter
                .owned_fields()
                .iter()
                .find(|g| registered.owned_fields().contains(g))
            {
                return Err(ConfigError::IncompatibleOptions {
                    option_a: format!("{}:{}", registered.source(), group),
                    option_b: format!("{}:{}", adapter.source(), group),
                });
            }
        }

        tracing::debug!(
            tier = %tier,
            source = %adapter.source(),
            groups = ?adapter.owned_fields(),
            "adapter registered"
        );
        existing.push(adapter);
        Ok(())
    }

    /// Adapters applicable to a tier, in registration order.
    pub async fn adapters_for(&self, tier: JurisdictionTier) -> Vec<Arc<dyn SourceAdapter>> {
        let adapters = self.adapters.read().await;
        adapters.get(&tier).cloned().unwrap_or_default()
    }

    /// Whether any adapter is registered for a tier.
    pub async fn has_adapters(&self, tier: JurisdictionTier) -> bool {
        let adapters = self.adapters.read().await;
        adapters.get(&tier).is_some_and(|a| !a.is_empty())
    }

    /// The source that owns `group` for `tier`, if any.
    pub async fn owner_of(&self, tier: JurisdictionTier, group: FieldGroup) -> Option<SourceKind> {
        let adapters = self.adapters.read().await;
        adapters
            .get(&tier)?
            .iter()
            .find(|a| a.owned_fields().contains(&group))
            .map(|a| a.source())
    }

    /// Register a manually maintained profile, replacing any previous one.
    pub async fn register_static_profile(&self, profile: Profile) {
        let mut profiles = self.static_profiles.write().await;
        profiles.insert(profile.key(), profile);
    }

    pub async fn static_profile(&self, key: &ProfileKey) -> Option<Profile> {
        let profiles = self.static_profiles.read().await;
        profiles.get(key).cloned()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::FetchParams;
    use async_trait::async_trait;
    use chrono::Utc;
    use spendwatch_core::{NormalizedRecord, SourceError, TrackedIdentity};

    struct TestAdapter {
        source: SourceKind,
        owned: Vec<FieldGroup>,
    }

    #[async_trait]
    impl SourceAdapter for TestAdapter {
        fn source(&self) -> SourceKind {
            self.source
        }

        fn owned_fields(&self) -> &[FieldGroup] {
            &self.owned
        }

        async fn fetch(
            &self,
            _identity: &TrackedIdentity,
            _params: &FetchParams,
        ) -> Result<Vec<NormalizedRecord>, SourceError> {
            Ok(Vec::new())
        }
    }

    fn adapter(source: SourceKind, owned: &[FieldGroup]) -> Arc<dyn SourceAdapter> {
        Arc::new(TestAdapter {
            source,
            owned: owned.to_vec(),
        })
    }

    #[tokio::test]
    async fn test_register_and_lookup_by_tier() {
        let registry = AdapterRegistry::new();
        registry
            .register(
                JurisdictionTier::FederalDeputy,
                adapter(SourceKind::Chamber, &[FieldGroup::Spending, FieldGroup::Staffing]),
            )
            .await
            .unwrap();
        registry
            .register(
                JurisdictionTier::FederalDeputy,
                adapter(SourceKind::Electoral, &[FieldGroup::Electoral]),
            )
            .await
            .unwrap();

        assert_eq!(registry.adapters_for(JurisdictionTier::FederalDeputy).await.len(), 2);
        assert!(registry.adapters_for(JurisdictionTier::Councillor).await.is_empty());
        assert!(!registry.has_adapters(JurisdictionTier::Councillor).await);
        assert_eq!(
            registry
                .owner_of(JurisdictionTier::FederalDeputy, FieldGroup::Electoral)
                .await,
            Some(SourceKind::Electoral)
        );
        assert_eq!(
            registry
                .owner_of(JurisdictionTier::FederalDeputy, FieldGroup::Transparency)
                .await,
            None
        );
    }

    #[tokio::test]
    async fn test_overlapping_groups_are_rejected() {
        let registry = AdapterRegistry::new();
        registry
            .register(
                JurisdictionTier::Senator,
                adapter(SourceKind::Senate, &[FieldGroup::Spending]),
            )
            .await
            .unwrap();

        let err = registry
            .register(
                JurisdictionTier::Senator,
                adapter(SourceKind::Upload, &[FieldGroup::Spending]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::IncompatibleOptions { .. }));
        assert_eq!(registry.adapters_for(JurisdictionTier::Senator).await.len(), 1);

        // Same group on a different tier is fine.
        registry
            .register(
                JurisdictionTier::StateDeputy,
                adapter(SourceKind::Upload, &[FieldGroup::Spending]),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_static_profiles() {
        let registry = AdapterRegistry::new();
        let identity = TrackedIdentity::new("vereador-12", "Carla", JurisdictionTier::Councillor);
        let mut profile = Profile::new(identity.clone(), Utc::now());
        profile.spend_ceiling = 18_000.0;

        registry.register_static_profile(profile.clone()).await;
        assert_eq!(registry.static_profile(&identity.key()).await, Some(profile));
        assert!(registry
            .static_profile(&ProfileKey::new(JurisdictionTier::Councillor, "other"))
            .await
            .is_none());
    }
}
