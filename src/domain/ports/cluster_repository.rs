//! Persistence port for clusters and variant records.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ArtifactVariant, OptimizationCluster};

/// Vector + metadata store holding the variant population.
#[async_trait]
pub trait ClusterRepository: Send + Sync {
    async fn get(&self, cluster_id: &str) -> DomainResult<Option<OptimizationCluster>>;

    /// Insert or replace a cluster record.
    async fn save(&self, cluster: &OptimizationCluster) -> DomainResult<()>;

    async fn list_ids(&self) -> DomainResult<Vec<String>>;

    /// Persist archived variant records so their ids stay resolvable.
    async fn save_archived(&self, variants: &[ArtifactVariant]) -> DomainResult<()>;

    /// Persist `cluster` together with the records it just archived.
    ///
    /// Either both writes land or neither does; a failed commit leaves the
    /// previously stored cluster and archive untouched.
    async fn commit(
        &self,
        cluster: &OptimizationCluster,
        archived: &[ArtifactVariant],
    ) -> DomainResult<()>;

    /// Look up any variant record, active or archived.
    async fn get_variant(&self, variant_id: &str) -> DomainResult<Option<ArtifactVariant>>;
}
