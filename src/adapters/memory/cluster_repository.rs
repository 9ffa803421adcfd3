use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ArtifactVariant, OptimizationCluster, VariantStatus};
use crate::domain::ports::ClusterRepository;

/// Cluster store held entirely in memory.
///
/// Archived variant records are kept in a separate table so their ids stay
/// resolvable after they leave the cluster.
#[derive(Default)]
pub struct InMemoryClusterRepository {
    clusters: RwLock<HashMap<String, OptimizationCluster>>,
    archived: RwLock<HashMap<String, ArtifactVariant>>,
}

impl InMemoryClusterRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn archived_count(&self) -> usize {
        self.archived.read().await.len()
    }
}

#[async_trait]
impl ClusterRepository for InMemoryClusterRepository {
    async fn get(&self, cluster_id: &str) -> DomainResult<Option<OptimizationCluster>> {
        Ok(self.clusters.read().await.get(cluster_id).cloned())
    }

    async fn save(&self, cluster: &OptimizationCluster) -> DomainResult<()> {
        self.clusters
            .write()
            .await
            .insert(cluster.cluster_id.clone(), cluster.clone());
        Ok(())
    }

    async fn list_ids(&self) -> DomainResult<Vec<String>> {
        let mut ids: Vec<String> = self.clusters.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn save_archived(&self, variants: &[ArtifactVariant]) -> DomainResult<()> {
        let mut archived = self.archived.write().await;
        for variant in variants {
            let mut record = variant.clone();
            record.status = VariantStatus::Archived;
            archived.insert(record.variant_id.clone(), record);
        }
        Ok(())
    }

    async fn commit(
        &self,
        cluster: &OptimizationCluster,
        archived: &[ArtifactVariant],
    ) -> DomainResult<()> {
        // Both tables are locked before either is written.
        let mut clusters = self.clusters.write().await;
        let mut records = self.archived.write().await;
        for variant in archived {
            let mut record = variant.clone();
            record.status = VariantStatus::Archived;
            records.insert(record.variant_id.clone(), record);
        }
        clusters.insert(cluster.cluster_id.clone(), cluster.clone());
        Ok(())
    }

    async fn get_variant(&self, variant_id: &str) -> DomainResult<Option<ArtifactVariant>> {
        let active = self
            .clusters
            .read()
            .await
            .values()
            .flat_map(OptimizationCluster::members)
            .find(|v| v.variant_id == variant_id)
            .cloned();
        if active.is_some() {
            return Ok(active);
        }
        Ok(self.archived.read().await.get(variant_id).cloned())
    }
}
