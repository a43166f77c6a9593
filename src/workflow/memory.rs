/// In-process workflow store using ArcSwap
///
/// Provides lock-free reads and atomic whole-map updates. Each write clones
/// the current map, applies the change and swaps the pointer with
/// read-copy-update, retrying when another writer got there first. Readers
/// never block and always see a consistent snapshot.

use crate::workflow::{
    storage::{workflow_key, WorkflowPage, WorkflowStore},
    types::Workflow,
};
use anyhow::Result;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc};

/// Lock-free workflow map
///
/// Created at process start, cleared explicitly (tests), dropped at exit.
/// Nothing is persisted.
#[derive(Debug)]
pub struct MemoryWorkflowStore {
    /// Key: workflow id, Value: stored definition
    workflows: ArcSwap<HashMap<String, Workflow>>,
}

impl MemoryWorkflowStore {
    pub fn new() -> Self {
        Self {
            workflows: ArcSwap::new(Arc::new(HashMap::new())),
        }
    }

    /// Apply `change` to a copy of the current map and swap it in
    ///
    /// `change` may run more than once under contention. Returns the snapshot
    /// the winning attempt was based on.
    fn update(&self, change: impl Fn(&mut HashMap<String, Workflow>)) -> Arc<HashMap<String, Workflow>> {
        self.workflows.rcu(|current| {
            let mut next = HashMap::clone(current);
            change(&mut next);
            next
        })
    }
}

impl Default for MemoryWorkflowStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkflowStore for MemoryWorkflowStore {
    async fn get(&self, id: &str) -> Result<Option<Workflow>> {
        Ok(self.workflows.load().get(id).cloned())
    }

    async fn put(&self, workflow: &Workflow) -> Result<()> {
        let id = workflow_key(workflow)?.to_string();
        self.update(|map| {
            map.insert(id.clone(), workflow.clone());
        });
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        if !self.workflows.load().contains_key(id) {
            return Ok(false);
        }
        let removed = self.update(|map| {
            map.remove(id);
        })
        .contains_key(id);
        if removed {
            tracing::debug!("Removed workflow from memory store: {}", id);
        }
        Ok(removed)
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<WorkflowPage> {
        let snapshot = self.workflows.load();
        let mut workflows: Vec<&Workflow> = snapshot.values().collect();
        workflows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        Ok(WorkflowPage {
            total: workflows.len(),
            workflows: workflows.into_iter().skip(offset).take(limit).cloned().collect(),
        })
    }

    async fn clear(&self) -> Result<()> {
        self.workflows.store(Arc::new(HashMap::new()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn workflow(id: &str, age_secs: i64) -> Workflow {
        Workflow {
            id: Some(id.to_string()),
            name: format!("Workflow {}", id),
            description: None,
            nodes: vec![],
            edges: vec![],
            created_at: Some(Utc::now() - Duration::seconds(age_secs)),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn crud_cycle() {
        let store = MemoryWorkflowStore::new();
        store.put(&workflow("a", 0)).await.unwrap();

        assert!(store.get("a").await.unwrap().is_some());
        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert!(store.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn snapshot_survives_later_writes() {
        let store = MemoryWorkflowStore::new();
        store.put(&workflow("a", 0)).await.unwrap();

        let snapshot = store.workflows.load_full();
        store.put(&workflow("b", 0)).await.unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.workflows.load().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_writes_are_not_lost() {
        let store = Arc::new(MemoryWorkflowStore::new());

        let writers: Vec<_> = (0..2000)
            .map(|n| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.put(&workflow(&format!("wf-{}", n), 0)).await })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap().unwrap();
        }
        assert_eq!(store.list(usize::MAX, 0).await.unwrap().total, 2000);

        let removers: Vec<_> = (0..1000)
            .map(|n| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.delete(&format!("wf-{}", n * 2)).await })
            })
            .collect();
        for remover in removers {
            assert!(remover.await.unwrap().unwrap());
        }
        assert_eq!(store.list(usize::MAX, 0).await.unwrap().total, 1000);
    }

    #[tokio::test]
    async fn list_pages_in_creation_order() {
        let store = MemoryWorkflowStore::new();
        store.put(&workflow("young", 1)).await.unwrap();
        store.put(&workflow("old", 50)).await.unwrap();
        store.put(&workflow("mid", 10)).await.unwrap();

        let page = store.list(1, 1).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.workflows[0].id.as_deref(), Some("mid"));

        store.clear().await.unwrap();
        assert_eq!(store.list(10, 0).await.unwrap().total, 0);
    }
}
