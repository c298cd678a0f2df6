//! Common test utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use ghost_operator::client::{GhostKubeClient, ObjectKey};
use ghost_operator::config::OperatorConfig;
use ghost_operator::controller::{ControllerContext, FixedClock, GhostController};
use ghost_operator::crd::{Ghost, GhostSpec, GhostStatus};
use ghost_operator::error::{OperatorError, OperatorResult};
use ghost_operator::events::EventPublisher;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ObjectReference, PersistentVolumeClaim, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::ObjectMeta;
use kube::runtime::events::EventType;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Cluster operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    GetGhost,
    UpdateStatus,
    GetPvc,
    CreatePvc,
    GetDeployment,
    CreateDeployment,
    ReplaceDeployment,
    GetService,
    CreateService,
    GetIngress,
    CreateIngress,
    DeleteIngress,
}

impl Op {
    fn is_write(self) -> bool {
        !matches!(
            self,
            Op::GetGhost | Op::GetPvc | Op::GetDeployment | Op::GetService | Op::GetIngress
        )
    }
}

type Store<K> = BTreeMap<ObjectKey, K>;

#[derive(Default)]
struct State {
    ghosts: Store<Ghost>,
    pvcs: Store<PersistentVolumeClaim>,
    deployments: Store<Deployment>,
    services: Store<Service>,
    ingresses: Store<Ingress>,
    failures: HashMap<Op, String>,
    calls: HashMap<Op, usize>,
    next_version: u64,
}

impl State {
    fn bump(&mut self, meta: &mut ObjectMeta) {
        self.next_version += 1;
        meta.resource_version = Some(self.next_version.to_string());
    }

    fn enter(&mut self, op: Op) -> OperatorResult<()> {
        *self.calls.entry(op).or_insert(0) += 1;
        match self.failures.get(&op) {
            Some(msg) => Err(OperatorError::ApiError(msg.clone())),
            None => Ok(()),
        }
    }
}

fn key_of(meta: &ObjectMeta) -> ObjectKey {
    ObjectKey::new(
        meta.namespace.clone().unwrap_or_default(),
        meta.name.clone().unwrap_or_default(),
    )
}

fn insert_new<K: Clone>(store: &mut Store<K>, key: ObjectKey, obj: K) -> OperatorResult<()> {
    if store.contains_key(&key) {
        return Err(OperatorError::ApiError(format!("{key} already exists")));
    }
    store.insert(key, obj);
    Ok(())
}

fn owned_by_live_ghost(meta: &ObjectMeta, uids: &HashSet<String>) -> bool {
    match &meta.owner_references {
        Some(refs) if !refs.is_empty() => refs.iter().any(|r| uids.contains(&r.uid)),
        _ => true,
    }
}

/// In-memory cluster implementing [`GhostKubeClient`].
///
/// Every write assigns a fresh `resourceVersion`. Status writes and
/// Deployment replaces are rejected when the caller's version is stale.
#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<State>,
}

impl FakeCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Store a Ghost, assigning a uid when it has none.
    pub fn apply_ghost(&self, mut ghost: Ghost) -> Ghost {
        let mut state = self.state.lock();
        let key = key_of(&ghost.metadata);
        if ghost.metadata.uid.is_none() {
            ghost.metadata.uid = Some(format!("uid-{}-{}", key.namespace, key.name));
        }
        if let Some(existing) = state.ghosts.get(&key) {
            ghost.status = existing.status.clone();
        }
        state.bump(&mut ghost.metadata);
        state.ghosts.insert(key, ghost.clone());
        ghost
    }

    /// Edit the spec of a stored Ghost.
    pub fn edit_ghost(&self, key: &ObjectKey, edit: impl FnOnce(&mut GhostSpec)) {
        let mut state = self.state.lock();
        let mut ghost = state.ghosts.get(key).cloned().expect("ghost exists");
        edit(&mut ghost.spec);
        state.bump(&mut ghost.metadata);
        state.ghosts.insert(key.clone(), ghost);
    }

    pub fn delete_ghost(&self, key: &ObjectKey) {
        self.state.lock().ghosts.remove(key);
    }

    /// Delete every child whose controlling owner no longer exists.
    pub fn garbage_collect(&self) {
        let mut state = self.state.lock();
        let uids: HashSet<String> = state
            .ghosts
            .values()
            .filter_map(|g| g.metadata.uid.clone())
            .collect();

        state.pvcs.retain(|_, o| owned_by_live_ghost(&o.metadata, &uids));
        state
            .deployments
            .retain(|_, o| owned_by_live_ghost(&o.metadata, &uids));
        state.services.retain(|_, o| owned_by_live_ghost(&o.metadata, &uids));
        state
            .ingresses
            .retain(|_, o| owned_by_live_ghost(&o.metadata, &uids));
    }

    pub fn fail(&self, op: Op, message: &str) {
        self.state.lock().failures.insert(op, message.to_string());
    }

    pub fn heal(&self, op: Op) {
        self.state.lock().failures.remove(&op);
    }

    /// Number of calls made for `op`, failed ones included.
    pub fn calls(&self, op: Op) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Number of write calls made so far.
    pub fn writes(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|(op, _)| op.is_write())
            .map(|(_, n)| n)
            .sum()
    }

    pub fn ghost(&self, key: &ObjectKey) -> Option<Ghost> {
        self.state.lock().ghosts.get(key).cloned()
    }

    pub fn status(&self, key: &ObjectKey) -> GhostStatus {
        self.ghost(key)
            .and_then(|g| g.status)
            .unwrap_or_default()
    }

    pub fn pvc(&self, namespace: &str, name: &str) -> Option<PersistentVolumeClaim> {
        self.state.lock().pvcs.get(&ObjectKey::new(namespace, name)).cloned()
    }

    pub fn deployment(&self, namespace: &str, name: &str) -> Option<Deployment> {
        self.state
            .lock()
            .deployments
            .get(&ObjectKey::new(namespace, name))
            .cloned()
    }

    pub fn service(&self, namespace: &str, name: &str) -> Option<Service> {
        self.state
            .lock()
            .services
            .get(&ObjectKey::new(namespace, name))
            .cloned()
    }

    pub fn ingress(&self, namespace: &str, name: &str) -> Option<Ingress> {
        self.state
            .lock()
            .ingresses
            .get(&ObjectKey::new(namespace, name))
            .cloned()
    }

    /// Total number of child objects across all kinds.
    pub fn child_count(&self) -> usize {
        let state = self.state.lock();
        state.pvcs.len() + state.deployments.len() + state.services.len() + state.ingresses.len()
    }
}

#[async_trait]
impl GhostKubeClient for FakeCluster {
    async fn get_ghost(&self, namespace: &str, name: &str) -> OperatorResult<Option<Ghost>> {
        let mut state = self.state.lock();
        state.enter(Op::GetGhost)?;
        Ok(state.ghosts.get(&ObjectKey::new(namespace, name)).cloned())
    }

    async fn update_ghost_status(
        &self,
        ghost: &Ghost,
        status: &GhostStatus,
    ) -> OperatorResult<()> {
        let mut state = self.state.lock();
        state.enter(Op::UpdateStatus)?;
        let key = key_of(&ghost.metadata);
        let mut stored = state
            .ghosts
            .get(&key)
            .cloned()
            .ok_or_else(|| OperatorError::ApiError(format!("{key} not found")))?;
        if stored.metadata.resource_version != ghost.metadata.resource_version {
            return Err(OperatorError::ApiError(format!(
                "conflict: {key} has been modified"
            )));
        }
        stored.status = Some(status.clone());
        state.bump(&mut stored.metadata);
        state.ghosts.insert(key, stored);
        Ok(())
    }

    async fn get_pvc(
        &self,
        namespace: &str,
        name: &str,
    ) -> OperatorResult<Option<PersistentVolumeClaim>> {
        let mut state = self.state.lock();
        state.enter(Op::GetPvc)?;
        Ok(state.pvcs.get(&ObjectKey::new(namespace, name)).cloned())
    }

    async fn create_pvc(&self, pvc: &PersistentVolumeClaim) -> OperatorResult<()> {
        let mut state = self.state.lock();
        state.enter(Op::CreatePvc)?;
        let mut pvc = pvc.clone();
        state.bump(&mut pvc.metadata);
        insert_new(&mut state.pvcs, key_of(&pvc.metadata), pvc)
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> OperatorResult<Option<Deployment>> {
        let mut state = self.state.lock();
        state.enter(Op::GetDeployment)?;
        Ok(state.deployments.get(&ObjectKey::new(namespace, name)).cloned())
    }

    async fn create_deployment(&self, deployment: &Deployment) -> OperatorResult<()> {
        let mut state = self.state.lock();
        state.enter(Op::CreateDeployment)?;
        let mut deployment = deployment.clone();
        state.bump(&mut deployment.metadata);
        insert_new(&mut state.deployments, key_of(&deployment.metadata), deployment)
    }

    async fn replace_deployment(&self, deployment: &Deployment) -> OperatorResult<()> {
        let mut state = self.state.lock();
        state.enter(Op::ReplaceDeployment)?;
        let key = key_of(&deployment.metadata);
        let live_version = state
            .deployments
            .get(&key)
            .map(|d| d.metadata.resource_version.clone())
            .ok_or_else(|| OperatorError::ApiError(format!("{key} not found")))?;
        if live_version != deployment.metadata.resource_version {
            return Err(OperatorError::ApiError(format!(
                "conflict: {key} has been modified"
            )));
        }
        let mut deployment = deployment.clone();
        state.bump(&mut deployment.metadata);
        state.deployments.insert(key, deployment);
        Ok(())
    }

    async fn get_service(&self, namespace: &str, name: &str) -> OperatorResult<Option<Service>> {
        let mut state = self.state.lock();
        state.enter(Op::GetService)?;
        Ok(state.services.get(&ObjectKey::new(namespace, name)).cloned())
    }

    async fn create_service(&self, service: &Service) -> OperatorResult<()> {
        let mut state = self.state.lock();
        state.enter(Op::CreateService)?;
        let mut service = service.clone();
        state.bump(&mut service.metadata);
        insert_new(&mut state.services, key_of(&service.metadata), service)
    }

    async fn get_ingress(&self, namespace: &str, name: &str) -> OperatorResult<Option<Ingress>> {
        let mut state = self.state.lock();
        state.enter(Op::GetIngress)?;
        Ok(state.ingresses.get(&ObjectKey::new(namespace, name)).cloned())
    }

    async fn create_ingress(&self, ingress: &Ingress) -> OperatorResult<()> {
        let mut state = self.state.lock();
        state.enter(Op::CreateIngress)?;
        let mut ingress = ingress.clone();
        state.bump(&mut ingress.metadata);
        insert_new(&mut state.ingresses, key_of(&ingress.metadata), ingress)
    }

    async fn delete_ingress(&self, namespace: &str, name: &str) -> OperatorResult<()> {
        let mut state = self.state.lock();
        state.enter(Op::DeleteIngress)?;
        let key = ObjectKey::new(namespace, name);
        state
            .ingresses
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| OperatorError::ApiError(format!("{key} not found")))
    }
}

/// Event publisher remembering the reason of every event.
#[derive(Default)]
pub struct RecordingEvents {
    reasons: Mutex<Vec<String>>,
}

impl RecordingEvents {
    pub fn reasons(&self) -> Vec<String> {
        self.reasons.lock().clone()
    }

    pub fn clear(&self) {
        self.reasons.lock().clear();
    }
}

#[async_trait]
impl EventPublisher for RecordingEvents {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        _type_: EventType,
        reason: &str,
        _action: &str,
        _note: Option<String>,
    ) {
        self.reasons.lock().push(reason.to_string());
    }
}

/// Reference instant for the test clock.
pub fn t0() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0)
        .single()
        .expect("valid timestamp")
}

pub fn ghost(namespace: &str, name: &str, image_tag: &str, replicas: i32, enable_ingress: bool) -> Ghost {
    let mut ghost = Ghost::new(
        name,
        GhostSpec {
            image_tag: image_tag.to_string(),
            replicas,
            enable_ingress,
        },
    );
    ghost.metadata.namespace = Some(namespace.to_string());
    ghost
}

/// A controller wired to a fake cluster, recorded events and a fixed clock.
pub struct Harness {
    pub cluster: Arc<FakeCluster>,
    pub events: Arc<RecordingEvents>,
    pub clock: Arc<FixedClock>,
    pub ctx: Arc<ControllerContext>,
    pub controller: GhostController,
}

impl Harness {
    pub fn new() -> Self {
        let config = OperatorConfig::builder()
            .resync_interval(Duration::from_secs(300))
            .backoff(Duration::from_secs(5), Duration::from_secs(300))
            .build()
            .expect("valid config");
        Self::with_config(config)
    }

    pub fn with_config(config: OperatorConfig) -> Self {
        let cluster = FakeCluster::new();
        let events = Arc::new(RecordingEvents::default());
        let clock = Arc::new(FixedClock::new(t0()));
        let ctx = Arc::new(ControllerContext::new(
            cluster.clone(),
            events.clone(),
            clock.clone(),
            config,
        ));
        let controller = GhostController::new(ctx.clone());
        Self {
            cluster,
            events,
            clock,
            ctx,
            controller,
        }
    }
}
