//! System registry and per-system workers.
//!
//! Every system is owned by one worker task. All operations on a system,
//! reads included, go through its request queue and are handled in arrival
//! order, so a reindex and a registration can never interleave and a snapshot
//! never shows a half-applied pass.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use warehouse_core::{ConnectionId, DomainError, DomainResult, LocationId, SystemName};
use warehouse_inventory::{InventoryEntry, Recipe, RestockCandidate, StorageSystem};

use crate::controller::{BindError, ChannelConfig, ChannelDriver, CommandChannel, ControllerTransport};
use crate::reconciler::{ReindexReport, TopologyReconciler};
use crate::store::{StoreError, SystemStore};

const WORKER_QUEUE_DEPTH: usize = 32;

/// Names that collide with top-level HTTP routes and so cannot name a system.
pub const RESERVED_SYSTEM_NAMES: &[&str] = &["check", "systems", "ws"];

/// Run a store operation on the blocking pool; file saves fsync.
async fn on_store<T, F>(store: &Arc<dyn SystemStore>, op: F) -> Result<T, StoreError>
where
    F: FnOnce(&dyn SystemStore) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let store = store.clone();
    tokio::task::spawn_blocking(move || op(&*store)).await?
}

/// Binding state for one system's controller.
#[derive(Debug, Clone, Default)]
struct ControllerSlot {
    inner: Arc<Mutex<Option<CommandChannel>>>,
}

impl ControllerSlot {
    /// The bound channel, if its driver is still running.
    fn current(&self) -> Option<CommandChannel> {
        let guard = self.inner.lock().ok()?;
        guard.as_ref().filter(|c| !c.is_closed()).cloned()
    }

    /// Compare-and-set: open and install a channel only if nothing live is
    /// bound. On refusal `transport` is handed back untouched.
    fn try_bind<F>(
        &self,
        transport: ControllerTransport,
        open: F,
    ) -> Result<(CommandChannel, ChannelDriver), ControllerTransport>
    where
        F: FnOnce(ControllerTransport) -> (CommandChannel, ChannelDriver),
    {
        let Ok(mut guard) = self.inner.lock() else {
            return Err(transport);
        };
        if guard.as_ref().is_some_and(|c| !c.is_closed()) {
            return Err(transport);
        }
        let (channel, driver) = open(transport);
        *guard = Some(channel.clone());
        Ok((channel, driver))
    }

    /// Clear the binding, unless a newer connection has replaced it already.
    fn release(&self, connection_id: ConnectionId) {
        if let Ok(mut guard) = self.inner.lock() {
            if guard.as_ref().is_some_and(|c| c.connection_id() == connection_id) {
                *guard = None;
            }
        }
    }
}

enum SystemRequest {
    RegisterStorage {
        id: LocationId,
        reply: oneshot::Sender<DomainResult<()>>,
    },
    RegisterProcessor {
        process: String,
        input_id: LocationId,
        output_id: LocationId,
        reply: oneshot::Sender<DomainResult<()>>,
    },
    RegisterTerminal {
        name: String,
        id: LocationId,
        reply: oneshot::Sender<DomainResult<()>>,
    },
    RegisterRecipe {
        recipe: Recipe,
        reply: oneshot::Sender<DomainResult<()>>,
    },
    RemoveRecipe {
        index: usize,
        reply: oneshot::Sender<DomainResult<Recipe>>,
    },
    Reindex {
        reply: oneshot::Sender<DomainResult<ReindexReport>>,
    },
    Snapshot {
        reply: oneshot::Sender<StorageSystem>,
    },
}

struct SystemWorker {
    system: StorageSystem,
    controller: ControllerSlot,
    store: Arc<dyn SystemStore>,
    requests: mpsc::Receiver<SystemRequest>,
}

impl SystemWorker {
    async fn run(mut self) {
        while let Some(request) = self.requests.recv().await {
            self.handle(request).await;
        }
        info!(system = %self.system.name(), "system worker stopped");
    }

    async fn handle(&mut self, request: SystemRequest) {
        match request {
            SystemRequest::RegisterStorage { id, reply } => {
                let result = match self.controller() {
                    Ok(channel) => {
                        TopologyReconciler::new(&mut self.system, &channel)
                            .register_storage(id)
                            .await
                    }
                    Err(e) => Err(e),
                };
                self.persist_if_ok(&result).await;
                let _ = reply.send(result);
            }
            SystemRequest::RegisterProcessor {
                process,
                input_id,
                output_id,
                reply,
            } => {
                let result = match self.controller() {
                    Ok(channel) => {
                        TopologyReconciler::new(&mut self.system, &channel)
                            .register_processor(process, input_id, output_id)
                            .await
                    }
                    Err(e) => Err(e),
                };
                self.persist_if_ok(&result).await;
                let _ = reply.send(result);
            }
            SystemRequest::RegisterTerminal { name, id, reply } => {
                let result = match self.controller() {
                    Ok(channel) => {
                        TopologyReconciler::new(&mut self.system, &channel)
                            .register_terminal(name, id)
                            .await
                    }
                    Err(e) => Err(e),
                };
                self.persist_if_ok(&result).await;
                let _ = reply.send(result);
            }
            SystemRequest::RegisterRecipe { recipe, reply } => {
                info!(system = %self.system.name(), process = recipe.process(), "registered recipe");
                self.system.add_recipe(recipe);
                self.persist().await;
                let _ = reply.send(Ok(()));
            }
            SystemRequest::RemoveRecipe { index, reply } => {
                let result = self.system.remove_recipe(index);
                self.persist_if_ok(&result).await;
                let _ = reply.send(result);
            }
            SystemRequest::Reindex { reply } => {
                let result = match self.controller() {
                    Ok(channel) => TopologyReconciler::new(&mut self.system, &channel).reindex().await,
                    Err(e) => Err(e),
                };
                // An aborted pass may still have pruned entries.
                if !matches!(result, Err(DomainError::PreconditionFailed(_))) {
                    self.persist().await;
                }
                let _ = reply.send(result);
            }
            SystemRequest::Snapshot { reply } => {
                let _ = reply.send(self.system.clone());
            }
        }
    }

    fn controller(&self) -> DomainResult<CommandChannel> {
        self.controller.current().ok_or_else(|| {
            DomainError::precondition(format!(
                "system {} has no controller connected",
                self.system.name()
            ))
        })
    }

    async fn persist_if_ok<T>(&self, result: &DomainResult<T>) {
        if result.is_ok() {
            self.persist().await;
        }
    }

    /// The in-memory model stays authoritative if the write fails; the next
    /// successful save or the shutdown flush catches the file up.
    async fn persist(&self) {
        let system = self.system.clone();
        if let Err(err) = on_store(&self.store, move |store| store.save(&system)).await {
            error!(system = %self.system.name(), error = %err, "failed to persist system");
        }
    }
}

/// Address of one system's worker.
#[derive(Debug, Clone)]
pub struct SystemHandle {
    name: SystemName,
    requests: mpsc::Sender<SystemRequest>,
    controller: ControllerSlot,
}

impl SystemHandle {
    fn spawn(system: StorageSystem, store: Arc<dyn SystemStore>) -> Self {
        let (tx, rx) = mpsc::channel(WORKER_QUEUE_DEPTH);
        let controller = ControllerSlot::default();
        let handle = SystemHandle {
            name: system.name().clone(),
            requests: tx,
            controller: controller.clone(),
        };
        let worker = SystemWorker {
            system,
            controller,
            store,
            requests: rx,
        };
        tokio::spawn(worker.run());
        handle
    }

    pub fn name(&self) -> &SystemName {
        &self.name
    }

    pub fn has_controller(&self) -> bool {
        self.controller.current().is_some()
    }

    async fn call<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> SystemRequest) -> DomainResult<T> {
        let (tx, rx) = oneshot::channel();
        let stopped =
            || DomainError::precondition(format!("system {} is shutting down", self.name));
        self.requests.send(build(tx)).await.map_err(|_| stopped())?;
        rx.await.map_err(|_| stopped())
    }

    pub async fn register_storage(&self, id: LocationId) -> DomainResult<()> {
        self.call(|reply| SystemRequest::RegisterStorage { id, reply })
            .await?
    }

    pub async fn register_processor(
        &self,
        process: String,
        input_id: LocationId,
        output_id: LocationId,
    ) -> DomainResult<()> {
        self.call(|reply| SystemRequest::RegisterProcessor {
            process,
            input_id,
            output_id,
            reply,
        })
        .await?
    }

    pub async fn register_terminal(&self, name: String, id: LocationId) -> DomainResult<()> {
        self.call(|reply| SystemRequest::RegisterTerminal { name, id, reply })
            .await?
    }

    pub async fn register_recipe(&self, recipe: Recipe) -> DomainResult<()> {
        self.call(|reply| SystemRequest::RegisterRecipe { recipe, reply })
            .await?
    }

    pub async fn remove_recipe(&self, index: usize) -> DomainResult<Recipe> {
        self.call(|reply| SystemRequest::RemoveRecipe { index, reply })
            .await?
    }

    pub async fn reindex(&self) -> DomainResult<ReindexReport> {
        self.call(|reply| SystemRequest::Reindex { reply }).await?
    }

    pub async fn snapshot(&self) -> DomainResult<StorageSystem> {
        self.call(|reply| SystemRequest::Snapshot { reply }).await
    }

    pub async fn inventory(&self) -> DomainResult<Vec<InventoryEntry>> {
        Ok(self.snapshot().await?.inventory())
    }

    /// Recipes that currently need restocking. Nothing is executed.
    pub async fn restock_plan(&self) -> DomainResult<Vec<RestockCandidate>> {
        Ok(self.snapshot().await?.eligible_recipes())
    }
}

struct RegistryInner {
    systems: RwLock<BTreeMap<SystemName, SystemHandle>>,
    store: Arc<dyn SystemStore>,
    channel: ChannelConfig,
}

/// All known systems, keyed by name.
#[derive(Clone)]
pub struct SystemRegistry {
    inner: Arc<RegistryInner>,
}

impl std::fmt::Debug for SystemRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemRegistry")
            .field("systems", &self.names())
            .field("channel", &self.inner.channel)
            .finish()
    }
}

impl SystemRegistry {
    /// Load every persisted system and start its worker. Must run inside a
    /// tokio runtime.
    pub fn start(store: Arc<dyn SystemStore>, channel: ChannelConfig) -> Result<Self, StoreError> {
        let mut systems = BTreeMap::new();
        for system in store.load_all()? {
            info!(system = %system.name(), "starting system worker");
            let handle = SystemHandle::spawn(system, store.clone());
            systems.insert(handle.name().clone(), handle);
        }
        Ok(Self {
            inner: Arc::new(RegistryInner {
                systems: RwLock::new(systems),
                store,
                channel,
            }),
        })
    }

    /// Create and persist an empty system.
    ///
    /// The handle is registered before the save so the registry lock is never
    /// held across I/O. If the save fails the system is dropped again.
    pub async fn create_system(&self, name: SystemName) -> DomainResult<SystemHandle> {
        if RESERVED_SYSTEM_NAMES.contains(&name.as_str()) {
            return Err(DomainError::malformed(format!(
                "system name {name} is reserved"
            )));
        }
        let system = StorageSystem::new(name.clone());
        let handle = {
            let mut systems = self
                .inner
                .systems
                .write()
                .map_err(|_| DomainError::persistence("system registry lock poisoned"))?;
            if systems.contains_key(&name) {
                return Err(DomainError::conflict(format!("system {name} already exists")));
            }
            let handle = SystemHandle::spawn(system.clone(), self.inner.store.clone());
            systems.insert(name.clone(), handle.clone());
            handle
        };

        if let Err(err) = on_store(&self.inner.store, move |store| store.save(&system)).await {
            if let Ok(mut systems) = self.inner.systems.write() {
                systems.remove(&name);
            }
            return Err(err.into());
        }
        info!(system = %name, "created system");
        Ok(handle)
    }

    pub fn get(&self, name: &SystemName) -> DomainResult<SystemHandle> {
        self.inner
            .systems
            .read()
            .ok()
            .and_then(|systems| systems.get(name).cloned())
            .ok_or_else(|| DomainError::not_found(format!("system {name}")))
    }

    /// Like [`get`](Self::get) for an unvalidated name.
    pub fn lookup(&self, name: &str) -> DomainResult<SystemHandle> {
        let parsed = SystemName::new(name)
            .map_err(|_| DomainError::not_found(format!("system {name}")))?;
        self.get(&parsed)
    }

    pub fn names(&self) -> Vec<SystemName> {
        self.inner
            .systems
            .read()
            .map(|systems| systems.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Bind a freshly connected controller to the system named by its first
    /// frame.
    ///
    /// On refusal the transport is closed with 4001 (unknown system) or 4002
    /// (already bound); an existing binding is left untouched. On success the
    /// channel driver is spawned and releases the binding when it stops.
    pub async fn bind_controller(
        &self,
        first_frame: &str,
        transport: ControllerTransport,
    ) -> Result<ConnectionId, BindError> {
        let requested = first_frame.trim();
        let handle = match self.lookup(requested) {
            Ok(handle) => handle,
            Err(_) => {
                let err = BindError::UnknownSystem(requested.to_string());
                warn!(system = requested, "controller named an unknown system");
                transport.reject(&err).await;
                return Err(err);
            }
        };

        let channel_config = &self.inner.channel;
        let bound = handle.controller.try_bind(transport, |transport| {
            CommandChannel::open(handle.name.clone(), transport, channel_config)
        });

        match bound {
            Ok((channel, driver)) => {
                let connection_id = channel.connection_id();
                let slot = handle.controller.clone();
                tokio::spawn(async move {
                    driver.run().await;
                    slot.release(connection_id);
                });
                Ok(connection_id)
            }
            Err(transport) => {
                let err = BindError::AlreadyBound(handle.name.clone());
                warn!(system = %handle.name, "second controller refused");
                transport.reject(&err).await;
                Err(err)
            }
        }
    }

    /// Write every system's current state to the store.
    pub async fn flush(&self) -> DomainResult<()> {
        let handles: Vec<SystemHandle> = self
            .inner
            .systems
            .read()
            .map(|systems| systems.values().cloned().collect())
            .unwrap_or_default();
        for handle in handles {
            let system = handle.snapshot().await?;
            on_store(&self.inner.store, move |store| store.save(&system)).await?;
        }
        on_store(&self.inner.store, |store| store.flush()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Condvar;
    use std::time::Duration;

    use super::*;
    use crate::controller::{OutboundFrame, CLOSE_ALREADY_BOUND, CLOSE_UNKNOWN_SYSTEM};
    use crate::store::InMemorySystemStore;
    use crate::testing::{redstone_reply, serve, FakeController};
    use warehouse_inventory::{RecipeItemSpecification, RecipeOutputSpecification};

    fn id(s: &str) -> LocationId {
        LocationId::new(s).unwrap()
    }

    fn name(s: &str) -> SystemName {
        SystemName::new(s).unwrap()
    }

    fn registry() -> (SystemRegistry, Arc<InMemorySystemStore>) {
        let store = Arc::new(InMemorySystemStore::new());
        let registry = SystemRegistry::start(store.clone(), ChannelConfig::default()).unwrap();
        (registry, store)
    }

    fn recipe() -> Recipe {
        Recipe::new(
            "smelt",
            vec![RecipeItemSpecification::new("minecraft:iron_ore", 1).unwrap()],
            vec![RecipeOutputSpecification::new(
                RecipeItemSpecification::new("minecraft:redstone", 1).unwrap(),
                16,
                64,
            )
            .unwrap()],
        )
        .unwrap()
    }

    /// A store whose saves of one system block until the gate opens.
    struct GatedStore {
        inner: InMemorySystemStore,
        gated: SystemName,
        entered: AtomicBool,
        open: Mutex<bool>,
        opened: Condvar,
    }

    impl GatedStore {
        fn new(gated: &str, systems: Vec<StorageSystem>) -> Arc<Self> {
            Arc::new(Self {
                inner: InMemorySystemStore::with_systems(systems),
                gated: name(gated),
                entered: AtomicBool::new(false),
                open: Mutex::new(false),
                opened: Condvar::new(),
            })
        }

        async fn wait_entered(&self) {
            for _ in 0..200 {
                if self.entered.load(Ordering::SeqCst) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            panic!("gated save never started");
        }

        fn release(&self) {
            *self.open.lock().unwrap() = true;
            self.opened.notify_all();
        }
    }

    impl SystemStore for GatedStore {
        fn load_all(&self) -> Result<Vec<StorageSystem>, StoreError> {
            self.inner.load_all()
        }

        fn save(&self, system: &StorageSystem) -> Result<(), StoreError> {
            if system.name() == &self.gated {
                self.entered.store(true, Ordering::SeqCst);
                let mut open = self.open.lock().unwrap();
                while !*open {
                    open = self.opened.wait(open).unwrap();
                }
            }
            self.inner.save(system)
        }

        fn flush(&self) -> Result<(), StoreError> {
            self.inner.flush()
        }
    }

    /// Wait for a driver to notice its transport closed and release the slot.
    async fn wait_unbound(handle: &SystemHandle) {
        for _ in 0..100 {
            if !handle.has_controller() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("controller never released");
    }

    #[tokio::test]
    async fn create_and_lookup_systems() {
        let (registry, store) = registry();
        registry.create_system(name("main")).await.unwrap();
        registry.create_system(name("annex")).await.unwrap();

        assert!(matches!(
            registry.create_system(name("main")).await,
            Err(DomainError::Conflict(_))
        ));
        assert_eq!(registry.names(), vec![name("annex"), name("main")]);
        assert!(registry.get(&name("main")).is_ok());
        assert!(matches!(registry.lookup("nope"), Err(DomainError::NotFound(_))));
        assert!(matches!(registry.lookup("bad name!"), Err(DomainError::NotFound(_))));
        assert_eq!(store.load_all().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn restarts_from_persisted_systems() {
        let store = Arc::new(InMemorySystemStore::with_systems([StorageSystem::new(name("main"))]));
        let registry = SystemRegistry::start(store, ChannelConfig::default()).unwrap();
        let snapshot = registry.get(&name("main")).unwrap().snapshot().await.unwrap();
        assert_eq!(snapshot.name(), &name("main"));
    }

    #[tokio::test]
    async fn controller_operations_need_a_binding() {
        let (registry, _) = registry();
        let handle = registry.create_system(name("main")).await.unwrap();

        assert!(matches!(
            handle.register_storage(id("chest_0")).await,
            Err(DomainError::PreconditionFailed(_))
        ));
        assert!(matches!(
            handle
                .register_processor("smelt".into(), id("a"), id("b"))
                .await,
            Err(DomainError::PreconditionFailed(_))
        ));
        assert!(matches!(
            handle.register_terminal("desk".into(), id("t")).await,
            Err(DomainError::PreconditionFailed(_))
        ));
        assert!(matches!(
            handle.reindex().await,
            Err(DomainError::PreconditionFailed(_))
        ));
    }

    #[tokio::test]
    async fn recipes_need_no_controller() {
        let (registry, store) = registry();
        let handle = registry.create_system(name("main")).await.unwrap();

        handle.register_recipe(recipe()).await.unwrap();
        handle.register_recipe(recipe()).await.unwrap();
        assert_eq!(handle.snapshot().await.unwrap().recipes().len(), 2);
        assert_eq!(store.load_all().unwrap()[0].recipes().len(), 2);

        handle.remove_recipe(0).await.unwrap();
        assert!(matches!(
            handle.remove_recipe(5).await,
            Err(DomainError::NotFound(_))
        ));
        assert_eq!(store.load_all().unwrap()[0].recipes().len(), 1);
    }

    #[tokio::test]
    async fn unknown_system_is_refused_with_4001() {
        let (registry, _) = registry();
        let (transport, socket) = serve(Arc::new(FakeController::new()));

        let err = registry.bind_controller("nope", transport).await.unwrap_err();
        assert_eq!(err.close_code(), CLOSE_UNKNOWN_SYSTEM);
        let closes = socket.await.unwrap();
        assert!(matches!(
            closes.as_slice(),
            [OutboundFrame::Close { code: CLOSE_UNKNOWN_SYSTEM, .. }]
        ));
    }

    #[tokio::test]
    async fn second_controller_is_refused_with_4002() {
        let (registry, _) = registry();
        let handle = registry.create_system(name("main")).await.unwrap();

        let first = Arc::new(FakeController::new());
        first.attach_empty("chest_0", 27);
        let (transport, _first_socket) = serve(first.clone());
        registry.bind_controller("main\n", transport).await.unwrap();

        let (transport, second_socket) = serve(Arc::new(FakeController::new()));
        let err = registry.bind_controller("main", transport).await.unwrap_err();
        assert_eq!(err.close_code(), CLOSE_ALREADY_BOUND);
        assert!(matches!(
            second_socket.await.unwrap().as_slice(),
            [OutboundFrame::Close { code: CLOSE_ALREADY_BOUND, .. }]
        ));

        // The first binding still works.
        handle.register_storage(id("chest_0")).await.unwrap();
        assert!(!first.commands().is_empty());
    }

    #[tokio::test]
    async fn disconnect_releases_binding() {
        let (registry, _) = registry();
        let handle = registry.create_system(name("main")).await.unwrap();

        let (transport, socket) = serve(Arc::new(FakeController::new()));
        let first_id = registry.bind_controller("main", transport).await.unwrap();
        assert!(handle.has_controller());

        socket.abort();
        wait_unbound(&handle).await;

        let (transport, _socket) = serve(Arc::new(FakeController::new()));
        let second_id = registry.bind_controller("main", transport).await.unwrap();
        assert_ne!(first_id, second_id);
        assert!(handle.has_controller());
    }

    #[tokio::test]
    async fn registration_and_reindex_through_worker() {
        let (registry, store) = registry();
        let handle = registry.create_system(name("main")).await.unwrap();

        let controller = Arc::new(FakeController::new());
        controller.attach("chest_0", vec![Some(redstone_reply(40)), None]);
        controller.attach_empty("furnace_in", 1);
        controller.attach("furnace_out", vec![Some(redstone_reply(4))]);
        let (transport, _socket) = serve(controller.clone());
        registry.bind_controller("main", transport).await.unwrap();

        handle.register_storage(id("chest_0")).await.unwrap();
        handle
            .register_processor("smelt".into(), id("furnace_in"), id("furnace_out"))
            .await
            .unwrap();
        handle.register_recipe(recipe()).await.unwrap();

        let inventory = handle.inventory().await.unwrap();
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory[0].count, 44);

        let plan = handle.restock_plan().await.unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].shortfalls[0].deficit, 60);

        controller.detach("chest_0");
        let report = handle.reindex().await.unwrap();
        assert_eq!(report.removed_storage, vec![id("chest_0")]);
        assert!(store.load_all().unwrap()[0].storage().is_empty());
        assert!(!controller.overlapped());
    }

    #[tokio::test]
    async fn concurrent_requests_are_serialized() {
        let (registry, _) = registry();
        let handle = registry.create_system(name("main")).await.unwrap();

        let controller = Arc::new(FakeController::new());
        for i in 0..8 {
            controller.attach(&format!("chest_{i}"), vec![Some(redstone_reply(1)); 4]);
        }
        let (transport, _socket) = serve(controller.clone());
        registry.bind_controller("main", transport).await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..8 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                handle.register_storage(id(&format!("chest_{i}"))).await
            }));
        }
        tasks.push(tokio::spawn({
            let handle = handle.clone();
            async move { handle.reindex().await.map(|_| ()) }
        }));
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(handle.snapshot().await.unwrap().stock_of("minecraft:redstone"), 32);
        assert!(!controller.overlapped());
    }

    #[tokio::test]
    async fn flush_writes_every_system() {
        let (registry, store) = registry();
        registry.create_system(name("main")).await.unwrap();
        registry.create_system(name("annex")).await.unwrap();
        registry.flush().await.unwrap();
        assert_eq!(store.load_all().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn reserved_names_are_refused() {
        let (registry, store) = registry();
        for reserved in RESERVED_SYSTEM_NAMES {
            assert!(matches!(
                registry.create_system(name(reserved)).await,
                Err(DomainError::MalformedInput(_))
            ));
        }
        assert!(registry.names().is_empty());
        assert!(store.load_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn absurd_size_reply_fails_registration_only() {
        let (registry, _) = registry();
        let handle = registry.create_system(name("main")).await.unwrap();

        let controller = Arc::new(FakeController::new());
        controller.attach_empty("chest_0", 1);
        controller.set_size_reply("chest_0", "100000000000000000");
        controller.attach("chest_1", vec![Some(redstone_reply(3))]);
        let (transport, _socket) = serve(controller.clone());
        registry.bind_controller("main", transport).await.unwrap();

        assert!(matches!(
            handle.register_storage(id("chest_0")).await,
            Err(DomainError::Protocol(_))
        ));

        // The worker and the binding survive.
        assert!(handle.has_controller());
        handle.register_storage(id("chest_1")).await.unwrap();
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.storage().len(), 1);
        assert_eq!(snapshot.stock_of("minecraft:redstone"), 3);
    }

    #[tokio::test]
    async fn slow_save_does_not_stall_other_systems() {
        let store = GatedStore::new(
            "main",
            vec![StorageSystem::new(name("main")), StorageSystem::new(name("annex"))],
        );
        let registry = SystemRegistry::start(store.clone(), ChannelConfig::default()).unwrap();
        let main = registry.get(&name("main")).unwrap();
        let annex = registry.get(&name("annex")).unwrap();

        let pending = tokio::spawn(async move { main.register_recipe(recipe()).await });
        store.wait_entered().await;

        let snapshot = tokio::time::timeout(Duration::from_secs(2), annex.snapshot())
            .await
            .expect("annex answered while main was saving")
            .unwrap();
        assert_eq!(snapshot.name(), &name("annex"));
        annex.register_recipe(recipe()).await.unwrap();
        assert!(!pending.is_finished());

        store.release();
        pending.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn create_system_does_not_block_lookups() {
        let store = GatedStore::new("annex", vec![StorageSystem::new(name("main"))]);
        let registry = SystemRegistry::start(store.clone(), ChannelConfig::default()).unwrap();

        let creating = tokio::spawn({
            let registry = registry.clone();
            async move { registry.create_system(name("annex")).await.map(|_| ()) }
        });
        store.wait_entered().await;

        assert!(registry.lookup("main").is_ok());
        assert_eq!(registry.names(), vec![name("annex"), name("main")]);
        assert!(!creating.is_finished());

        store.release();
        creating.await.unwrap().unwrap();
        assert_eq!(store.load_all().unwrap().len(), 2);
    }
}
