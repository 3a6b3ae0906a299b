use std::collections::HashMap;
use std::error::Error;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use oneshot::{Receiver, Sender};
use parking_lot::{RwLock, RwLockWriteGuard};
use snafu::prelude::*;

use crate::container::dispose::{DisposalFailure, DisposeError};
use crate::container::resolver::{CyclicDependencySnafu, DisposedSnafu};
use crate::container::{ProviderMap, ResolveError, Resolver, SharedManaged};
use crate::key::ServiceType;
use crate::registration::{Registration, RegistrationKind};

pub struct ProviderCore {
    parent: Option<Arc<Self>>,
    providers: ProviderMap,
    managed: RwLock<ManagedObjects>,
}

impl ProviderCore {
    pub fn new_root(registrations: impl IntoIterator<Item = Registration>) -> Self {
        Self::new_impl(None, registrations.into_iter().collect())
    }

    pub fn new_child(
        parent: Arc<Self>,
        registrations: impl IntoIterator<Item = Registration>,
    ) -> Self {
        Self::new_impl(Some(parent), registrations.into_iter().collect())
    }

    fn new_impl(parent: Option<Arc<Self>>, providers: ProviderMap) -> Self {
        let core = Self {
            parent,
            providers,
            managed: RwLock::new(ManagedObjects::new()),
        };
        core.seed_instances();
        core
    }

    fn seed_instances(&self) {
        let seeded: Vec<_> = self
            .providers
            .instances()
            .map(|registration| {
                let service = registration.service();
                match registration.provider().dyn_provide(self, service) {
                    Ok(object) => (service, object),
                    Err(err) => unreachable!("instance registrations never fail: {err}"),
                }
            })
            .collect();

        let mut managed = self.managed.write();
        for (service, object) in seeded {
            managed.insert(service, object);
        }
    }

    pub fn parent(&self) -> Option<&Arc<Self>> {
        self.parent.as_ref()
    }

    pub fn is_disposed(&self) -> bool {
        self.managed.read().disposed
    }

    pub fn services(&self) -> impl Iterator<Item = ServiceType> + '_ {
        self.providers.services()
    }

    fn get_object(
        &self,
        service: ServiceType,
    ) -> Result<Option<Box<dyn SharedManaged>>, ResolveError> {
        ensure!(!self.is_disposed(), DisposedSnafu { service });

        match self.providers.get(service) {
            Some(registration) => match registration.kind() {
                RegistrationKind::Instance | RegistrationKind::Singleton => {
                    self.get_shared_object(registration).map(Some)
                }
                RegistrationKind::Transient => self.get_transient_object(registration).map(Some),
            },
            None => match self.parent.as_ref() {
                Some(parent) => parent.get_object(service),
                None => Ok(None),
            },
        }
    }

    fn try_get_constructed_object(&self, service: ServiceType) -> Option<Box<dyn SharedManaged>> {
        let objects = &self.managed.read().objects;
        objects.get(&service).map(|object| object.dyn_clone())
    }

    fn get_shared_object(
        &self,
        registration: &Registration,
    ) -> Result<Box<dyn SharedManaged>, ResolveError> {
        let service = registration.service();
        if let Some(object) = self.try_get_constructed_object(service) {
            return Ok(object);
        }

        let managed = self.managed.write();
        ensure!(!managed.disposed, DisposedSnafu { service });
        if let Some(object) = managed.objects.get(&service) {
            return Ok(object.dyn_clone());
        }

        let on_current_thread = managed
            .constructing
            .get(&service)
            .map(ConstructingObjectContext::is_constructed_by_current_thread);
        match on_current_thread {
            Some(true) => Err(self.stop_construction_on_cyclic_dependency(managed, service)),
            Some(false) => self.wait_for_constructed_object(managed, service),
            None => self.construct_shared_object(managed, registration),
        }
    }

    fn stop_construction_on_cyclic_dependency(
        &self,
        managed: RwLockWriteGuard<ManagedObjects>,
        service: ServiceType,
    ) -> ResolveError {
        let err = CyclicDependencySnafu { service }.build();
        let response = WaitResponse::Error(err.clone());
        self.notify_waiters(managed, service, response);
        err
    }

    fn wait_for_constructed_object(
        &self,
        mut managed: RwLockWriteGuard<ManagedObjects>,
        service: ServiceType,
    ) -> Result<Box<dyn SharedManaged>, ResolveError> {
        let (sender, receiver) = oneshot::channel();
        let Some(context) = managed.constructing.get_mut(&service) else {
            unreachable!("whether `context` exists should be checked before calling this method")
        };
        context.register_waiter(sender);
        drop(managed);
        Self::receive_constructed_object(receiver)
    }

    fn receive_constructed_object(
        receiver: Receiver<WaitResponse>,
    ) -> Result<Box<dyn SharedManaged>, ResolveError> {
        match receiver.recv() {
            Ok(WaitResponse::Constructed(object)) => Ok(object),
            Ok(WaitResponse::Error(err)) => Err(err),
            Err(_) => unreachable!("the peer should send a message"),
        }
    }

    fn construct_shared_object(
        &self,
        mut managed: RwLockWriteGuard<ManagedObjects>,
        registration: &Registration,
    ) -> Result<Box<dyn SharedManaged>, ResolveError> {
        let service = registration.service();
        let on_thread = thread::current().id();
        managed
            .constructing
            .insert(service, ConstructingObjectContext::new(on_thread));
        drop(managed);

        tracing::trace!(service = %service, "constructing singleton");
        let provided = panic::catch_unwind(AssertUnwindSafe(|| {
            registration.provider().dyn_provide(self, service)
        }));
        let provided = match provided {
            Ok(provided) => provided,
            Err(payload) => {
                tracing::warn!(service = %service, "singleton construction panicked");
                let managed = self.managed.write();
                let response = WaitResponse::Error(Self::panicked_construction(service));
                self.notify_waiters(managed, service, response);
                panic::resume_unwind(payload);
            }
        };

        match provided {
            Ok(object) => {
                let mut managed = self.managed.write();
                if managed.disposed {
                    let err = DisposedSnafu { service }.build();
                    self.notify_waiters(managed, service, WaitResponse::Error(err.clone()));
                    self.dispose_late_object(registration, &*object);
                    return Err(err);
                }
                managed.insert(service, object.dyn_clone());
                let response = WaitResponse::Constructed(object.dyn_clone());
                self.notify_waiters(managed, service, response);
                Ok(object)
            }
            Err(err) => {
                let managed = self.managed.write();
                self.notify_waiters(managed, service, WaitResponse::Error(err.clone()));
                Err(err)
            }
        }
    }

    fn panicked_construction(service: ServiceType) -> ResolveError {
        let source: Box<dyn Error + Send + Sync> = "the constructor panicked".into();
        ResolveError::ObjectConstruction {
            service,
            source: Arc::from(source),
        }
    }

    /// Disposes a singleton whose construction finished after the provider
    /// was disposed, since nothing else will ever release it.
    fn dispose_late_object(&self, registration: &Registration, object: &dyn SharedManaged) {
        if let Some(disposer) = registration.disposer() {
            if let Err(err) = disposer(object) {
                tracing::warn!(
                    service = %registration.service(),
                    error = %err,
                    "failed to dispose an object constructed after disposal",
                );
            }
        }
    }

    fn notify_waiters(
        &self,
        mut managed: RwLockWriteGuard<ManagedObjects>,
        service: ServiceType,
        response: WaitResponse,
    ) {
        if let Some(context) = managed.constructing.remove(&service) {
            drop(managed);
            context.notify(response);
        }
    }

    fn get_transient_object(
        &self,
        registration: &Registration,
    ) -> Result<Box<dyn SharedManaged>, ResolveError> {
        let service = registration.service();
        let on_thread = thread::current().id();
        {
            let mut managed = self.managed.write();
            let threads = managed.transients.entry(service).or_default();
            ensure!(
                !threads.contains(&on_thread),
                CyclicDependencySnafu { service }
            );
            threads.push(on_thread);
        }

        let provided = panic::catch_unwind(AssertUnwindSafe(|| {
            registration.provider().dyn_provide(self, service)
        }));
        self.leave_transient_construction(service, on_thread);
        match provided {
            Ok(provided) => provided,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    fn leave_transient_construction(&self, service: ServiceType, on_thread: ThreadId) {
        let mut managed = self.managed.write();
        if let Some(threads) = managed.transients.get_mut(&service) {
            if let Some(index) = threads.iter().position(|id| *id == on_thread) {
                threads.swap_remove(index);
            }
            if threads.is_empty() {
                managed.transients.remove(&service);
            }
        }
    }

    /// Disposes every cached object whose registration is disposable, newest
    /// first. Only the first call does anything.
    pub fn dispose(&self) -> Result<(), DisposeError> {
        let objects = {
            let mut managed = self.managed.write();
            if managed.disposed {
                return Ok(());
            }
            managed.disposed = true;
            managed.take_in_reverse_order()
        };

        let failures: Vec<_> = objects
            .iter()
            .filter_map(|(service, object)| {
                let disposer = self.providers.get(*service)?.disposer()?;
                disposer(&**object)
                    .err()
                    .map(|source| DisposalFailure::new(*service, source))
            })
            .collect();

        tracing::trace!(
            objects = objects.len(),
            failures = failures.len(),
            "disposed provider objects",
        );
        DisposeError::check(failures)
    }
}

impl Resolver for ProviderCore {
    fn dyn_resolve(
        &self,
        service: ServiceType,
    ) -> Result<Option<Box<dyn SharedManaged>>, ResolveError> {
        self.get_object(service)
    }
}

struct ManagedObjects {
    objects: HashMap<ServiceType, Box<dyn SharedManaged>>,
    order: Vec<ServiceType>,
    constructing: HashMap<ServiceType, ConstructingObjectContext>,
    transients: HashMap<ServiceType, Vec<ThreadId>>,
    disposed: bool,
}

impl ManagedObjects {
    fn new() -> Self {
        Self {
            objects: HashMap::new(),
            order: Vec::new(),
            constructing: HashMap::new(),
            transients: HashMap::new(),
            disposed: false,
        }
    }

    fn insert(&mut self, service: ServiceType, object: Box<dyn SharedManaged>) {
        if self.objects.insert(service, object).is_none() {
            self.order.push(service);
        }
    }

    fn take_in_reverse_order(&mut self) -> Vec<(ServiceType, Box<dyn SharedManaged>)> {
        let mut objects = mem::take(&mut self.objects);
        mem::take(&mut self.order)
            .into_iter()
            .rev()
            .filter_map(|service| objects.remove(&service).map(|object| (service, object)))
            .collect()
    }
}

struct ConstructingObjectContext {
    on_thread: ThreadId,
    waiters: Vec<Sender<WaitResponse>>,
}

impl ConstructingObjectContext {
    fn new(on_thread: ThreadId) -> Self {
        Self {
            on_thread,
            waiters: Vec::new(),
        }
    }

    fn is_constructed_by_current_thread(&self) -> bool {
        thread::current().id() == self.on_thread
    }

    fn register_waiter(&mut self, sender: Sender<WaitResponse>) {
        self.waiters.push(sender);
    }

    fn notify(self, response: WaitResponse) {
        for sender in self.waiters {
            let _ = sender.send(response.clone());
        }
    }
}

enum WaitResponse {
    Constructed(Box<dyn SharedManaged>),
    Error(ResolveError),
}

impl Clone for WaitResponse {
    fn clone(&self) -> Self {
        match self {
            Self::Constructed(object) => Self::Constructed(object.dyn_clone()),
            Self::Error(err) => Self::Error(err.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    use parking_lot::Mutex;

    use crate::container::{Dispose, TypedResolver};
    use crate::registration::bind;
    use crate::scope::Lifetime;

    use super::*;

    struct Journal {
        entries: Mutex<Vec<&'static str>>,
    }

    impl Journal {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                entries: Mutex::new(Vec::new()),
            })
        }

        fn entries(&self) -> Vec<&'static str> {
            self.entries.lock().clone()
        }
    }

    struct Resource {
        name: &'static str,
        journal: Arc<Journal>,
        fail: bool,
    }

    impl Dispose for Resource {
        fn dispose(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.journal.entries.lock().push(self.name);
            if self.fail {
                Err(format!("{} refused to close", self.name).into())
            } else {
                Ok(())
            }
        }
    }

    struct Cache(Arc<Resource>);

    fn resource(name: &'static str, journal: &Arc<Journal>, fail: bool) -> Arc<Resource> {
        Arc::new(Resource {
            name,
            journal: Arc::clone(journal),
            fail,
        })
    }

    struct SingletonRecursiveObject {
        _recursive: Arc<TransientRecursiveObject>,
    }

    struct TransientRecursiveObject {
        _recursive: Arc<SingletonRecursiveObject>,
    }

    fn recursive_registrations() -> Vec<Registration> {
        vec![
            bind::<Arc<SingletonRecursiveObject>>()
                .to_factory(Lifetime::Singleton, |recursive: Arc<TransientRecursiveObject>| {
                    Ok::<_, Infallible>(Arc::new(SingletonRecursiveObject {
                        _recursive: recursive,
                    }))
                })
                .unwrap(),
            bind::<Arc<TransientRecursiveObject>>()
                .to_factory(Lifetime::Transient, |recursive: Arc<SingletonRecursiveObject>| {
                    Ok::<_, Infallible>(Arc::new(TransientRecursiveObject {
                        _recursive: recursive,
                    }))
                })
                .unwrap(),
        ]
    }

    #[test]
    fn provider_core_get_caches_parent_singletons_in_parent() {
        let root = Arc::new(ProviderCore::new_root([bind::<Arc<String>>()
            .to_factory(Lifetime::Singleton, || {
                Ok::<_, Infallible>(Arc::new(String::from("db")))
            })
            .unwrap()]));
        let child = ProviderCore::new_child(Arc::clone(&root), []);
        let service = ServiceType::of::<Arc<String>>();

        let first: Arc<String> = child.resolve_required().unwrap();
        let second: Arc<String> = root.resolve_required().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        assert!(root.managed.read().objects.contains_key(&service));
        assert!(!child.managed.read().objects.contains_key(&service));
    }

    #[test]
    fn provider_core_get_returns_none_when_not_registered() {
        let root = Arc::new(ProviderCore::new_root([]));
        let child = ProviderCore::new_child(root, []);
        assert!(child.resolve::<Arc<i32>>().unwrap().is_none());
    }

    #[test]
    fn provider_core_get_constructs_singleton_once_under_contention() {
        let constructions = Arc::new(AtomicUsize::new(0));
        let core = Arc::new(ProviderCore::new_root([bind::<Arc<usize>>()
            .to_raw_factory(Lifetime::Singleton, {
                let constructions = Arc::clone(&constructions);
                move |_| {
                    thread::sleep(Duration::from_millis(20));
                    let id = constructions.fetch_add(1, Ordering::SeqCst);
                    Ok(Ok::<_, Infallible>(Arc::new(id)))
                }
            })
            .unwrap()]));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let core = Arc::clone(&core);
                thread::spawn(move || core.resolve_required::<Arc<usize>>().unwrap())
            })
            .collect();
        let objects: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("Each thread should not `panic!()`"))
            .collect();

        assert_eq!(constructions.load(Ordering::SeqCst), 1);
        assert!(objects.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn provider_core_get_releases_waiters_when_singleton_construction_panics() {
        let service = ServiceType::of::<Arc<u32>>();
        let (started_tx, started_rx) = mpsc::channel();
        let (go_tx, go_rx) = mpsc::channel::<()>();
        let started_tx = Mutex::new(Some(started_tx));
        let go_rx = Mutex::new(Some(go_rx));
        let core = Arc::new(ProviderCore::new_root([bind::<Arc<u32>>()
            .to_raw_factory(Lifetime::Singleton, move |_: &dyn Resolver| {
                if let Some(started) = started_tx.lock().take() {
                    let _ = started.send(());
                    if let Some(go) = go_rx.lock().take() {
                        let _ = go.recv();
                    }
                    panic!("the first construction panics");
                }
                Ok(Ok::<_, Infallible>(Arc::new(7u32)))
            })
            .unwrap()]));

        let constructing = {
            let core = Arc::clone(&core);
            thread::spawn(move || core.resolve::<Arc<u32>>())
        };
        started_rx.recv().unwrap();
        let waiting = {
            let core = Arc::clone(&core);
            thread::spawn(move || core.resolve::<Arc<u32>>())
        };
        while core
            .managed
            .read()
            .constructing
            .get(&service)
            .map_or(true, |context| context.waiters.is_empty())
        {
            thread::yield_now();
        }
        go_tx.send(()).unwrap();

        assert!(constructing.join().is_err());
        let waited = waiting.join().expect("the waiter should not `panic!()`");
        assert!(matches!(
            waited,
            Err(ResolveError::ObjectConstruction { .. })
        ));
        assert!(core.managed.read().constructing.is_empty());
        assert_eq!(*core.resolve_required::<Arc<u32>>().unwrap(), 7);
    }

    #[test]
    fn provider_core_get_recovers_when_transient_construction_panics() {
        let attempts = AtomicUsize::new(0);
        let core = ProviderCore::new_root([bind::<Arc<u64>>()
            .to_raw_factory(Lifetime::Transient, move |_: &dyn Resolver| {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("the first construction panics");
                }
                Ok(Ok::<_, Infallible>(Arc::new(9u64)))
            })
            .unwrap()]);

        let panicked = panic::catch_unwind(AssertUnwindSafe(|| core.resolve::<Arc<u64>>()));
        assert!(panicked.is_err());
        assert!(core.managed.read().transients.is_empty());
        assert_eq!(*core.resolve_required::<Arc<u64>>().unwrap(), 9);
    }

    #[test]
    fn provider_core_get_fails_when_there_exists_cyclic_dependency() {
        let core = ProviderCore::new_root(recursive_registrations());

        assert!(matches!(
            core.resolve::<Arc<SingletonRecursiveObject>>(),
            Err(ResolveError::CyclicDependency { .. })
        ));
        assert!(core.managed.read().constructing.is_empty());
    }

    #[test]
    fn provider_core_get_fails_when_transient_requires_itself() {
        let core = ProviderCore::new_root([bind::<Arc<TransientRecursiveObject>>()
            .to_raw_factory(Lifetime::Transient, |r: &dyn Resolver| {
                r.resolve_required::<Arc<TransientRecursiveObject>>()?;
                Ok(Err::<Arc<TransientRecursiveObject>, _>("the nested request should fail"))
            })
            .unwrap()]);

        assert!(matches!(
            core.resolve::<Arc<TransientRecursiveObject>>(),
            Err(ResolveError::CyclicDependency { .. })
        ));
        assert!(core.managed.read().transients.is_empty());
    }

    #[test]
    fn provider_core_dispose_runs_in_reverse_creation_order() {
        let journal = Journal::new();
        let core = ProviderCore::new_root([
            bind::<Arc<Resource>>()
                .disposable()
                .to_instance(resource("pool", &journal, false)),
            bind::<Arc<Cache>>()
                .to_factory(Lifetime::Singleton, {
                    let journal = Arc::clone(&journal);
                    move |pool: Arc<Resource>| {
                        journal.entries.lock().push("cache built");
                        Ok::<_, Infallible>(Arc::new(Cache(pool)))
                    }
                })
                .unwrap(),
        ]);
        let cache: Arc<Cache> = core.resolve_required().unwrap();
        assert_eq!(cache.0.name, "pool");

        core.dispose().unwrap();
        core.dispose().unwrap();
        assert_eq!(journal.entries(), ["cache built", "pool"]);
        assert!(core.is_disposed());
    }

    #[test]
    fn provider_core_dispose_continues_after_failure() {
        let journal = Journal::new();
        let core = ProviderCore::new_root([
            bind::<Arc<Resource>>()
                .disposable()
                .to_instance(resource("first", &journal, true)),
            bind::<Arc<Cache>>().to_instance(Arc::new(Cache(resource("ignored", &journal, false)))),
        ]);
        let child = ProviderCore::new_child(
            Arc::new(core),
            [bind::<Arc<Resource>>()
                .disposable()
                .to_instance(resource("second", &journal, false))],
        );

        let err = child.parent().unwrap().dispose().unwrap_err();
        assert_eq!(err.failures().len(), 1);
        assert_eq!(err.failures()[0].service(), ServiceType::of::<Arc<Resource>>());
        assert_eq!(journal.entries(), ["first"]);

        child.dispose().unwrap();
        assert_eq!(journal.entries(), ["first", "second"]);
    }

    #[test]
    fn provider_core_get_fails_after_dispose() {
        let root = Arc::new(ProviderCore::new_root([
            bind::<Arc<u8>>().to_instance(Arc::new(1)),
            bind::<Arc<u16>>()
                .to_factory(Lifetime::Transient, || Ok::<_, Infallible>(Arc::new(2u16)))
                .unwrap(),
        ]));
        let child = ProviderCore::new_child(
            Arc::clone(&root),
            [bind::<Arc<u32>>().to_instance(Arc::new(3))],
        );
        root.dispose().unwrap();

        assert!(matches!(
            root.resolve::<Arc<u8>>(),
            Err(ResolveError::Disposed { .. })
        ));
        assert!(matches!(
            root.resolve::<Arc<u16>>(),
            Err(ResolveError::Disposed { .. })
        ));
        assert_eq!(child.resolve_required::<Arc<u32>>().unwrap().as_ref(), &3);
        assert!(matches!(
            child.resolve::<Arc<u8>>(),
            Err(ResolveError::Disposed { .. })
        ));
    }
}
