// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Ordinary Rust functions as systems.
//!
//! A system parameter describes how to pull one piece of state out of a
//! [`Manager`] — a resource, a query, an event stream — and how to put
//! anything deferred back once the system body has run. [`IntoSystem`] is
//! implemented for plain `FnMut(P1, P2, ...) -> R` closures and fn items
//! whose parameters all implement [`SystemParam`], turning them into a
//! [`TypedSystem`] that resolves its parameters in declaration order and
//! tears them down in reverse.
//!
//! Two systems built from the same function item and parameter list hash to
//! the same [`SystemHandle`] — caching is keyed on `(fn type, param types)`,
//! so registering a system twice is a no-op rather than a duplicate.
//!
//! [`IntoTypedSystem`] and [`IntoCondition`] are the same resolver shape as
//! [`IntoSystem`] with a different output bound: the former keeps an
//! arbitrary return value for [`pipe`], the latter requires a `bool`-ish
//! return for [`run_if`]'s predicate.

use std::any::type_name;
use std::marker::PhantomData;

use crate::error::{EcsError, Result};
use crate::event::EventStore;
use crate::manager::{ComponentEvent, Manager, SystemHandle};
use crate::query::{ExcludeFilter, QueryData};
use crate::reflect::type_hash;
use crate::relations::RelationManager;

fn mix_hash(a: u64, b: u64) -> u64 {
    a ^ b.wrapping_mul(0x9E3779B97F4A7C15).rotate_left(23)
}

fn hash_of<T: 'static>() -> u64 {
    type_hash::<T>()
}

/// One resolvable piece of state a system function can take by value.
///
/// `State` is built once per run via [`SystemParam::init`] and lives until
/// [`SystemParam::apply`] tears it down after the function body returns;
/// `Item` is what's actually handed to the function, usually a short-lived
/// reborrow of `State`.
///
/// # Safety
/// `get` receives a raw pointer rather than `&mut Manager` so several
/// disjoint parameters can be resolved from the same `Manager` within one
/// call without the borrow checker seeing a false conflict. It is the
/// caller's (the generated [`IntoSystem`] impl's) responsibility never to
/// construct two live items that alias the same mutable state.
pub trait SystemParam {
    type State: 'static;
    type Item;

    fn init(manager: &mut Manager, system_hash: u64) -> Result<Self::State>;

    /// # Safety
    /// `manager` must be valid for the lifetime of the returned `Item`, and
    /// no other live `Item` resolved in the same call may alias the state
    /// this accesses.
    unsafe fn get(state: &mut Self::State, manager: *mut Manager) -> Result<Self::Item>;

    fn apply(_state: &mut Self::State, _manager: &mut Manager) -> Result<()> {
        Ok(())
    }
}

// --- Manager passthrough -----------------------------------------------------

impl SystemParam for &'static Manager {
    type State = ();
    type Item = &'static Manager;
    fn init(_m: &mut Manager, _h: u64) -> Result<()> {
        Ok(())
    }
    unsafe fn get(_s: &mut (), manager: *mut Manager) -> Result<Self::Item> {
        Ok(unsafe { &*manager })
    }
}

impl SystemParam for &'static mut Manager {
    type State = ();
    type Item = &'static mut Manager;
    fn init(_m: &mut Manager, _h: u64) -> Result<()> {
        Ok(())
    }
    unsafe fn get(_s: &mut (), manager: *mut Manager) -> Result<Self::Item> {
        Ok(unsafe { &mut *manager })
    }
}

// --- Res / ResMut ------------------------------------------------------------

/// Shared read access to resource `T`. Fails with `ResourceNotFound` if `T`
/// has not been added.
pub struct Res<T: 'static> {
    ptr: *const T,
}

impl<T> std::ops::Deref for Res<T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.ptr }
    }
}

impl<T: 'static> SystemParam for Res<T> {
    type State = *const T;
    type Item = Res<T>;

    fn init(manager: &mut Manager, _h: u64) -> Result<*const T> {
        manager
            .resources()
            .get_resource::<T>()
            .map(|r| r as *const T)
            .ok_or_else(|| EcsError::ResourceNotFound(type_name::<T>().to_string()))
    }

    unsafe fn get(state: &mut *const T, _m: *mut Manager) -> Result<Self::Item> {
        Ok(Res { ptr: *state })
    }
}

/// Exclusive write access to resource `T`.
pub struct ResMut<T: 'static> {
    ptr: *mut T,
}

impl<T> std::ops::Deref for ResMut<T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.ptr }
    }
}

impl<T> std::ops::DerefMut for ResMut<T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.ptr }
    }
}

impl<T: 'static> SystemParam for ResMut<T> {
    type State = *mut T;
    type Item = ResMut<T>;

    fn init(manager: &mut Manager, _h: u64) -> Result<*mut T> {
        manager
            .resources_mut()
            .get_resource_mut::<T>()
            .map(|r| r as *mut T)
            .ok_or_else(|| EcsError::ResourceNotFound(type_name::<T>().to_string()))
    }

    unsafe fn get(state: &mut *mut T, _m: *mut Manager) -> Result<Self::Item> {
        Ok(ResMut { ptr: *state })
    }
}

// --- Local<T> ----------------------------------------------------------------

/// Scratch state private to one system, keyed by `(system_hash, TypeId::<T>)`
/// and persisted on the `Manager` across runs.
pub struct Local<T: 'static> {
    ptr: *mut T,
}

impl<T> std::ops::Deref for Local<T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.ptr }
    }
}

impl<T> std::ops::DerefMut for Local<T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.ptr }
    }
}

impl<T: Default + 'static> SystemParam for Local<T> {
    type State = *mut T;
    type Item = Local<T>;

    fn init(manager: &mut Manager, system_hash: u64) -> Result<*mut T> {
        Ok(manager.local_slot::<T>(system_hash) as *mut T)
    }

    unsafe fn get(state: &mut *mut T, _m: *mut Manager) -> Result<Self::Item> {
        Ok(Local { ptr: *state })
    }
}

// --- Query / Single -----------------------------------------------------------

impl<Q, X> SystemParam for crate::query::Query<'static, Q, X>
where
    Q: QueryData<'static> + 'static,
    X: ExcludeFilter + 'static,
{
    type State = ();
    type Item = crate::query::Query<'static, Q, X>;

    fn init(_m: &mut Manager, _h: u64) -> Result<()> {
        Ok(())
    }

    unsafe fn get(_s: &mut (), manager: *mut Manager) -> Result<Self::Item> {
        let store: *mut crate::store::ArchetypeStore = unsafe { (*manager).world_mut().store_mut() };
        Ok(crate::query::Query::new(unsafe { &mut *store }))
    }
}

/// A query required to match exactly one row. See [`crate::query::single`].
pub struct Single<Q, X = ()>
where
    Q: QueryData<'static>,
    X: ExcludeFilter,
{
    pub item: Q::Item,
    _filter: PhantomData<X>,
}

impl<Q, X> std::ops::Deref for Single<Q, X>
where
    Q: QueryData<'static>,
    X: ExcludeFilter,
{
    type Target = Q::Item;
    fn deref(&self) -> &Self::Target {
        &self.item
    }
}

impl<Q, X> SystemParam for Single<Q, X>
where
    Q: QueryData<'static> + 'static,
    X: ExcludeFilter + 'static,
{
    type State = ();
    type Item = Single<Q, X>;

    fn init(_m: &mut Manager, _h: u64) -> Result<()> {
        Ok(())
    }

    unsafe fn get(_s: &mut (), manager: *mut Manager) -> Result<Self::Item> {
        let store: *mut crate::store::ArchetypeStore = unsafe { (*manager).world_mut().store_mut() };
        let item = crate::query::single::<Q, X>(unsafe { &mut *store })?;
        Ok(Single { item, _filter: PhantomData })
    }
}

// --- EventReader / EventWriter ------------------------------------------------

/// Non-consuming read access to `T`'s event stream, created on first use.
pub struct EventReader<T: 'static> {
    ptr: *mut EventStore<T>,
}

impl<T> EventReader<T> {
    pub fn iter(&mut self) -> crate::event::EventIter<'_, T> {
        unsafe { &mut *self.ptr }.iterator()
    }
}

impl<T: 'static> SystemParam for EventReader<T> {
    type State = *mut EventStore<T>;
    type Item = EventReader<T>;

    fn init(manager: &mut Manager, _h: u64) -> Result<*mut EventStore<T>> {
        Ok(manager.resources_mut().get_or_insert_with(EventStore::<T>::new) as *mut EventStore<T>)
    }

    unsafe fn get(state: &mut *mut EventStore<T>, _m: *mut Manager) -> Result<Self::Item> {
        Ok(EventReader { ptr: *state })
    }
}

/// Write access to `T`'s event stream, created on first use.
pub struct EventWriter<T: 'static> {
    ptr: *mut EventStore<T>,
}

impl<T> EventWriter<T> {
    pub fn send(&mut self, value: T) {
        unsafe { &mut *self.ptr }.push(value);
    }
}

impl<T: 'static> SystemParam for EventWriter<T> {
    type State = *mut EventStore<T>;
    type Item = EventWriter<T>;

    fn init(manager: &mut Manager, _h: u64) -> Result<*mut EventStore<T>> {
        Ok(manager.resources_mut().get_or_insert_with(EventStore::<T>::new) as *mut EventStore<T>)
    }

    unsafe fn get(state: &mut *mut EventStore<T>, _m: *mut Manager) -> Result<Self::Item> {
        Ok(EventWriter { ptr: *state })
    }
}

// --- OnAdded / OnRemoved -------------------------------------------------------

/// Entities whose component `T` was added since the last time any system
/// drained this stream. Snapshotted (and marked handled) at resolve time.
pub struct OnAdded<T> {
    entities: Vec<crate::entity::EntityId>,
    _marker: PhantomData<T>,
}

impl<T> OnAdded<T> {
    pub fn iter(&self) -> impl Iterator<Item = crate::entity::EntityId> + '_ {
        self.entities.iter().copied()
    }
}

impl<T: 'static> SystemParam for OnAdded<T> {
    type State = Vec<crate::entity::EntityId>;
    type Item = OnAdded<T>;

    fn init(manager: &mut Manager, _h: u64) -> Result<Vec<crate::entity::EntityId>> {
        Ok(drain_component_events(manager.component_added_mut(), hash_of::<T>()))
    }

    unsafe fn get(state: &mut Vec<crate::entity::EntityId>, _m: *mut Manager) -> Result<Self::Item> {
        Ok(OnAdded {
            entities: state.clone(),
            _marker: PhantomData,
        })
    }
}

/// Entities whose component `T` was removed since the last drain.
pub struct OnRemoved<T> {
    entities: Vec<crate::entity::EntityId>,
    _marker: PhantomData<T>,
}

impl<T> OnRemoved<T> {
    pub fn iter(&self) -> impl Iterator<Item = crate::entity::EntityId> + '_ {
        self.entities.iter().copied()
    }
}

impl<T: 'static> SystemParam for OnRemoved<T> {
    type State = Vec<crate::entity::EntityId>;
    type Item = OnRemoved<T>;

    fn init(manager: &mut Manager, _h: u64) -> Result<Vec<crate::entity::EntityId>> {
        Ok(drain_component_events(manager.component_removed_mut(), hash_of::<T>()))
    }

    unsafe fn get(state: &mut Vec<crate::entity::EntityId>, _m: *mut Manager) -> Result<Self::Item> {
        Ok(OnRemoved {
            entities: state.clone(),
            _marker: PhantomData,
        })
    }
}

fn drain_component_events(store: &mut EventStore<ComponentEvent>, hash: u64) -> Vec<crate::entity::EntityId> {
    let mut hits = Vec::new();
    let mut iter = store.iterator();
    while let Some(event) = iter.next() {
        if event.type_hash == hash {
            hits.push(event.entity);
            iter.mark_handled();
        }
    }
    hits
}

// --- State / NextState ---------------------------------------------------------

/// Backing resource for a registered state enum `E`. Installed by
/// [`crate::schedule::Scheduler::register_state`].
pub struct StateManager<E> {
    pub(crate) current: Option<E>,
    pub(crate) pending: Option<E>,
}

impl<E> StateManager<E> {
    pub fn new(initial: E) -> Self {
        Self {
            current: Some(initial),
            pending: None,
        }
    }
}

/// Current value of a registered state enum `E`, read-only.
pub struct State<E: Clone + 'static> {
    value: Option<E>,
}

impl<E: Clone + 'static> State<E> {
    pub fn get(&self) -> Option<&E> {
        self.value.as_ref()
    }
}

impl<E: Clone + 'static> SystemParam for State<E> {
    type State = Option<E>;
    type Item = State<E>;

    fn init(manager: &mut Manager, _h: u64) -> Result<Option<E>> {
        let sm = manager
            .resources()
            .get_resource::<StateManager<E>>()
            .ok_or(EcsError::StateNotRegistered)?;
        Ok(sm.current.clone())
    }

    unsafe fn get(state: &mut Option<E>, _m: *mut Manager) -> Result<Self::Item> {
        Ok(State { value: state.clone() })
    }
}

/// Requests a transition of state enum `E`. The request is applied the next
/// time [`crate::schedule::Scheduler::apply_pending_transitions`] runs.
pub struct NextState<E: 'static> {
    ptr: *mut StateManager<E>,
}

impl<E> NextState<E> {
    pub fn set(&mut self, value: E) {
        unsafe { &mut *self.ptr }.pending = Some(value);
    }
}

impl<E: Clone + 'static> SystemParam for NextState<E> {
    type State = *mut StateManager<E>;
    type Item = NextState<E>;

    fn init(manager: &mut Manager, _h: u64) -> Result<*mut StateManager<E>> {
        manager
            .resources_mut()
            .get_resource_mut::<StateManager<E>>()
            .map(|sm| sm as *mut StateManager<E>)
            .ok_or(EcsError::StateNotRegistered)
    }

    unsafe fn get(state: &mut *mut StateManager<E>, _m: *mut Manager) -> Result<Self::Item> {
        Ok(NextState { ptr: *state })
    }
}

// --- Relations / Commands -------------------------------------------------------

impl SystemParam for &'static mut RelationManager {
    type State = ();
    type Item = &'static mut RelationManager;

    fn init(_m: &mut Manager, _h: u64) -> Result<()> {
        Ok(())
    }

    unsafe fn get(_s: &mut (), manager: *mut Manager) -> Result<Self::Item> {
        Ok(unsafe { (*manager).relations_mut() })
    }
}

impl SystemParam for &'static mut crate::command::Commands {
    type State = crate::command::Commands;
    type Item = &'static mut crate::command::Commands;

    fn init(_m: &mut Manager, _h: u64) -> Result<crate::command::Commands> {
        Ok(crate::command::Commands::new())
    }

    unsafe fn get(state: &mut crate::command::Commands, _m: *mut Manager) -> Result<Self::Item> {
        Ok(unsafe { &mut *(state as *mut crate::command::Commands) })
    }

    fn apply(state: &mut crate::command::Commands, manager: &mut Manager) -> Result<()> {
        match state.flush(manager).into_iter().next() {
            Some(first) => Err(first),
            None => Ok(()),
        }
    }
}

// --- turning functions into systems ---------------------------------------------

/// Converts a return value into `Result<()>`, erasing arbitrary system
/// return types the way a `?`-propagating caller would.
pub trait SystemOutput {
    fn into_output(self) -> Result<()>;
}

impl SystemOutput for () {
    fn into_output(self) -> Result<()> {
        Ok(())
    }
}

impl SystemOutput for Result<()> {
    fn into_output(self) -> Result<()> {
        self
    }
}

/// A system callable whose parameters have been fully erased; what a
/// [`crate::schedule::Scheduler`] stage stores and runs.
pub trait ErasedSystem {
    fn run(&mut self, manager: &mut Manager) -> Result<()>;
}

struct ErasedAdapter<F>(F);

impl<F> ErasedSystem for ErasedAdapter<F>
where
    F: FnMut(&mut Manager) -> Result<()>,
{
    fn run(&mut self, manager: &mut Manager) -> Result<()> {
        (self.0)(manager)
    }
}

/// A system resolved into a concrete, cacheable callable. Keeps its return
/// value (unlike [`ErasedSystem`]), which [`pipe`] needs.
pub struct TypedSystem<R> {
    hash: u64,
    func: Box<dyn FnMut(&mut Manager) -> Result<R>>,
}

impl<R> TypedSystem<R> {
    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn run(&mut self, manager: &mut Manager) -> Result<R> {
        (self.func)(manager)
    }
}

impl TypedSystem<()> {
    fn into_erased(self) -> Box<dyn ErasedSystem> {
        Box::new(ErasedAdapter(self.func))
    }
}

/// Converts a plain function into a [`TypedSystem`]. Implemented for
/// `FnMut(P1, ..., Pn) -> R` (up to four parameters) where every `Pi:
/// SystemParam` and `R` is `()` or `Result<()>`.
pub trait IntoSystem<Marker> {
    fn into_system(self) -> TypedSystem<()>;
}

impl<F, R> IntoSystem<(F,)> for F
where
    F: FnMut() -> R + 'static,
    R: SystemOutput + 'static,
{
    fn into_system(self) -> TypedSystem<()> {
        let hash = hash_of::<F>();
        let mut f = self;
        TypedSystem {
            hash,
            func: Box::new(move |_manager: &mut Manager| f().into_output()),
        }
    }
}

impl<F, R, P1> IntoSystem<(F, P1)> for F
where
    P1: SystemParam + 'static,
    F: FnMut(P1::Item) -> R + 'static,
    R: SystemOutput + 'static,
{
    fn into_system(self) -> TypedSystem<()> {
        let hash = mix_hash(hash_of::<F>(), hash_of::<P1>());
        let mut f = self;
        TypedSystem {
            hash,
            func: Box::new(move |manager: &mut Manager| {
                let mut s1 = P1::init(manager, hash)?;
                let ptr: *mut Manager = manager;
                let i1 = unsafe { P1::get(&mut s1, ptr)? };
                let result = f(i1).into_output();
                P1::apply(&mut s1, manager)?;
                result
            }),
        }
    }
}

impl<F, R, P1, P2> IntoSystem<(F, P1, P2)> for F
where
    P1: SystemParam + 'static,
    P2: SystemParam + 'static,
    F: FnMut(P1::Item, P2::Item) -> R + 'static,
    R: SystemOutput + 'static,
{
    fn into_system(self) -> TypedSystem<()> {
        let hash = mix_hash(mix_hash(hash_of::<F>(), hash_of::<P1>()), hash_of::<P2>());
        let mut f = self;
        TypedSystem {
            hash,
            func: Box::new(move |manager: &mut Manager| {
                let mut s1 = P1::init(manager, hash)?;
                let mut s2 = P2::init(manager, hash)?;
                let ptr: *mut Manager = manager;
                let i1 = unsafe { P1::get(&mut s1, ptr)? };
                let i2 = unsafe { P2::get(&mut s2, ptr)? };
                let result = f(i1, i2).into_output();
                P2::apply(&mut s2, manager)?;
                P1::apply(&mut s1, manager)?;
                result
            }),
        }
    }
}

impl<F, R, P1, P2, P3> IntoSystem<(F, P1, P2, P3)> for F
where
    P1: SystemParam + 'static,
    P2: SystemParam + 'static,
    P3: SystemParam + 'static,
    F: FnMut(P1::Item, P2::Item, P3::Item) -> R + 'static,
    R: SystemOutput + 'static,
{
    fn into_system(self) -> TypedSystem<()> {
        let hash = mix_hash(mix_hash(mix_hash(hash_of::<F>(), hash_of::<P1>()), hash_of::<P2>()), hash_of::<P3>());
        let mut f = self;
        TypedSystem {
            hash,
            func: Box::new(move |manager: &mut Manager| {
                let mut s1 = P1::init(manager, hash)?;
                let mut s2 = P2::init(manager, hash)?;
                let mut s3 = P3::init(manager, hash)?;
                let ptr: *mut Manager = manager;
                let i1 = unsafe { P1::get(&mut s1, ptr)? };
                let i2 = unsafe { P2::get(&mut s2, ptr)? };
                let i3 = unsafe { P3::get(&mut s3, ptr)? };
                let result = f(i1, i2, i3).into_output();
                P3::apply(&mut s3, manager)?;
                P2::apply(&mut s2, manager)?;
                P1::apply(&mut s1, manager)?;
                result
            }),
        }
    }
}

impl<F, R, P1, P2, P3, P4> IntoSystem<(F, P1, P2, P3, P4)> for F
where
    P1: SystemParam + 'static,
    P2: SystemParam + 'static,
    P3: SystemParam + 'static,
    P4: SystemParam + 'static,
    F: FnMut(P1::Item, P2::Item, P3::Item, P4::Item) -> R + 'static,
    R: SystemOutput + 'static,
{
    fn into_system(self) -> TypedSystem<()> {
        let hash = mix_hash(
            mix_hash(mix_hash(mix_hash(hash_of::<F>(), hash_of::<P1>()), hash_of::<P2>()), hash_of::<P3>()),
            hash_of::<P4>(),
        );
        let mut f = self;
        TypedSystem {
            hash,
            func: Box::new(move |manager: &mut Manager| {
                let mut s1 = P1::init(manager, hash)?;
                let mut s2 = P2::init(manager, hash)?;
                let mut s3 = P3::init(manager, hash)?;
                let mut s4 = P4::init(manager, hash)?;
                let ptr: *mut Manager = manager;
                let i1 = unsafe { P1::get(&mut s1, ptr)? };
                let i2 = unsafe { P2::get(&mut s2, ptr)? };
                let i3 = unsafe { P3::get(&mut s3, ptr)? };
                let i4 = unsafe { P4::get(&mut s4, ptr)? };
                let result = f(i1, i2, i3, i4).into_output();
                P4::apply(&mut s4, manager)?;
                P3::apply(&mut s3, manager)?;
                P2::apply(&mut s2, manager)?;
                P1::apply(&mut s1, manager)?;
                result
            }),
        }
    }
}

impl Manager {
    /// Resolve `f` into a system and cache it, returning a stable handle.
    /// Calling this again with the same function item and parameter list
    /// returns the same handle without re-inserting.
    pub fn add_system<F, Marker>(&mut self, f: F) -> SystemHandle
    where
        F: IntoSystem<Marker>,
    {
        let typed = f.into_system();
        let hash = typed.hash();
        self.register_system(hash, typed.into_erased())
    }
}

/// Converts a plain function into a [`TypedSystem`] that keeps its return
/// value, for composition (`pipe`, `run_if`) rather than stage registration.
///
/// Implemented for `FnMut(P1, ..., Pn) -> R` (up to four parameters) where
/// every `Pi: SystemParam` and `R` is any `'static` type — unlike
/// [`IntoSystem`], which exists only to feed [`Manager::add_system`] and is
/// restricted to `R: SystemOutput` (`()`/`Result<()>`) because a scheduler
/// stage has nowhere to put a returned value.
pub trait IntoTypedSystem<Marker> {
    type Output: 'static;
    fn into_typed_system(self) -> TypedSystem<Self::Output>;
}

impl<F, R> IntoTypedSystem<(F,)> for F
where
    F: FnMut() -> R + 'static,
    R: 'static,
{
    type Output = R;
    fn into_typed_system(self) -> TypedSystem<R> {
        let hash = hash_of::<F>();
        let mut f = self;
        TypedSystem {
            hash,
            func: Box::new(move |_manager: &mut Manager| Ok(f())),
        }
    }
}

impl<F, R, P1> IntoTypedSystem<(F, P1)> for F
where
    P1: SystemParam + 'static,
    F: FnMut(P1::Item) -> R + 'static,
    R: 'static,
{
    type Output = R;
    fn into_typed_system(self) -> TypedSystem<R> {
        let hash = mix_hash(hash_of::<F>(), hash_of::<P1>());
        let mut f = self;
        TypedSystem {
            hash,
            func: Box::new(move |manager: &mut Manager| {
                let mut s1 = P1::init(manager, hash)?;
                let ptr: *mut Manager = manager;
                let i1 = unsafe { P1::get(&mut s1, ptr)? };
                let result = f(i1);
                P1::apply(&mut s1, manager)?;
                Ok(result)
            }),
        }
    }
}

impl<F, R, P1, P2> IntoTypedSystem<(F, P1, P2)> for F
where
    P1: SystemParam + 'static,
    P2: SystemParam + 'static,
    F: FnMut(P1::Item, P2::Item) -> R + 'static,
    R: 'static,
{
    type Output = R;
    fn into_typed_system(self) -> TypedSystem<R> {
        let hash = mix_hash(mix_hash(hash_of::<F>(), hash_of::<P1>()), hash_of::<P2>());
        let mut f = self;
        TypedSystem {
            hash,
            func: Box::new(move |manager: &mut Manager| {
                let mut s1 = P1::init(manager, hash)?;
                let mut s2 = P2::init(manager, hash)?;
                let ptr: *mut Manager = manager;
                let i1 = unsafe { P1::get(&mut s1, ptr)? };
                let i2 = unsafe { P2::get(&mut s2, ptr)? };
                let result = f(i1, i2);
                P2::apply(&mut s2, manager)?;
                P1::apply(&mut s1, manager)?;
                Ok(result)
            }),
        }
    }
}

impl<F, R, P1, P2, P3> IntoTypedSystem<(F, P1, P2, P3)> for F
where
    P1: SystemParam + 'static,
    P2: SystemParam + 'static,
    P3: SystemParam + 'static,
    F: FnMut(P1::Item, P2::Item, P3::Item) -> R + 'static,
    R: 'static,
{
    type Output = R;
    fn into_typed_system(self) -> TypedSystem<R> {
        let hash = mix_hash(mix_hash(mix_hash(hash_of::<F>(), hash_of::<P1>()), hash_of::<P2>()), hash_of::<P3>());
        let mut f = self;
        TypedSystem {
            hash,
            func: Box::new(move |manager: &mut Manager| {
                let mut s1 = P1::init(manager, hash)?;
                let mut s2 = P2::init(manager, hash)?;
                let mut s3 = P3::init(manager, hash)?;
                let ptr: *mut Manager = manager;
                let i1 = unsafe { P1::get(&mut s1, ptr)? };
                let i2 = unsafe { P2::get(&mut s2, ptr)? };
                let i3 = unsafe { P3::get(&mut s3, ptr)? };
                let result = f(i1, i2, i3);
                P3::apply(&mut s3, manager)?;
                P2::apply(&mut s2, manager)?;
                P1::apply(&mut s1, manager)?;
                Ok(result)
            }),
        }
    }
}

impl<F, R, P1, P2, P3, P4> IntoTypedSystem<(F, P1, P2, P3, P4)> for F
where
    P1: SystemParam + 'static,
    P2: SystemParam + 'static,
    P3: SystemParam + 'static,
    P4: SystemParam + 'static,
    F: FnMut(P1::Item, P2::Item, P3::Item, P4::Item) -> R + 'static,
    R: 'static,
{
    type Output = R;
    fn into_typed_system(self) -> TypedSystem<R> {
        let hash = mix_hash(
            mix_hash(mix_hash(mix_hash(hash_of::<F>(), hash_of::<P1>()), hash_of::<P2>()), hash_of::<P3>()),
            hash_of::<P4>(),
        );
        let mut f = self;
        TypedSystem {
            hash,
            func: Box::new(move |manager: &mut Manager| {
                let mut s1 = P1::init(manager, hash)?;
                let mut s2 = P2::init(manager, hash)?;
                let mut s3 = P3::init(manager, hash)?;
                let mut s4 = P4::init(manager, hash)?;
                let ptr: *mut Manager = manager;
                let i1 = unsafe { P1::get(&mut s1, ptr)? };
                let i2 = unsafe { P2::get(&mut s2, ptr)? };
                let i3 = unsafe { P3::get(&mut s3, ptr)? };
                let i4 = unsafe { P4::get(&mut s4, ptr)? };
                let result = f(i1, i2, i3, i4);
                P4::apply(&mut s4, manager)?;
                P3::apply(&mut s3, manager)?;
                P2::apply(&mut s2, manager)?;
                P1::apply(&mut s1, manager)?;
                Ok(result)
            }),
        }
    }
}

/// Runs `a`, then feeds its output as `b`'s leading argument, propagating
/// `a`'s error without running `b`.
///
/// `b` is a plain closure rather than a full [`SystemParam`]-resolving
/// system: piping into another declarative system would need its own
/// parameter-list resolution interleaved with `a`'s, which this crate does
/// not attempt.
pub fn pipe<A, B, R>(mut a: TypedSystem<A>, mut b: B) -> TypedSystem<R>
where
    A: 'static,
    R: 'static,
    B: FnMut(A, &mut Manager) -> Result<R> + 'static,
{
    let hash = mix_hash(a.hash(), hash_of::<B>());
    TypedSystem {
        hash,
        func: Box::new(move |manager: &mut Manager| {
            let value = a.run(manager)?;
            b(value, manager)
        }),
    }
}

/// Converts a condition's return value into `Result<bool>`, mirroring
/// [`SystemOutput`] for predicates passed to [`run_if`].
pub trait ConditionOutput {
    fn into_condition_output(self) -> Result<bool>;
}

impl ConditionOutput for bool {
    fn into_condition_output(self) -> Result<bool> {
        Ok(self)
    }
}

impl ConditionOutput for Result<bool> {
    fn into_condition_output(self) -> Result<bool> {
        self
    }
}

/// Runs `sys` only if `predicate` returns `true`. Per spec, `predicate` is
/// itself a system — resolved through the same [`SystemParam`] machinery as
/// `sys`, so a condition can read a `Res`, run a `Query`, etc. — rather than
/// a bare closure over `&mut Manager`.
pub fn run_if<P, Marker>(predicate: P, mut sys: TypedSystem<()>) -> TypedSystem<()>
where
    P: IntoCondition<Marker>,
{
    let mut pred_system = predicate.into_condition();
    let hash = mix_hash(pred_system.hash(), sys.hash());
    TypedSystem {
        hash,
        func: Box::new(move |manager: &mut Manager| {
            if pred_system.run(manager)? {
                sys.run(manager)?;
            }
            Ok(())
        }),
    }
}

/// Converts a plain function into a [`TypedSystem<bool>`] condition for
/// [`run_if`]. Implemented for `FnMut(P1, ..., Pn) -> R` (up to four
/// parameters) where every `Pi: SystemParam` and `R: ConditionOutput`
/// (`bool` or `Result<bool>`) — the same resolver shape as [`IntoSystem`],
/// just with a `bool`-flavored output constraint instead of `()`.
pub trait IntoCondition<Marker> {
    fn into_condition(self) -> TypedSystem<bool>;
}

impl<F, R> IntoCondition<(F,)> for F
where
    F: FnMut() -> R + 'static,
    R: ConditionOutput + 'static,
{
    fn into_condition(self) -> TypedSystem<bool> {
        let hash = hash_of::<F>();
        let mut f = self;
        TypedSystem {
            hash,
            func: Box::new(move |_manager: &mut Manager| f().into_condition_output()),
        }
    }
}

impl<F, R, P1> IntoCondition<(F, P1)> for F
where
    P1: SystemParam + 'static,
    F: FnMut(P1::Item) -> R + 'static,
    R: ConditionOutput + 'static,
{
    fn into_condition(self) -> TypedSystem<bool> {
        let hash = mix_hash(hash_of::<F>(), hash_of::<P1>());
        let mut f = self;
        TypedSystem {
            hash,
            func: Box::new(move |manager: &mut Manager| {
                let mut s1 = P1::init(manager, hash)?;
                let ptr: *mut Manager = manager;
                let i1 = unsafe { P1::get(&mut s1, ptr)? };
                let result = f(i1).into_condition_output();
                P1::apply(&mut s1, manager)?;
                result
            }),
        }
    }
}

impl<F, R, P1, P2> IntoCondition<(F, P1, P2)> for F
where
    P1: SystemParam + 'static,
    P2: SystemParam + 'static,
    F: FnMut(P1::Item, P2::Item) -> R + 'static,
    R: ConditionOutput + 'static,
{
    fn into_condition(self) -> TypedSystem<bool> {
        let hash = mix_hash(mix_hash(hash_of::<F>(), hash_of::<P1>()), hash_of::<P2>());
        let mut f = self;
        TypedSystem {
            hash,
            func: Box::new(move |manager: &mut Manager| {
                let mut s1 = P1::init(manager, hash)?;
                let mut s2 = P2::init(manager, hash)?;
                let ptr: *mut Manager = manager;
                let i1 = unsafe { P1::get(&mut s1, ptr)? };
                let i2 = unsafe { P2::get(&mut s2, ptr)? };
                let result = f(i1, i2).into_condition_output();
                P2::apply(&mut s2, manager)?;
                P1::apply(&mut s1, manager)?;
                result
            }),
        }
    }
}

impl<F, R, P1, P2, P3> IntoCondition<(F, P1, P2, P3)> for F
where
    P1: SystemParam + 'static,
    P2: SystemParam + 'static,
    P3: SystemParam + 'static,
    F: FnMut(P1::Item, P2::Item, P3::Item) -> R + 'static,
    R: ConditionOutput + 'static,
{
    fn into_condition(self) -> TypedSystem<bool> {
        let hash = mix_hash(mix_hash(mix_hash(hash_of::<F>(), hash_of::<P1>()), hash_of::<P2>()), hash_of::<P3>());
        let mut f = self;
        TypedSystem {
            hash,
            func: Box::new(move |manager: &mut Manager| {
                let mut s1 = P1::init(manager, hash)?;
                let mut s2 = P2::init(manager, hash)?;
                let mut s3 = P3::init(manager, hash)?;
                let ptr: *mut Manager = manager;
                let i1 = unsafe { P1::get(&mut s1, ptr)? };
                let i2 = unsafe { P2::get(&mut s2, ptr)? };
                let i3 = unsafe { P3::get(&mut s3, ptr)? };
                let result = f(i1, i2, i3).into_condition_output();
                P3::apply(&mut s3, manager)?;
                P2::apply(&mut s2, manager)?;
                P1::apply(&mut s1, manager)?;
                result
            }),
        }
    }
}

impl<F, R, P1, P2, P3, P4> IntoCondition<(F, P1, P2, P3, P4)> for F
where
    P1: SystemParam + 'static,
    P2: SystemParam + 'static,
    P3: SystemParam + 'static,
    P4: SystemParam + 'static,
    F: FnMut(P1::Item, P2::Item, P3::Item, P4::Item) -> R + 'static,
    R: ConditionOutput + 'static,
{
    fn into_condition(self) -> TypedSystem<bool> {
        let hash = mix_hash(
            mix_hash(mix_hash(mix_hash(hash_of::<F>(), hash_of::<P1>()), hash_of::<P2>()), hash_of::<P3>()),
            hash_of::<P4>(),
        );
        let mut f = self;
        TypedSystem {
            hash,
            func: Box::new(move |manager: &mut Manager| {
                let mut s1 = P1::init(manager, hash)?;
                let mut s2 = P2::init(manager, hash)?;
                let mut s3 = P3::init(manager, hash)?;
                let mut s4 = P4::init(manager, hash)?;
                let ptr: *mut Manager = manager;
                let i1 = unsafe { P1::get(&mut s1, ptr)? };
                let i2 = unsafe { P2::get(&mut s2, ptr)? };
                let i3 = unsafe { P3::get(&mut s3, ptr)? };
                let i4 = unsafe { P4::get(&mut s4, ptr)? };
                let result = f(i1, i2, i3, i4).into_condition_output();
                P4::apply(&mut s4, manager)?;
                P3::apply(&mut s3, manager)?;
                P2::apply(&mut s2, manager)?;
                P1::apply(&mut s1, manager)?;
                result
            }),
        }
    }
}

/// Runs every cached system in `handles` in order, stopping at the first
/// error.
pub fn chain(manager: &mut Manager, handles: &[SystemHandle]) -> Result<()> {
    for handle in handles {
        manager.run_system(*handle)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Score(u32);

    #[test]
    fn resource_param_round_trips() {
        let mut manager = Manager::new();
        manager.resources_mut().add_resource(Score(0)).unwrap();

        fn bump(mut score: ResMut<Score>) {
            score.0 += 1;
        }
        let handle = manager.add_system(bump);
        manager.run_system(handle).unwrap();
        manager.run_system(handle).unwrap();
        assert_eq!(manager.resources().get_resource::<Score>().unwrap().0, 2);
    }

    #[test]
    fn local_param_persists_across_cached_runs() {
        let mut manager = Manager::new();
        fn count_calls(mut calls: Local<u32>) {
            *calls += 1;
        }
        let handle = manager.add_system(count_calls);
        manager.run_system(handle).unwrap();
        manager.run_system(handle).unwrap();
        manager.run_system(handle).unwrap();
    }

    #[test]
    fn idempotent_registration_returns_same_handle() {
        let mut manager = Manager::new();
        fn noop() {}
        let a = manager.add_system(noop);
        let b = manager.add_system(noop);
        assert_eq!(a, b);
    }

    #[test]
    fn pipe_feeds_output_forward() {
        let mut manager = Manager::new();
        fn produce() -> u32 {
            41
        }
        let mut piped = pipe(produce.into_typed_system(), |value: u32, _m: &mut Manager| -> Result<u32> {
            Ok(value + 1)
        });
        assert_eq!(piped.run(&mut manager).unwrap(), 42);
    }

    #[test]
    fn run_if_skips_system_when_predicate_false() {
        let mut manager = Manager::new();
        manager.resources_mut().add_resource(Score(0)).unwrap();
        fn bump(mut score: ResMut<Score>) {
            score.0 += 1;
        }
        fn never(_gate: Res<Score>) -> bool {
            false
        }
        let mut gated = run_if(never, bump.into_system());
        gated.run(&mut manager).unwrap();
        assert_eq!(manager.resources().get_resource::<Score>().unwrap().0, 0);
    }

    #[test]
    fn run_if_predicate_reads_a_resource() {
        let mut manager = Manager::new();
        manager.resources_mut().add_resource(Score(5)).unwrap();
        fn bump(mut score: ResMut<Score>) {
            score.0 += 1;
        }
        fn score_is_five(score: Res<Score>) -> bool {
            score.0 == 5
        }
        let mut gated = run_if(score_is_five, bump.into_system());
        gated.run(&mut manager).unwrap();
        assert_eq!(manager.resources().get_resource::<Score>().unwrap().0, 6);
    }
}
