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

//! Signature-matching iteration over archetypes.
//!
//! A query is parameterized by an include descriptor (a tuple of fetch
//! items — `&T`, `&mut T`, `Option<&T>`, `Option<&mut T>`, or [`EntityId`])
//! and an optional exclude list. `Query` borrows the [`ArchetypeStore`]
//! mutably for its whole lifetime, which is what makes two overlapping
//! mutable queries a compile error rather than a runtime contract: the
//! aliasing rule in the data model falls directly out of ordinary borrow
//! checking instead of being merely documented.

use std::ptr::NonNull;

use smallvec::SmallVec;

use crate::archetype::Archetype;
use crate::component::Component;
use crate::entity::EntityId;
use crate::reflect::{type_hash, TypeHash};
use crate::store::ArchetypeStore;

/// One item in a query's include descriptor.
///
/// # Safety
/// `fetch` must only be called with a `row` that is in-bounds for every
/// column this item touches, and the returned lifetime must not outlive the
/// borrow of the store the archetype pointer came from.
pub unsafe trait Fetch<'w> {
    type Item: 'w;

    /// The component this item requires be present, if any (`None` for
    /// `EntityId` and for optional fields, which never gate matching).
    fn required_hash() -> Option<TypeHash>;

    unsafe fn fetch(archetype: &Archetype, row: usize) -> Self::Item;
}

unsafe impl<'w, T: Component> Fetch<'w> for &'w T {
    type Item = &'w T;

    fn required_hash() -> Option<TypeHash> {
        Some(type_hash::<T>())
    }

    unsafe fn fetch(archetype: &Archetype, row: usize) -> Self::Item {
        let ptr = archetype.get::<T>(row).expect("column present (matched)") as *const T;
        unsafe { &*ptr }
    }
}

unsafe impl<'w, T: Component> Fetch<'w> for &'w mut T {
    type Item = &'w mut T;

    fn required_hash() -> Option<TypeHash> {
        Some(type_hash::<T>())
    }

    unsafe fn fetch(archetype: &Archetype, row: usize) -> Self::Item {
        let hash = type_hash::<T>();
        let ptr = unsafe { archetype.column_ptr_mut(hash, row) } as *mut T;
        unsafe { &mut *ptr }
    }
}

unsafe impl<'w, T: Component> Fetch<'w> for Option<&'w T> {
    type Item = Option<&'w T>;

    fn required_hash() -> Option<TypeHash> {
        None
    }

    unsafe fn fetch(archetype: &Archetype, row: usize) -> Self::Item {
        if archetype.has_column(type_hash::<T>()) {
            Some(unsafe { <&'w T as Fetch<'w>>::fetch(archetype, row) })
        } else {
            None
        }
    }
}

unsafe impl<'w, T: Component> Fetch<'w> for Option<&'w mut T> {
    type Item = Option<&'w mut T>;

    fn required_hash() -> Option<TypeHash> {
        None
    }

    unsafe fn fetch(archetype: &Archetype, row: usize) -> Self::Item {
        if archetype.has_column(type_hash::<T>()) {
            Some(unsafe { <&'w mut T as Fetch<'w>>::fetch(archetype, row) })
        } else {
            None
        }
    }
}

unsafe impl<'w> Fetch<'w> for EntityId {
    type Item = EntityId;

    fn required_hash() -> Option<TypeHash> {
        None
    }

    unsafe fn fetch(archetype: &Archetype, row: usize) -> Self::Item {
        archetype.entities()[row]
    }
}

/// A query's include descriptor: a single [`Fetch`] item or a tuple of them.
pub trait QueryData<'w> {
    type Item: 'w;

    fn required_hashes() -> SmallVec<[TypeHash; 8]>;

    unsafe fn fetch(archetype: &Archetype, row: usize) -> Self::Item;
}

macro_rules! impl_query_data {
    ($($T:ident),+) => {
        impl<'w, $($T: Fetch<'w>),+> QueryData<'w> for ($($T,)+) {
            type Item = ($($T::Item,)+);

            fn required_hashes() -> SmallVec<[TypeHash; 8]> {
                let mut hashes = SmallVec::new();
                $(if let Some(h) = $T::required_hash() { hashes.push(h); })+
                hashes
            }

            #[allow(non_snake_case)]
            unsafe fn fetch(archetype: &Archetype, row: usize) -> Self::Item {
                ($(unsafe { $T::fetch(archetype, row) },)+)
            }
        }
    };
}

impl_query_data!(A);
impl_query_data!(A, B);
impl_query_data!(A, B, C);
impl_query_data!(A, B, C, D);
impl_query_data!(A, B, C, D, E);
impl_query_data!(A, B, C, D, E, F);
impl_query_data!(A, B, C, D, E, F, G);
impl_query_data!(A, B, C, D, E, F, G, H);

/// Exclude-only filter list: entities carrying any of these types are
/// skipped regardless of what the include descriptor asks for.
pub trait ExcludeFilter {
    fn excluded_hashes() -> SmallVec<[TypeHash; 4]>;
}

impl ExcludeFilter for () {
    fn excluded_hashes() -> SmallVec<[TypeHash; 4]> {
        SmallVec::new()
    }
}

/// Marker for a single excluded component type, used as `Query<Q, Without<T>>`.
pub struct Without<T>(std::marker::PhantomData<T>);

impl<T: Component> ExcludeFilter for Without<T> {
    fn excluded_hashes() -> SmallVec<[TypeHash; 4]> {
        let mut v = SmallVec::new();
        v.push(type_hash::<T>());
        v
    }
}

macro_rules! impl_exclude_tuple {
    ($($T:ident),+) => {
        impl<$($T: Component),+> ExcludeFilter for ($(Without<$T>,)+) {
            fn excluded_hashes() -> SmallVec<[TypeHash; 4]> {
                let mut v = SmallVec::new();
                $(v.push(type_hash::<$T>());)+
                v
            }
        }
    };
}

impl_exclude_tuple!(A);
impl_exclude_tuple!(A, B);
impl_exclude_tuple!(A, B, C);

fn archetype_matches(archetype: &Archetype, required: &[TypeHash], excluded: &[TypeHash]) -> bool {
    required.iter().all(|h| archetype.has_column(*h)) && excluded.iter().all(|h| !archetype.has_column(*h))
}

/// A single-pass iterator over every row of every archetype matching `Q`'s
/// include descriptor and `X`'s exclude list.
///
/// Mutating the content of yielded references is the intended use; structurally
/// mutating the store (spawning, despawning, adding/removing components) while
/// a `Query` is alive is undefined behavior. The borrow checker enforces the
/// "alive at the same time" half of that for free, since `Query` holds
/// `&'w mut ArchetypeStore` for its whole lifetime.
pub struct Query<'w, Q, X = ()>
where
    Q: QueryData<'w>,
    X: ExcludeFilter,
{
    matching_archetypes: Vec<NonNull<Archetype>>,
    archetype_cursor: usize,
    row_cursor: usize,
    _store: std::marker::PhantomData<&'w mut ArchetypeStore>,
    _data: std::marker::PhantomData<(Q, X)>,
}

impl<'w, Q, X> Query<'w, Q, X>
where
    Q: QueryData<'w>,
    X: ExcludeFilter,
{
    pub fn new(store: &'w mut ArchetypeStore) -> Self {
        let required = Q::required_hashes();
        let excluded = X::excluded_hashes();
        let matching_archetypes = store
            .archetypes()
            .iter()
            .filter(|a| archetype_matches(a, &required, &excluded))
            .map(NonNull::from)
            .collect();
        Self {
            matching_archetypes,
            archetype_cursor: 0,
            row_cursor: 0,
            _store: std::marker::PhantomData,
            _data: std::marker::PhantomData,
        }
    }

    pub fn has_next(&self) -> bool {
        self.archetype_cursor < self.matching_archetypes.len()
    }

    /// Total number of rows across every matching archetype, computed eagerly.
    pub fn count_matches(&self) -> usize {
        // SAFETY: archetype pointers are valid for 'w, the store's borrow lifetime.
        self.matching_archetypes
            .iter()
            .map(|a| unsafe { a.as_ref().len() })
            .sum()
    }
}

impl<'w, Q, X> Iterator for Query<'w, Q, X>
where
    Q: QueryData<'w>,
    X: ExcludeFilter,
{
    type Item = Q::Item;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let arch_ptr = *self.matching_archetypes.get(self.archetype_cursor)?;
            // SAFETY: `arch_ptr` was derived from `store`, which this `Query`
            // borrows mutably for its entire lifetime `'w`; no other access
            // to the store (or its archetypes) can happen concurrently.
            let archetype = unsafe { arch_ptr.as_ref() };
            if self.row_cursor >= archetype.len() {
                self.archetype_cursor += 1;
                self.row_cursor = 0;
                continue;
            }
            let row = self.row_cursor;
            self.row_cursor += 1;
            return Some(unsafe { Q::fetch(archetype, row) });
        }
    }
}

/// Run a query, requiring it to match exactly one row. Surfaces
/// `SingleFoundNoMatches`/`SingleFoundMultipleMatches` on cardinality
/// violations instead of silently picking one.
pub fn single<'w, Q, X>(store: &'w mut ArchetypeStore) -> crate::error::Result<Q::Item>
where
    Q: QueryData<'w>,
    X: ExcludeFilter,
{
    use crate::error::EcsError;
    let mut query: Query<'w, Q, X> = Query::new(store);
    let first = query.next().ok_or(EcsError::SingleFoundNoMatches)?;
    if query.next().is_some() {
        return Err(EcsError::SingleFoundMultipleMatches);
    }
    Ok(first)
}
