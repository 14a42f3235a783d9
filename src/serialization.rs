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

//! The component byte format: a hand-rolled, little-endian, versionless
//! wire encoding for component bytes and entity graphs.
//!
//! ```text
//! component_instance := u64 hash || u64 size || size×u8 data
//! entity_instance    := u64 component_count || component_count × component_instance
//!                     || u64 ref_count         || ref_count × entity_instance   (recursive)
//! component_stream   := u64 count || count × component_instance
//! ```
//!
//! Alignment is not preserved in the stream; a reader must align before
//! interpreting `data` as a typed value. `hash` is the 64-bit type-name hash
//! from [`crate::reflect::type_hash`]; a reader that doesn't recognize it
//! treats the component as opaque. There is no version byte — clients
//! sharing a binary must share the same canonical type naming to
//! interchange data.
//!
//! Entity references inside a component are **not** detected by probing the
//! bytes for anything that looks like a live [`EntityId`] — that is
//! structurally unsafe, since arbitrary component data can coincidentally
//! look like one. Instead, a caller wanting `entity_instance`'s recursive
//! `refs` populated supplies an explicit resolver (e.g. backed by
//! [`crate::relations::RelationManager::get_children`]) that names which
//! entities a given entity points to.

use crate::entity::EntityId;
use crate::error::{EcsError, Result};
use crate::reflect::TypeHash;
use crate::world::{ComponentInstance, World};

fn write_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn read_u64(&mut self) -> Result<u64> {
        let end = self.pos + 8;
        let slice = self.bytes.get(self.pos..end).ok_or(EcsError::UnexpectedEndOfStream)?;
        self.pos = end;
        Ok(u64::from_le_bytes(slice.try_into().unwrap()))
    }

    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let end = self.pos + len;
        let slice = self.bytes.get(self.pos..end).ok_or(EcsError::UnexpectedEndOfStream)?;
        self.pos = end;
        Ok(slice.to_vec())
    }
}

/// Append one `component_instance` to `out`.
pub fn write_component_instance(out: &mut Vec<u8>, hash: TypeHash, data: &[u8]) {
    write_u64(out, hash);
    write_u64(out, data.len() as u64);
    out.extend_from_slice(data);
}

fn read_component_instance(reader: &mut Reader) -> Result<ComponentInstance> {
    let hash = reader.read_u64()?;
    let size = reader.read_u64()? as usize;
    let bytes = reader.read_bytes(size)?;
    Ok(ComponentInstance { hash, bytes })
}

/// Encode a `component_stream`: every component currently on `entity`, in
/// [`World::get_all_components`] order. Fails with `EntityNotAlive` if the
/// entity has no archetype.
pub fn write_component_stream(world: &World, entity: EntityId) -> Result<Vec<u8>> {
    let components = world.get_all_components(entity).ok_or(EcsError::EntityNotAlive)?;
    let mut out = Vec::new();
    write_u64(&mut out, components.len() as u64);
    for c in &components {
        write_component_instance(&mut out, c.hash, &c.bytes);
    }
    Ok(out)
}

/// Decode a `component_stream` produced by [`write_component_stream`].
pub fn read_component_stream(bytes: &[u8]) -> Result<Vec<ComponentInstance>> {
    let mut reader = Reader::new(bytes);
    let count = reader.read_u64()? as usize;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(read_component_instance(&mut reader)?);
    }
    Ok(out)
}

/// A decoded or to-be-encoded `entity_instance`: one entity's components
/// plus zero or more referenced entities, recursively.
#[derive(Debug, Clone, Default)]
pub struct EntityInstance {
    pub components: Vec<ComponentInstance>,
    pub refs: Vec<EntityInstance>,
}

impl EntityInstance {
    pub fn write(&self, out: &mut Vec<u8>) {
        write_u64(out, self.components.len() as u64);
        for c in &self.components {
            write_component_instance(out, c.hash, &c.bytes);
        }
        write_u64(out, self.refs.len() as u64);
        for r in &self.refs {
            r.write(out);
        }
    }

    pub fn read(reader_bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(reader_bytes);
        Self::read_from(&mut reader)
    }

    fn read_from(reader: &mut Reader) -> Result<Self> {
        let component_count = reader.read_u64()? as usize;
        let mut components = Vec::with_capacity(component_count);
        for _ in 0..component_count {
            components.push(read_component_instance(reader)?);
        }
        let ref_count = reader.read_u64()? as usize;
        let mut refs = Vec::with_capacity(ref_count);
        for _ in 0..ref_count {
            refs.push(Self::read_from(reader)?);
        }
        Ok(Self { components, refs })
    }
}

/// Build an [`EntityInstance`] for `entity`, recursing into whatever
/// entities `resolve_refs` names for each entity visited. `resolve_refs` is
/// the explicit opt-in this format requires in place of probing component
/// bytes for anything that looks like an [`EntityId`] — callers that don't
/// track entity-typed fields anywhere can pass `|_| Vec::new()` and get a
/// flat, ref-less snapshot.
pub fn build_entity_instance(
    world: &World,
    entity: EntityId,
    resolve_refs: &impl Fn(EntityId) -> Vec<EntityId>,
) -> Result<EntityInstance> {
    let components = world.get_all_components(entity).ok_or(EcsError::EntityNotAlive)?;
    let refs = resolve_refs(entity)
        .into_iter()
        .map(|child| build_entity_instance(world, child, resolve_refs))
        .collect::<Result<Vec<_>>>()?;
    Ok(EntityInstance { components, refs })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_instance_round_trips() {
        let mut out = Vec::new();
        write_component_instance(&mut out, 0xABCD, &[1, 2, 3, 4]);
        let mut reader = Reader::new(&out);
        let decoded = read_component_instance(&mut reader).unwrap();
        assert_eq!(decoded.hash, 0xABCD);
        assert_eq!(decoded.bytes, vec![1, 2, 3, 4]);
    }

    #[test]
    fn component_stream_round_trips_a_multi_component_entity() {
        let mut world = World::new();
        let e = EntityId::new(0, 0);
        #[derive(Clone, Copy)]
        struct A(u32);
        #[derive(Clone, Copy)]
        struct B(f32);
        world.add(e, (A(7), B(1.5))).unwrap();

        let encoded = write_component_stream(&world, e).unwrap();
        let decoded = read_component_stream(&encoded).unwrap();
        assert_eq!(decoded.len(), 2);
    }

    #[test]
    fn truncated_stream_reports_unexpected_end_of_stream() {
        let bytes = 3u64.to_le_bytes().to_vec();
        let err = read_component_stream(&bytes).unwrap_err();
        assert!(matches!(err, EcsError::UnexpectedEndOfStream));
    }

    #[test]
    fn entity_instance_recurses_through_explicit_refs_only() {
        let mut world = World::new();
        let parent = EntityId::new(0, 0);
        let child = EntityId::new(1, 0);
        #[derive(Clone, Copy)]
        struct Marker;
        world.add(parent, (Marker,)).unwrap();
        world.add(child, (Marker,)).unwrap();

        let instance = build_entity_instance(&world, parent, &|e| {
            if e == parent { vec![child] } else { Vec::new() }
        })
        .unwrap();

        assert_eq!(instance.components.len(), 1);
        assert_eq!(instance.refs.len(), 1);
        assert_eq!(instance.refs[0].components.len(), 1);
        assert!(instance.refs[0].refs.is_empty());

        let mut bytes = Vec::new();
        instance.write(&mut bytes);
        let decoded = EntityInstance::read(&bytes).unwrap();
        assert_eq!(decoded.refs.len(), 1);
    }
}
