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

//! Component schemas, typed field columns, and the component registry.
//!
//! Components are runtime-described records: an ordered list of named
//! numeric fields. A schema with zero fields is a tag; it participates in
//! archetype signatures but owns no storage. Field values cross the public
//! API as f64, which represents every supported field type exactly.

use crate::error::{EcsError, Result};

/// Initial slot capacity of a registry column.
const INITIAL_SLOT_CAPACITY: usize = 64;

/// Closed set of numeric field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    F32,
    F64,
    I8,
    I16,
    I32,
    U8,
    U16,
    U32,
}

/// One named field of a component schema.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub name: String,
    pub ty: FieldType,
}

/// Ordered, named field list describing one component.
#[derive(Debug, Clone)]
pub struct ComponentSchema {
    name: String,
    fields: Vec<FieldSchema>,
}

impl ComponentSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Tag schema: participates in signatures, owns no storage.
    pub fn tag(name: impl Into<String>) -> Self {
        Self::new(name)
    }

    /// Append a field (builder style).
    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.push(FieldSchema {
            name: name.into(),
            ty,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn is_tag(&self) -> bool {
        self.fields.is_empty()
    }

    /// Look up a field index by name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// Dense component identifier, assigned in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub u32);

impl ComponentId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Dispatch a uniform operation across every column variant.
macro_rules! column_dispatch {
    ($self:expr, $vec:ident => $body:expr) => {
        match $self {
            Column::F32($vec) => $body,
            Column::F64($vec) => $body,
            Column::I8($vec) => $body,
            Column::I16($vec) => $body,
            Column::I32($vec) => $body,
            Column::U8($vec) => $body,
            Column::U16($vec) => $body,
            Column::U32($vec) => $body,
        }
    };
}

/// Pairwise dispatch for two columns that must share a field type.
macro_rules! column_dispatch_pair {
    ($dst:expr, $src:expr, $d:ident, $s:ident => $body:expr) => {
        match ($dst, $src) {
            (Column::F32($d), Column::F32($s)) => $body,
            (Column::F64($d), Column::F64($s)) => $body,
            (Column::I8($d), Column::I8($s)) => $body,
            (Column::I16($d), Column::I16($s)) => $body,
            (Column::I32($d), Column::I32($s)) => $body,
            (Column::U8($d), Column::U8($s)) => $body,
            (Column::U16($d), Column::U16($s)) => $body,
            (Column::U32($d), Column::U32($s)) => $body,
            _ => unreachable!("column field type mismatch"),
        }
    };
}

macro_rules! typed_accessors {
    ($imm:ident, $mut_:ident, $variant:ident, $ty:ty) => {
        pub fn $imm(&self) -> Option<&[$ty]> {
            match self {
                Column::$variant(v) => Some(v),
                _ => None,
            }
        }

        pub fn $mut_(&mut self) -> Option<&mut [$ty]> {
            match self {
                Column::$variant(v) => Some(v),
                _ => None,
            }
        }
    };
}

/// Typed storage for one field of one component.
///
/// Archetypes keep one of these per field, row-aligned with `entity_ids`.
/// The registry keeps one per field indexed directly by entity slot.
#[derive(Debug, Clone)]
pub enum Column {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl Column {
    pub fn new(ty: FieldType) -> Self {
        Self::with_capacity(ty, 0)
    }

    pub fn with_capacity(ty: FieldType, capacity: usize) -> Self {
        match ty {
            FieldType::F32 => Column::F32(Vec::with_capacity(capacity)),
            FieldType::F64 => Column::F64(Vec::with_capacity(capacity)),
            FieldType::I8 => Column::I8(Vec::with_capacity(capacity)),
            FieldType::I16 => Column::I16(Vec::with_capacity(capacity)),
            FieldType::I32 => Column::I32(Vec::with_capacity(capacity)),
            FieldType::U8 => Column::U8(Vec::with_capacity(capacity)),
            FieldType::U16 => Column::U16(Vec::with_capacity(capacity)),
            FieldType::U32 => Column::U32(Vec::with_capacity(capacity)),
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            Column::F32(_) => FieldType::F32,
            Column::F64(_) => FieldType::F64,
            Column::I8(_) => FieldType::I8,
            Column::I16(_) => FieldType::I16,
            Column::I32(_) => FieldType::I32,
            Column::U8(_) => FieldType::U8,
            Column::U16(_) => FieldType::U16,
            Column::U32(_) => FieldType::U32,
        }
    }

    pub fn len(&self) -> usize {
        column_dispatch!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        column_dispatch!(self, v => v.is_empty())
    }

    /// Append one zeroed row.
    pub fn push_default(&mut self) {
        column_dispatch!(self, v => v.push(Default::default()))
    }

    pub fn swap_remove(&mut self, row: usize) {
        column_dispatch!(self, v => {
            v.swap_remove(row);
        })
    }

    pub fn truncate(&mut self, len: usize) {
        column_dispatch!(self, v => v.truncate(len))
    }

    pub fn reserve(&mut self, additional: usize) {
        column_dispatch!(self, v => v.reserve(additional))
    }

    /// Grow to at least `len` slots, zero-filling new ones.
    pub fn grow_to(&mut self, len: usize) {
        column_dispatch!(self, v => {
            if v.len() < len {
                v.resize(len, Default::default());
            }
        })
    }

    /// Read the value at `index` widened to f64.
    pub fn get(&self, index: usize) -> f64 {
        match self {
            Column::F32(v) => f64::from(v[index]),
            Column::F64(v) => v[index],
            Column::I8(v) => f64::from(v[index]),
            Column::I16(v) => f64::from(v[index]),
            Column::I32(v) => f64::from(v[index]),
            Column::U8(v) => f64::from(v[index]),
            Column::U16(v) => f64::from(v[index]),
            Column::U32(v) => f64::from(v[index]),
        }
    }

    /// Write the value at `index`, narrowing from f64.
    pub fn set(&mut self, index: usize, value: f64) {
        match self {
            Column::F32(v) => v[index] = value as f32,
            Column::F64(v) => v[index] = value,
            Column::I8(v) => v[index] = value as i8,
            Column::I16(v) => v[index] = value as i16,
            Column::I32(v) => v[index] = value as i32,
            Column::U8(v) => v[index] = value as u8,
            Column::U16(v) => v[index] = value as u16,
            Column::U32(v) => v[index] = value as u32,
        }
    }

    /// Append one value, narrowing from f64.
    pub fn push_value(&mut self, value: f64) {
        match self {
            Column::F32(v) => v.push(value as f32),
            Column::F64(v) => v.push(value),
            Column::I8(v) => v.push(value as i8),
            Column::I16(v) => v.push(value as i16),
            Column::I32(v) => v.push(value as i32),
            Column::U8(v) => v.push(value as u8),
            Column::U16(v) => v.push(value as u16),
            Column::U32(v) => v.push(value as u32),
        }
    }

    /// Append `count` copies of one value (batch broadcast).
    pub fn extend_value(&mut self, value: f64, count: usize) {
        match self {
            Column::F32(v) => v.extend(std::iter::repeat(value as f32).take(count)),
            Column::F64(v) => v.extend(std::iter::repeat(value).take(count)),
            Column::I8(v) => v.extend(std::iter::repeat(value as i8).take(count)),
            Column::I16(v) => v.extend(std::iter::repeat(value as i16).take(count)),
            Column::I32(v) => v.extend(std::iter::repeat(value as i32).take(count)),
            Column::U8(v) => v.extend(std::iter::repeat(value as u8).take(count)),
            Column::U16(v) => v.extend(std::iter::repeat(value as u16).take(count)),
            Column::U32(v) => v.extend(std::iter::repeat(value as u32).take(count)),
        }
    }

    /// Copy `src[src_row]` into `self[dst_row]` without narrowing.
    ///
    /// Both columns must back the same field type; archetype moves only
    /// pair columns of shared components.
    pub fn copy_from(&mut self, src: &Column, src_row: usize, dst_row: usize) {
        column_dispatch_pair!(self, src, d, s => d[dst_row] = s[src_row])
    }

    /// Append `src[0..count]` (bulk archetype-to-archetype move).
    pub fn append_from(&mut self, src: &Column, count: usize) {
        column_dispatch_pair!(self, src, d, s => d.extend_from_slice(&s[..count]))
    }

    /// Poison the value at `index`: NaN for floats, all bits set for ints.
    pub fn poison(&mut self, index: usize) {
        match self {
            Column::F32(v) => v[index] = f32::NAN,
            Column::F64(v) => v[index] = f64::NAN,
            Column::I8(v) => v[index] = -1,
            Column::I16(v) => v[index] = -1,
            Column::I32(v) => v[index] = -1,
            Column::U8(v) => v[index] = u8::MAX,
            Column::U16(v) => v[index] = u16::MAX,
            Column::U32(v) => v[index] = u32::MAX,
        }
    }

    typed_accessors!(as_f32, as_f32_mut, F32, f32);
    typed_accessors!(as_f64, as_f64_mut, F64, f64);
    typed_accessors!(as_i8, as_i8_mut, I8, i8);
    typed_accessors!(as_i16, as_i16_mut, I16, i16);
    typed_accessors!(as_i32, as_i32_mut, I32, i32);
    typed_accessors!(as_u8, as_u8_mut, U8, u8);
    typed_accessors!(as_u16, as_u16_mut, U16, u16);
    typed_accessors!(as_u32, as_u32_mut, U32, u32);
}

/// Component registry: schemas plus slot-indexed staging columns.
///
/// The staging columns hold the last value written per entity slot on the
/// add path; archetype columns remain the authoritative storage. Slots are
/// poisoned when their entity despawns.
pub struct ComponentRegistry {
    schemas: Vec<ComponentSchema>,
    columns: Vec<Vec<Column>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self {
            schemas: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Register a schema and allocate its staging columns.
    pub fn register(&mut self, schema: ComponentSchema) -> ComponentId {
        let id = ComponentId(self.schemas.len() as u32);
        let columns = schema
            .fields()
            .iter()
            .map(|f| {
                let mut column = Column::new(f.ty);
                column.grow_to(INITIAL_SLOT_CAPACITY);
                column
            })
            .collect();
        self.schemas.push(schema);
        self.columns.push(columns);
        id
    }

    /// Register a tag (empty schema).
    pub fn register_tag(&mut self, name: impl Into<String>) -> ComponentId {
        self.register(ComponentSchema::tag(name))
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        id.index() < self.schemas.len()
    }

    pub fn schema(&self, id: ComponentId) -> Result<&ComponentSchema> {
        self.schemas
            .get(id.index())
            .ok_or(EcsError::ComponentNotFound)
    }

    /// Grow every staging column to hold at least `n` slots.
    pub fn ensure_capacity(&mut self, n: usize) {
        for columns in &mut self.columns {
            for column in columns {
                if column.len() < n {
                    let doubled = column.len().max(1) * 2;
                    column.grow_to(doubled.max(n));
                }
            }
        }
    }

    /// Stage all fields of `component` for `slot`.
    ///
    /// Missing values default to zero; extras are ignored. Tag components
    /// accept any values slice (there is nothing to store).
    pub fn set(&mut self, component: ComponentId, slot: u32, values: &[f64]) -> Result<()> {
        let field_count = self.schema(component)?.field_count();
        for field in 0..field_count {
            let value = values.get(field).copied().unwrap_or(0.0);
            self.write(component, slot, field, value);
        }
        Ok(())
    }

    /// Stage one field of `component` for `slot`.
    pub fn set_field(
        &mut self,
        component: ComponentId,
        slot: u32,
        field: usize,
        value: f64,
    ) -> Result<()> {
        self.check_field(component, field)?;
        self.write(component, slot, field, value);
        Ok(())
    }

    /// Read one staged field. Slots never written read as zero.
    pub fn get_field(&self, component: ComponentId, slot: u32, field: usize) -> Result<f64> {
        self.check_field(component, field)?;
        let column = &self.columns[component.index()][field];
        if (slot as usize) < column.len() {
            Ok(column.get(slot as usize))
        } else {
            Ok(0.0)
        }
    }

    /// Direct access to one staging column.
    pub fn column(&self, component: ComponentId, field: usize) -> Result<&Column> {
        self.check_field(component, field)?;
        Ok(&self.columns[component.index()][field])
    }

    /// Poison every staged field of `component` at `slot`.
    ///
    /// Hygiene for despawned entities; correctness never depends on it.
    pub fn clear(&mut self, component: ComponentId, slot: u32) {
        if let Some(columns) = self.columns.get_mut(component.index()) {
            for column in columns {
                if (slot as usize) < column.len() {
                    column.poison(slot as usize);
                }
            }
        }
    }

    fn check_field(&self, component: ComponentId, field: usize) -> Result<()> {
        let schema = self.schema(component)?;
        if field >= schema.field_count() {
            return Err(EcsError::FieldOutOfBounds { component, field });
        }
        Ok(())
    }

    fn write(&mut self, component: ComponentId, slot: u32, field: usize, value: f64) {
        let column = &mut self.columns[component.index()][field];
        if (slot as usize) >= column.len() {
            let doubled = column.len().max(1) * 2;
            column.grow_to(doubled.max(slot as usize + 1));
        }
        column.set(slot as usize, value);
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
