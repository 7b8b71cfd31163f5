//! Entity trait and field references
//!
//! An entity is a serde struct plus declarative metadata. Field
//! references are registered tokens that builders resolve to backend
//! column names through the schema registry, so filter expressions stay
//! typo-safe without any runtime reflection.

use crate::error::{MapperError, Result};
use crate::schema::descriptor::{CollectionMeta, FieldMeta};
use crate::schema::registry::SchemaRegistry;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// A struct persisted to a vector collection.
///
/// `collection()` and `fields()` return the declarative metadata the
/// conversion engine consumes; both must be stable across calls.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    fn collection() -> CollectionMeta;
    fn fields() -> Vec<FieldMeta>;
}

/// Typed reference to one field of `E`.
///
/// Declared as consts alongside the entity so call sites read as
/// `Face::NAME` rather than string literals.
pub struct FieldRef<E> {
    accessor: &'static str,
    _marker: PhantomData<fn() -> E>,
}

impl<E> FieldRef<E> {
    pub const fn new(accessor: &'static str) -> Self {
        Self {
            accessor,
            _marker: PhantomData,
        }
    }

    pub fn accessor(&self) -> &'static str {
        self.accessor
    }
}

impl<E> Clone for FieldRef<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for FieldRef<E> {}

impl<E> std::fmt::Debug for FieldRef<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FieldRef").field(&self.accessor).finish()
    }
}

/// Anything that names a field of `E` in a filter or output list.
///
/// Plain strings pass through as raw column names; `FieldRef` tokens
/// resolve through the registry and pick up backend renames.
pub trait FieldKey<E: Entity> {
    fn resolve(&self, registry: &SchemaRegistry) -> Result<String>;
}

impl<E: Entity> FieldKey<E> for FieldRef<E> {
    fn resolve(&self, registry: &SchemaRegistry) -> Result<String> {
        registry.resolve::<E>(*self)
    }
}

impl<E: Entity> FieldKey<E> for &str {
    fn resolve(&self, _registry: &SchemaRegistry) -> Result<String> {
        if self.trim().is_empty() {
            return Err(MapperError::Validation(
                "Field name must not be blank".to_string(),
            ));
        }
        Ok(self.to_string())
    }
}

impl<E: Entity> FieldKey<E> for String {
    fn resolve(&self, registry: &SchemaRegistry) -> Result<String> {
        <&str as FieldKey<E>>::resolve(&self.as_str(), registry)
    }
}
