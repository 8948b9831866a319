//! Closed registries used to re-attach decoded records to live objects.
//!
//! Nothing is ever loaded by name at decode time. Compensable interfaces and methods, and the
//! resource descriptors a coordinator can talk to, are registered under stable string keys at
//! startup; decoding an archive only looks those keys up.

use crate::archive::{MethodRef, ResourceDescriptor};
use ahash::RandomState;
use std::collections::HashMap;

/// Resolves a stored resource identifier back to a live descriptor.
pub trait ResourceDescriptorRegistry {
    /// Returns `None` when the resource is not known to this process. An unknown resource is
    /// not a decode fault; a known resource of a different type is.
    fn resolve(&self, identifier: &str) -> Option<ResourceDescriptor>;
}

/// Resolves a stored compensable method reference.
pub trait MethodRegistry {
    fn resolve(&self, interface: &str, signature: &str) -> Option<MethodRef>;
}

/// A [`MethodRegistry`] populated once at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticMethodRegistry {
    methods: HashMap<(String, String), MethodRef, RandomState>,
}

impl StaticMethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `signature` on `interface`. Registering the same pair twice is a no-op.
    pub fn register(&mut self, interface: impl Into<String>, signature: impl Into<String>) {
        let method = MethodRef::new(interface, signature);
        self.methods
            .entry((method.interface.clone(), method.signature.clone()))
            .or_insert(method);
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl MethodRegistry for StaticMethodRegistry {
    fn resolve(&self, interface: &str, signature: &str) -> Option<MethodRef> {
        self.methods
            .get(&(interface.to_string(), signature.to_string()))
            .cloned()
    }
}

/// A [`ResourceDescriptorRegistry`] populated once at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticDescriptorRegistry {
    descriptors: HashMap<String, ResourceDescriptor, RandomState>,
}

impl StaticDescriptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: ResourceDescriptor) {
        self.descriptors
            .insert(descriptor.identifier.clone(), descriptor);
    }
}

impl ResourceDescriptorRegistry for StaticDescriptorRegistry {
    fn resolve(&self, identifier: &str) -> Option<ResourceDescriptor> {
        self.descriptors.get(identifier).cloned()
    }
}
