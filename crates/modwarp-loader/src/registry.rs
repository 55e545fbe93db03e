//! The mod registry
//!
//! One registry object is constructed per process and passed by reference
//! to the resolver and orchestrator; there are no ambient statics. It owns
//! every descriptor for the remainder of the process, keeps the activation
//! order, and exposes the read-only query surface used by outer layers
//! (mod list UIs and the like).

use crate::descriptor::{DescriptorStatus, ModDescriptor};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Ordered registry of every known descriptor
#[derive(Default)]
pub struct ModRegistry {
    descriptors: Vec<ModDescriptor>,
    index: HashMap<String, usize>,
}

impl ModRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor.
    ///
    /// Duplicate ids (case-insensitive) are a no-op: the first registration
    /// wins and the rejected descriptor is dropped. Returns whether the
    /// descriptor was accepted.
    pub fn register(&mut self, descriptor: ModDescriptor) -> bool {
        let key = descriptor.id.to_lowercase();
        if self.index.contains_key(&key) {
            warn!(
                "Ignoring duplicate registration of '{}'; first registration wins",
                descriptor.id
            );
            return false;
        }

        debug!("Registered '{}' ({})", descriptor.id, descriptor.display_name);
        self.index.insert(key, self.descriptors.len());
        self.descriptors.push(descriptor);
        true
    }

    /// Mark every registered unit named in `ids` as Disabled
    /// (case-insensitive; unknown ids are ignored)
    pub fn apply_disabled(&mut self, ids: &[String]) {
        for id in ids {
            let key = id.to_lowercase();
            if let Some(&slot) = self.index.get(&key) {
                let descriptor = &mut self.descriptors[slot];
                descriptor.status = DescriptorStatus::Disabled;
                info!("Disabled '{}' per the disabled set", descriptor.id);
            }
        }
    }

    /// Look a descriptor up by id, case-insensitively
    pub fn get(&self, id: &str) -> Option<&ModDescriptor> {
        self.index
            .get(&id.to_lowercase())
            .map(|&slot| &self.descriptors[slot])
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut ModDescriptor> {
        self.index
            .get(&id.to_lowercase())
            .copied()
            .map(move |slot| &mut self.descriptors[slot])
    }

    /// All known descriptors, in registration (or, after resolution,
    /// activation) order
    pub fn all(&self) -> &[ModDescriptor] {
        &self.descriptors
    }

    /// All active descriptors, in activation order
    pub fn active(&self) -> impl Iterator<Item = &ModDescriptor> {
        self.descriptors.iter().filter(|d| d.is_active())
    }

    /// Every excluded unit with the status explaining why
    pub fn exclusions(&self) -> Vec<(&str, DescriptorStatus)> {
        self.descriptors
            .iter()
            .filter(|d| {
                matches!(
                    d.status,
                    DescriptorStatus::Disabled
                        | DescriptorStatus::MissingDependency
                        | DescriptorStatus::MetadataError
                        | DescriptorStatus::LoadError
                )
            })
            .map(|d| (d.id.as_str(), d.status))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Report which units declare support for the given host version.
    ///
    /// Report-only: an unsupported unit is warned about, never excluded.
    /// Units without a declared range are omitted.
    pub fn check_host_version(&self, host_version: &str) -> Vec<(String, bool)> {
        let mut report = Vec::new();
        for descriptor in &self.descriptors {
            let Some(range) = descriptor
                .metadata
                .as_ref()
                .and_then(|m| m.supported_host_versions.as_ref())
            else {
                continue;
            };
            let supported = range.supports(host_version);
            if !supported {
                warn!(
                    "'{}' does not declare support for host version {host_version} (declares {range})",
                    descriptor.id
                );
            }
            report.push((descriptor.id.clone(), supported));
        }
        report
    }

    /// Fault a unit during a lifecycle phase: log once, flip to LoadError,
    /// drop it from the active set for subsequent phases
    pub(crate) fn fault(&mut self, slot: usize, phase: &str, detail: &str) {
        let descriptor = &mut self.descriptors[slot];
        tracing::error!(
            "'{}' failed during {phase}: {detail}; removing from further initialization",
            descriptor.id
        );
        descriptor.status = DescriptorStatus::LoadError;
    }

    pub(crate) fn descriptor_at(&self, slot: usize) -> &ModDescriptor {
        &self.descriptors[slot]
    }

    pub(crate) fn descriptor_at_mut(&mut self, slot: usize) -> &mut ModDescriptor {
        &mut self.descriptors[slot]
    }

    pub(crate) fn active_slots(&self) -> Vec<usize> {
        self.descriptors
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_active())
            .map(|(slot, _)| slot)
            .collect()
    }

    pub(crate) fn slots(&self) -> std::ops::Range<usize> {
        0..self.descriptors.len()
    }

    /// Reorder descriptors so the ids in `order` come first, in that order;
    /// everything else keeps its relative position after them
    pub(crate) fn apply_order(&mut self, order: &[String]) {
        let mut ordered = Vec::with_capacity(self.descriptors.len());
        let mut remaining: Vec<Option<ModDescriptor>> =
            std::mem::take(&mut self.descriptors).into_iter().map(Some).collect();

        for id in order {
            let key = id.to_lowercase();
            if let Some(&slot) = self.index.get(&key) {
                if let Some(descriptor) = remaining[slot].take() {
                    ordered.push(descriptor);
                }
            }
        }
        ordered.extend(remaining.into_iter().flatten());

        self.descriptors = ordered;
        self.index = self
            .descriptors
            .iter()
            .enumerate()
            .map(|(slot, d)| (d.id.to_lowercase(), slot))
            .collect();
    }
}
