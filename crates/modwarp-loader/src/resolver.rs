//! Dependency resolution and load-order computation
//!
//! Fixpoint elimination: every round re-scans the whole pending set and
//! resolves each unit whose declared dependencies are all satisfiable,
//! appending it to the load order. The re-scan tolerates units that
//! reference dependencies classified later (or registered by other means);
//! a round that resolves nothing means the remainder is permanently
//! blocked, either by a cycle among present units or by a genuinely
//! unsatisfiable dependency, and the two are reported distinctly.
//!
//! Rules for one declared `(dep_id, range)`:
//! - dep absent from every known candidate: vacuously satisfied (the
//!   dependency simply is not present on this install);
//! - dep resolved with a concrete version inside `range`: satisfied;
//! - dep resolved but version-less (code-only internal unit): satisfied;
//! - dep excluded, or resolved outside `range`: permanently blocked;
//! - dep still pending: blocked this round, retried next round.

use crate::descriptor::{DescriptorStatus, ModDescriptor};
use crate::registry::ModRegistry;
use modwarp_core::{DependencyInfo, Error};
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

/// Outcome of one resolution pass
pub struct ResolutionReport {
    /// Ids in activation order
    pub load_order: Vec<String>,
    /// One diagnostic per excluded unit, plus one per conflict pair
    pub diagnostics: Vec<Error>,
}

impl ResolutionReport {
    /// Ids excluded by this pass, in diagnostic order
    pub fn excluded(&self) -> Vec<&str> {
        self.diagnostics
            .iter()
            .filter_map(|d| match d {
                Error::MissingDependency { unit, .. } | Error::CycleUnresolved { unit, .. } => {
                    Some(unit.as_str())
                }
                _ => None,
            })
            .collect()
    }
}

/// How one dependency looks from a pending unit's point of view
enum DepState {
    Satisfied,
    /// Dep exists but is still pending; may resolve in a later round
    Blocked,
    /// Dep can never satisfy this declaration
    Unsatisfiable(String),
}

/// Compute the activation order for every pending descriptor in the
/// registry, classifying the ones that cannot be activated.
///
/// Nothing in this pass aborts it; each error affects only its own unit.
pub fn resolve(registry: &mut ModRegistry) -> ResolutionReport {
    let mut load_order: Vec<String> = Vec::new();
    let mut diagnostics: Vec<Error> = Vec::new();

    let mut pending: Vec<usize> = registry
        .slots()
        .filter(|&slot| registry.descriptor_at(slot).status == DescriptorStatus::Pending)
        .collect();

    // Each round either resolves at least one unit or the loop halts, so
    // the candidate count bounds the number of useful rounds.
    let max_rounds = pending.len();
    for _round in 0..max_rounds {
        let mut resolved_this_round = false;

        let mut still_pending = Vec::with_capacity(pending.len());
        for &slot in &pending {
            if dependencies_satisfied(registry, slot).is_none() {
                let descriptor = registry.descriptor_at_mut(slot);
                descriptor.status = DescriptorStatus::Resolved;
                debug!("Resolved '{}'", descriptor.id);
                load_order.push(descriptor.id.clone());
                resolved_this_round = true;
            } else {
                still_pending.push(slot);
            }
        }

        pending = still_pending;
        if pending.is_empty() || !resolved_this_round {
            break;
        }
    }

    // Stall: everything left is permanently blocked. Distinguish a cycle
    // among present units from a genuinely unsatisfiable dependency.
    // Classify every stalled unit before mutating any status, so one half
    // of a cycle does not demote the other half's diagnosis.
    let mut stalled: Vec<(usize, Error)> = Vec::new();
    for &slot in &pending {
        let Some(blocking) = dependencies_satisfied(registry, slot) else {
            continue;
        };
        let id = registry.descriptor_at(slot).id.clone();

        let diagnostic = match blocking {
            DepState::Blocked => {
                let dep = first_blocking_dep(registry, slot);
                error!("'{id}' is part of an unresolved dependency cycle (blocked on '{dep}')");
                Error::cycle(&id, dep)
            }
            DepState::Unsatisfiable(dep) => {
                error!("'{id}' has an unsatisfiable dependency: {dep}");
                Error::missing_dependency(&id, dep)
            }
            DepState::Satisfied => continue,
        };
        stalled.push((slot, diagnostic));
    }
    for (slot, diagnostic) in stalled {
        diagnostics.push(diagnostic);
        registry.descriptor_at_mut(slot).status = DescriptorStatus::MissingDependency;
    }

    flag_conflicts(registry, &load_order, &mut diagnostics);

    registry.apply_order(&load_order);
    info!(
        "Resolved {} of {} candidate units",
        load_order.len(),
        load_order.len() + pending.len()
    );

    ResolutionReport {
        load_order,
        diagnostics,
    }
}

/// `None` when every declared dependency of `slot` is satisfied; otherwise
/// the state of the first dependency that is not
fn dependencies_satisfied(registry: &ModRegistry, slot: usize) -> Option<DepState> {
    for dep in declared_dependencies(registry.descriptor_at(slot)) {
        match dependency_state(registry, dep) {
            DepState::Satisfied => continue,
            blocked => return Some(blocked),
        }
    }
    None
}

fn dependency_state(registry: &ModRegistry, dep: &DependencyInfo) -> DepState {
    let Some(target) = registry.get(&dep.id) else {
        // Absent entirely: the dependency is simply not present on this
        // install and the declaring unit still loads.
        return DepState::Satisfied;
    };

    match target.status {
        DescriptorStatus::Resolved => match target.version() {
            Some(version) if !dep.version.contains(version) => DepState::Unsatisfiable(format!(
                "'{}' is version {version}, outside the required range {}",
                dep.id, dep.version
            )),
            _ => DepState::Satisfied,
        },
        DescriptorStatus::Pending => DepState::Blocked,
        excluded => DepState::Unsatisfiable(format!(
            "'{}' is excluded ({excluded})",
            dep.id
        )),
    }
}

/// First still-pending dependency id of a stalled unit, for the cycle
/// diagnostic
fn first_blocking_dep(registry: &ModRegistry, slot: usize) -> String {
    declared_dependencies(registry.descriptor_at(slot))
        .iter()
        .find(|dep| {
            registry
                .get(&dep.id)
                .is_some_and(|t| t.status == DescriptorStatus::Pending)
        })
        .map(|dep| dep.id.clone())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Dependencies that participate in ordering: legacy (spec < 1.3)
/// manifests and metadata-less internal units declare none.
fn declared_dependencies(descriptor: &ModDescriptor) -> &[DependencyInfo] {
    match &descriptor.metadata {
        Some(metadata) if metadata.is_ordered() => &metadata.dependencies,
        _ => &[],
    }
}

/// Flag every resolved unit whose `conflicts` entry matches another
/// resolved unit's id and version. Non-fatal: both sides stay loaded;
/// breaking co-installed units outright is worse than warning.
fn flag_conflicts(registry: &mut ModRegistry, load_order: &[String], diagnostics: &mut Vec<Error>) {
    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for id in load_order {
        let Some(descriptor) = registry.get(id) else {
            continue;
        };
        let Some(metadata) = &descriptor.metadata else {
            continue;
        };
        for conflict in &metadata.conflicts {
            let Some(target) = registry.get(&conflict.id) else {
                continue;
            };
            if !target.is_active() {
                continue;
            }
            let matches = match target.version() {
                Some(version) => conflict.version.contains(version),
                None => true,
            };
            if !matches {
                continue;
            }

            let a = descriptor.id.to_lowercase();
            let b = target.id.to_lowercase();
            let key = if a <= b { (a, b) } else { (b, a) };
            if seen.insert(key) {
                pairs.push((descriptor.id.clone(), target.id.clone()));
            }
        }
    }

    for (unit, other) in pairs {
        warn!("'{unit}' conflicts with '{other}'; both remain loaded");
        if let Some(descriptor) = registry.get_mut(&unit) {
            descriptor.conflicts_with.push(other.clone());
        }
        if let Some(descriptor) = registry.get_mut(&other) {
            descriptor.conflicts_with.push(unit.clone());
        }
        diagnostics.push(Error::conflict(unit, other));
    }
}
