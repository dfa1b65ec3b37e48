//! Cross-model indices between the logical, physical and business models.
//!
//! The indices are derived data: [`CrossReference::build`] recomputes all of
//! them from the three registries and nothing updates them afterwards. A model
//! change means a new build.

use crate::identity::UnitId;
use crate::model::{BusinessInformation, LogicalModel, PhysicalModel, Team};
use crate::model::{Document, LogicalUnit};
use std::collections::BTreeMap;
use tracing::debug;

type Index = BTreeMap<UnitId, Vec<UnitId>>;

/// Multi-directional indices across LM, PM and BI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrossReference {
    pm_objects_by_lm_id: Index,
    lm_objects_by_pm_id: Index,
    bi_objects_by_lm_id: Index,
    lm_objects_by_bi_id: Index,
    pm_objects_by_bi_id: Index,
    bi_objects_by_pm_id: Index,
    dangling_pm_mappings: Vec<(UnitId, String)>,
    unregistered_bi_ids: Vec<UnitId>,
}

impl CrossReference {
    /// Build every index from scratch.
    pub fn build(lm: &LogicalModel, pm: &PhysicalModel, bi: &BusinessInformation) -> Self {
        let mut xref = CrossReference::default();

        for unit in lm.units() {
            let lm_id = unit.id();

            for physical_key in lm.pm_objects_of(lm_id) {
                match pm.resolve_natural_key(physical_key) {
                    Ok(pm_id) => {
                        push_unique(&mut xref.pm_objects_by_lm_id, lm_id, pm_id);
                        push_unique(&mut xref.lm_objects_by_pm_id, pm_id, lm_id);
                    }
                    Err(_) => {
                        debug!(
                            lm_id = %lm_id,
                            physical_key = %physical_key,
                            "Unresolved pm mapping"
                        );
                        xref.dangling_pm_mappings
                            .push((lm_id.clone(), physical_key.clone()));
                    }
                }
            }

            for bi_id in business_ids(unit) {
                push_unique(&mut xref.bi_objects_by_lm_id, lm_id, &bi_id);
                push_unique(&mut xref.lm_objects_by_bi_id, &bi_id, lm_id);
                if !bi.contains(&bi_id) && !xref.unregistered_bi_ids.contains(&bi_id) {
                    xref.unregistered_bi_ids.push(bi_id);
                }
            }
        }

        for (bi_id, lm_ids) in &xref.lm_objects_by_bi_id {
            for lm_id in lm_ids {
                for pm_id in xref.pm_objects_by_lm_id.get(lm_id).into_iter().flatten() {
                    push_unique(&mut xref.pm_objects_by_bi_id, bi_id, pm_id);
                }
            }
        }

        for (pm_id, lm_ids) in &xref.lm_objects_by_pm_id {
            for lm_id in lm_ids {
                for bi_id in xref.bi_objects_by_lm_id.get(lm_id).into_iter().flatten() {
                    push_unique(&mut xref.bi_objects_by_pm_id, pm_id, bi_id);
                }
            }
        }

        debug!(
            lm_units = lm.len(),
            pm_links = xref.lm_objects_by_pm_id.len(),
            bi_links = xref.lm_objects_by_bi_id.len(),
            dangling = xref.dangling_pm_mappings.len(),
            "Cross-reference built"
        );
        xref
    }

    pub fn pm_objects_by_lm_id(&self) -> &Index {
        &self.pm_objects_by_lm_id
    }

    pub fn lm_objects_by_pm_id(&self) -> &Index {
        &self.lm_objects_by_pm_id
    }

    pub fn bi_objects_by_lm_id(&self) -> &Index {
        &self.bi_objects_by_lm_id
    }

    pub fn lm_objects_by_bi_id(&self) -> &Index {
        &self.lm_objects_by_bi_id
    }

    pub fn pm_objects_by_bi_id(&self) -> &Index {
        &self.pm_objects_by_bi_id
    }

    pub fn bi_objects_by_pm_id(&self) -> &Index {
        &self.bi_objects_by_pm_id
    }

    /// `(lm_id, physical natural key)` pairs that did not resolve in the PM.
    pub fn dangling_pm_mappings(&self) -> &[(UnitId, String)] {
        &self.dangling_pm_mappings
    }

    /// BI units referenced by the LM but missing from the BI registry.
    pub fn unregistered_bi_ids(&self) -> &[UnitId] {
        &self.unregistered_bi_ids
    }

    /// Resolved PM ids of an LM unit.
    pub fn pm_ids_for(&self, lm_id: &UnitId) -> &[UnitId] {
        lookup(&self.pm_objects_by_lm_id, lm_id)
    }

    /// LM ids mapped to a PM unit.
    pub fn lm_ids_for_pm(&self, pm_id: &UnitId) -> &[UnitId] {
        lookup(&self.lm_objects_by_pm_id, pm_id)
    }

    /// BI ids reachable from an LM unit.
    pub fn bi_ids_for(&self, lm_id: &UnitId) -> &[UnitId] {
        lookup(&self.bi_objects_by_lm_id, lm_id)
    }

    /// LM ids referencing a BI unit.
    pub fn lm_ids_for_bi(&self, bi_id: &UnitId) -> &[UnitId] {
        lookup(&self.lm_objects_by_bi_id, bi_id)
    }
}

fn lookup<'a>(index: &'a Index, id: &UnitId) -> &'a [UnitId] {
    index.get(id).map(Vec::as_slice).unwrap_or_default()
}

fn push_unique(index: &mut Index, key: &UnitId, value: &UnitId) {
    crate::model::push_unique(index, key.clone(), value.clone());
}

/// Ids of every BI unit an LM unit points to, teams first, then documents.
fn business_ids(unit: &LogicalUnit) -> Vec<UnitId> {
    let mut ids = Vec::new();
    let mut add = |id: &UnitId| {
        if !ids.contains(id) {
            ids.push(id.clone());
        }
    };

    for team in unit.responsible_parties() {
        walk_team(team, &mut add);
    }
    for Document { id, .. } in unit.documents() {
        add(id);
    }
    ids
}

fn walk_team(team: &Team, add: &mut impl FnMut(&UnitId)) {
    add(&team.id);
    for contact in &team.contacts {
        add(&contact.id);
        for email in &contact.emails {
            add(&email.id);
        }
        for url in &contact.urls {
            add(&url.id);
        }
    }
}
