//! Consistency checks over the logical and physical models.
//!
//! A [`Convention`] is a named list of rules. Each rule inspects a
//! [`ModelView`] and reports [`Finding`]s; validation stamps every finding with
//! the name and severity of the rule that produced it.
//!
//! [`Convention::builtin`] carries the checks every data estate is held to:
//! mapping coverage between the models and the layering of table lineage.

use crate::identity::UnitId;
use crate::model::{BusinessInformation, LogicalModel, PhysicalModel};
use crate::xref::CrossReference;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// Severity of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// A breach of a convention rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    /// Name of the rule that reported the finding.
    pub rule: String,
    pub message: String,
    pub unit_id: Option<UnitId>,
    pub unit_natural_key: Option<String>,
}

impl Finding {
    /// Create a finding. Severity and rule are filled in by validation.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            rule: String::new(),
            message: message.into(),
            unit_id: None,
            unit_natural_key: None,
        }
    }

    /// Attach the offending unit.
    pub fn with_unit(mut self, unit_id: &UnitId, natural_key: impl Into<String>) -> Self {
        self.unit_id = Some(unit_id.clone());
        self.unit_natural_key = Some(natural_key.into());
        self
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.severity, self.rule, self.message)?;
        if let Some(natural_key) = &self.unit_natural_key {
            write!(f, " ({})", natural_key)?;
        }
        Ok(())
    }
}

/// The models a convention is checked against.
pub struct ModelView<'a> {
    pub lm: &'a LogicalModel,
    pub pm: &'a PhysicalModel,
    pub bi: &'a BusinessInformation,
    pub xref: CrossReference,
}

impl<'a> ModelView<'a> {
    /// Bundle the models and build their cross-reference.
    pub fn new(lm: &'a LogicalModel, pm: &'a PhysicalModel, bi: &'a BusinessInformation) -> Self {
        Self {
            lm,
            pm,
            bi,
            xref: CrossReference::build(lm, pm, bi),
        }
    }
}

type CheckFn = Box<dyn Fn(&ModelView<'_>) -> Vec<Finding> + Send + Sync>;

/// A single named check.
pub struct ConventionRule {
    pub name: String,
    pub severity: Severity,
    pub description: String,
    check: CheckFn,
}

impl ConventionRule {
    pub fn new<F>(
        name: impl Into<String>,
        severity: Severity,
        description: impl Into<String>,
        check: F,
    ) -> Self
    where
        F: Fn(&ModelView<'_>) -> Vec<Finding> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            severity,
            description: description.into(),
            check: Box::new(check),
        }
    }

    /// Run the check, stamping findings with this rule.
    pub fn evaluate(&self, view: &ModelView<'_>) -> Vec<Finding> {
        (self.check)(view)
            .into_iter()
            .map(|mut finding| {
                finding.severity = self.severity;
                finding.rule = self.name.clone();
                finding
            })
            .collect()
    }
}

impl fmt::Debug for ConventionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConventionRule")
            .field("name", &self.name)
            .field("severity", &self.severity)
            .finish_non_exhaustive()
    }
}

/// A named set of rules.
#[derive(Debug)]
pub struct Convention {
    pub name: String,
    rules: Vec<ConventionRule>,
}

impl Convention {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
        }
    }

    /// Add a rule.
    pub fn with_rule(mut self, rule: ConventionRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Add a rule in place.
    pub fn add_rule(&mut self, rule: ConventionRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[ConventionRule] {
        &self.rules
    }

    /// Run every rule in order.
    pub fn validate(&self, view: &ModelView<'_>) -> Vec<Finding> {
        let mut findings = Vec::new();
        for rule in &self.rules {
            let found = rule.evaluate(view);
            debug!(rule = %rule.name, findings = found.len(), "Evaluated rule");
            findings.extend(found);
        }
        findings
    }

    /// The built-in checks.
    ///
    /// `core_layer` names the layer whose tables and columns must all be
    /// modelled and whose lineage must come from `raw_layer`; `raw_layer`
    /// tables must read from landing layers.
    pub fn builtin(core_layer: &str, raw_layer: &str) -> Self {
        Self::builtin_with_tech_columns(core_layer, raw_layer, &[])
    }

    /// The built-in checks, with `tech_columns` exempt from the unused core
    /// column rule.
    pub fn builtin_with_tech_columns(
        core_layer: &str,
        raw_layer: &str,
        tech_columns: &[String],
    ) -> Self {
        Convention::new("builtin")
            .with_rule(ConventionRule::new(
                "missing-pm-mapping",
                Severity::Warning,
                "Logical unit is not mapped to any physical unit",
                missing_pm_mapping,
            ))
            .with_rule(ConventionRule::new(
                "dangling-pm-mapping",
                Severity::Error,
                "Logical unit is mapped to a physical unit that does not exist",
                dangling_pm_mapping,
            ))
            .with_rule(unused_core_table(core_layer.to_string()))
            .with_rule(unused_core_column(
                core_layer.to_string(),
                tech_columns.iter().cloned().collect(),
            ))
            .with_rule(core_depends_on_non_raw(
                core_layer.to_string(),
                raw_layer.to_string(),
            ))
            .with_rule(raw_depends_on_non_landing(raw_layer.to_string()))
            .with_rule(ConventionRule::new(
                "dangling-logical-reference",
                Severity::Error,
                "Logical unit points to a logical unit that does not exist",
                dangling_logical_reference,
            ))
            .with_rule(ConventionRule::new(
                "unregistered-business-unit",
                Severity::Warning,
                "Logical unit references business information that is not registered",
                unregistered_business_unit,
            ))
    }
}

/// Check if any finding is an error.
pub fn has_errors(findings: &[Finding]) -> bool {
    findings.iter().any(|f| f.severity == Severity::Error)
}

fn missing_pm_mapping(view: &ModelView<'_>) -> Vec<Finding> {
    view.lm
        .units()
        .filter(|unit| unit.pm_map().is_empty())
        .map(|unit| {
            Finding::new(format!("Missing PM mapping for {}", unit.name()))
                .with_unit(unit.id(), unit.natural_key())
        })
        .collect()
}

fn dangling_pm_mapping(view: &ModelView<'_>) -> Vec<Finding> {
    view.xref
        .dangling_pm_mappings()
        .iter()
        .map(|(lm_id, physical_key)| {
            let natural_key = view
                .lm
                .unit(lm_id)
                .map(|u| u.natural_key().to_string())
                .unwrap_or_default();
            Finding::new(format!(
                "{} is mapped to unknown physical unit {}",
                natural_key, physical_key
            ))
            .with_unit(lm_id, natural_key)
        })
        .collect()
}

fn unused_core_table(core_layer: String) -> ConventionRule {
    ConventionRule::new(
        "unused-core-table",
        Severity::Warning,
        "Core layer table is not used by the logical model",
        move |view| {
            let Some(layer) = view.pm.layer_by_name(&core_layer) else {
                return Vec::new();
            };
            view.pm
                .tables_in_layer(&layer.id)
                .filter(|table| view.xref.lm_ids_for_pm(&table.id).is_empty())
                .map(|table| {
                    Finding::new(format!(
                        "This PM object is not used in LM: {}.{}",
                        layer.name, table.name
                    ))
                    .with_unit(&table.id, table.natural_key.clone())
                })
                .collect()
        },
    )
}

/// Columns are exempt when their name is in `tech_columns`, such as load
/// timestamps every core table carries.
fn unused_core_column(core_layer: String, tech_columns: BTreeSet<String>) -> ConventionRule {
    ConventionRule::new(
        "unused-core-column",
        Severity::Warning,
        "Core layer column is not used by the logical model",
        move |view| {
            let Some(layer) = view.pm.layer_by_name(&core_layer) else {
                return Vec::new();
            };
            view.pm
                .columns()
                .values()
                .filter(|column| column.layer_id == layer.id)
                .filter(|column| !tech_columns.contains(&column.name))
                .filter(|column| view.xref.lm_ids_for_pm(&column.id).is_empty())
                .map(|column| {
                    let table = view
                        .pm
                        .table(&column.table_id)
                        .map(|t| t.name.as_str())
                        .unwrap_or("?");
                    Finding::new(format!(
                        "This PM object is not used in LM: {}.{}.{}",
                        layer.name, table, column.name
                    ))
                    .with_unit(&column.id, column.natural_key.clone())
                })
                .collect()
        },
    )
}

/// Yields `(dependent, dependency, dependency layer)` for every table lineage edge
/// whose dependent sits in `layer_name`.
fn lineage_from_layer<'v>(
    view: &'v ModelView<'_>,
    layer_name: &str,
) -> Vec<(&'v crate::model::Table, &'v crate::model::Table, &'v crate::model::Layer)> {
    let pm = view.pm;
    let mut edges = Vec::new();
    for (dependent_id, dependency_ids) in pm.dependencies() {
        let Ok(dependent) = pm.table(dependent_id) else {
            continue;
        };
        match pm.layer(&dependent.layer_id) {
            Ok(layer) if layer.name == layer_name => {}
            _ => continue,
        }
        for dependency_id in dependency_ids {
            let Ok(dependency) = pm.table(dependency_id) else {
                continue;
            };
            if let Ok(dependency_layer) = pm.layer(&dependency.layer_id) {
                edges.push((dependent, dependency, dependency_layer));
            }
        }
    }
    edges
}

fn core_depends_on_non_raw(core_layer: String, raw_layer: String) -> ConventionRule {
    ConventionRule::new(
        "core-depends-on-non-raw",
        Severity::Error,
        "Core layer table reads from a layer other than raw",
        move |view| {
            lineage_from_layer(view, &core_layer)
                .into_iter()
                .filter(|(_, _, layer)| layer.name != raw_layer)
                .map(|(dependent, dependency, layer)| {
                    Finding::new(format!(
                        "{} from {} layer depends on {} which is from {} layer",
                        dependent.name, core_layer, dependency.name, layer.name
                    ))
                    .with_unit(&dependent.id, dependent.natural_key.clone())
                })
                .collect()
        },
    )
}

fn raw_depends_on_non_landing(raw_layer: String) -> ConventionRule {
    ConventionRule::new(
        "raw-depends-on-non-landing",
        Severity::Error,
        "Raw layer table reads from a non-landing layer",
        move |view| {
            lineage_from_layer(view, &raw_layer)
                .into_iter()
                .filter(|(_, _, layer)| !layer.is_landing)
                .map(|(dependent, dependency, layer)| {
                    Finding::new(format!(
                        "{} from {} layer depends on {} which is from {} layer",
                        dependent.name, raw_layer, dependency.name, layer.name
                    ))
                    .with_unit(&dependent.id, dependent.natural_key.clone())
                })
                .collect()
        },
    )
}

fn dangling_logical_reference(view: &ModelView<'_>) -> Vec<Finding> {
    let lm = view.lm;
    let mut findings = Vec::new();
    let mut dangling = |owner: &UnitId, owner_key: &str, what: &str, target: &UnitId| {
        findings.push(
            Finding::new(format!("{} refers to unknown {} {}", owner_key, what, target))
                .with_unit(owner, owner_key),
        );
    };

    for entity in lm.entities().values() {
        for id in entity.attributes.iter().filter(|id| lm.attribute(id).is_err()) {
            dangling(&entity.id, &entity.natural_key, "attribute", id);
        }
        for id in entity.identifiers.iter().filter(|id| lm.identifier(id).is_err()) {
            dangling(&entity.id, &entity.natural_key, "identifier", id);
        }
    }
    for attribute in lm.attributes().values() {
        if lm.entity(&attribute.entity_id).is_err() {
            dangling(&attribute.id, &attribute.natural_key, "entity", &attribute.entity_id);
        }
    }
    for relation in lm.relations().values() {
        for end in [&relation.source_entity_id, &relation.target_entity_id] {
            if lm.entity(end).is_err() {
                dangling(&relation.id, &relation.natural_key, "entity", end);
            }
        }
    }
    for identifier in lm.identifiers().values() {
        if lm.entity(&identifier.entity_id).is_err() {
            dangling(&identifier.id, &identifier.natural_key, "entity", &identifier.entity_id);
        }
        for id in identifier.attributes.iter().filter(|id| lm.attribute(id).is_err()) {
            dangling(&identifier.id, &identifier.natural_key, "attribute", id);
        }
    }
    for (dependent_id, attribute_ids) in lm.dependencies() {
        let dependent_key = lm
            .unit(dependent_id)
            .map(|u| u.natural_key().to_string())
            .unwrap_or_else(|_| dependent_id.to_string());
        if lm.entity(dependent_id).is_err() {
            dangling(dependent_id, &dependent_key, "dependent entity", dependent_id);
        }
        for id in attribute_ids.iter().filter(|id| lm.attribute(id).is_err()) {
            dangling(dependent_id, &dependent_key, "dependency attribute", id);
        }
    }
    findings
}

fn unregistered_business_unit(view: &ModelView<'_>) -> Vec<Finding> {
    let mut findings = Vec::new();
    for bi_id in view.xref.unregistered_bi_ids() {
        for lm_id in view.xref.lm_ids_for_bi(bi_id) {
            let natural_key = view
                .lm
                .unit(lm_id)
                .map(|u| u.natural_key().to_string())
                .unwrap_or_default();
            findings.push(
                Finding::new(format!(
                    "{} references unregistered business unit {}",
                    natural_key, bi_id
                ))
                .with_unit(lm_id, natural_key),
            );
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::assign_id;
    use crate::model::{
        Attribute, Column, Document, Entity, EntityIdentifier, Layer, Relation, Table,
    };

    fn warehouse() -> PhysicalModel {
        let landing = Layer::new("landing", true);
        let raw = Layer::new("raw", false);
        let core = Layer::new("core", false);
        let mart = Layer::new("mart", false);
        let tables = [
            Table::new("landing.orders", landing.id.clone(), "orders"),
            Table::new("raw.orders", raw.id.clone(), "orders"),
            Table::new("core.orders", core.id.clone(), "orders"),
            Table::new("core.audit", core.id.clone(), "audit"),
            Table::new("mart.orders", mart.id.clone(), "orders"),
        ];

        let mut pm = PhysicalModel::new("v1");
        for layer in [landing, raw, core, mart] {
            pm.register_layer(layer).unwrap();
        }
        for table in tables {
            pm.register_table(table).unwrap();
        }
        pm.register_dependency(assign_id("raw.orders"), assign_id("landing.orders"));
        pm.register_dependency(assign_id("core.orders"), assign_id("raw.orders"));
        pm
    }

    fn clean_model() -> LogicalModel {
        let mut lm = LogicalModel::new("v1");
        let orders = Entity::new("orders", "Orders").with_pm_mapping("core.orders");
        let audit = Entity::new("audit", "Audit").with_pm_mapping("core.audit");
        lm.register_entity(orders).unwrap();
        lm.register_entity(audit).unwrap();
        lm
    }

    fn run(lm: &LogicalModel, pm: &PhysicalModel) -> Vec<Finding> {
        let bi = BusinessInformation::new("v1");
        let view = ModelView::new(lm, pm, &bi);
        Convention::builtin("core", "raw").validate(&view)
    }

    fn rules(findings: &[Finding]) -> Vec<&str> {
        findings.iter().map(|f| f.rule.as_str()).collect()
    }

    #[test]
    fn test_clean_models_pass() {
        let findings = run(&clean_model(), &warehouse());
        assert!(findings.is_empty(), "unexpected findings: {findings:?}");
    }

    #[test]
    fn test_mapping_rules() {
        let mut lm = clean_model();
        lm.register_entity(Entity::new("audit", "Audit")).unwrap();
        lm.register_entity(Entity::new("ghost", "Ghost").with_pm_mapping("core.ghost"))
            .unwrap();

        let findings = run(&lm, &warehouse());
        assert_eq!(
            rules(&findings),
            vec!["missing-pm-mapping", "dangling-pm-mapping", "unused-core-table"]
        );
        assert_eq!(findings[0].severity, Severity::Warning);
        assert_eq!(findings[1].severity, Severity::Error);
        assert_eq!(findings[2].unit_natural_key.as_deref(), Some("core.audit"));
        assert!(has_errors(&findings));
    }

    #[test]
    fn test_layering_rules() {
        let mut pm = warehouse();
        pm.register_dependency(assign_id("core.orders"), assign_id("mart.orders"));
        pm.register_dependency(assign_id("raw.orders"), assign_id("core.audit"));

        let findings = run(&clean_model(), &pm);
        assert_eq!(
            rules(&findings),
            vec!["core-depends-on-non-raw", "raw-depends-on-non-landing"]
        );
        assert!(findings[0].message.contains("mart layer"));
    }

    #[test]
    fn test_dangling_logical_references() {
        let mut lm = clean_model();
        let ghost = assign_id("ghost");
        lm.register_attribute(
            Attribute::new("ghost.id", ghost.clone(), "id").with_pm_mapping("core.orders"),
        )
        .unwrap();
        lm.register_relation(
            Relation::new("orders.ghost", assign_id("orders"), ghost.clone(), "ghost")
                .with_pm_mapping("core.orders"),
        )
        .unwrap();
        lm.register_identifier(EntityIdentifier::new("ghost.pk", ghost, true)).unwrap();

        let findings = run(&lm, &warehouse());
        assert_eq!(rules(&findings), vec!["dangling-logical-reference"; 3]);
    }

    #[test]
    fn test_unregistered_business_unit() {
        let mut lm = LogicalModel::new("v1");
        lm.register_entity(
            Entity::new("orders", "Orders")
                .with_pm_mapping("core.orders")
                .with_document(Document::new("doc.orders", "Orders")),
        )
        .unwrap();
        lm.register_entity(Entity::new("audit", "Audit").with_pm_mapping("core.audit"))
            .unwrap();

        let findings = run(&lm, &warehouse());
        assert_eq!(rules(&findings), vec!["unregistered-business-unit"]);
        assert!(!has_errors(&findings));
    }

    #[test]
    fn test_unused_core_column() {
        let mut pm = warehouse();
        let core = assign_id("core");
        let orders = assign_id("core.orders");
        for name in ["id", "status", "loaded_at"] {
            let key = format!("core.orders.{name}");
            pm.register_column(Column::new(key, core.clone(), orders.clone(), name))
                .unwrap();
        }
        let mut lm = clean_model();
        lm.register_attribute(
            Attribute::new("orders.id", assign_id("orders"), "id")
                .with_pm_mapping("core.orders.id"),
        )
        .unwrap();
        let bi = BusinessInformation::new("v1");
        let view = ModelView::new(&lm, &pm, &bi);

        let findings = Convention::builtin("core", "raw").validate(&view);
        assert_eq!(rules(&findings), vec!["unused-core-column"; 2]);
        let mut messages: Vec<&str> = findings.iter().map(|f| f.message.as_str()).collect();
        messages.sort();
        assert_eq!(
            messages,
            vec![
                "This PM object is not used in LM: core.orders.loaded_at",
                "This PM object is not used in LM: core.orders.status",
            ]
        );

        let tech = vec!["loaded_at".to_string()];
        let findings = Convention::builtin_with_tech_columns("core", "raw", &tech).validate(&view);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].unit_natural_key.as_deref(), Some("core.orders.status"));
        assert!(!has_errors(&findings));
    }

    #[test]
    fn test_custom_rule_is_stamped() {
        let convention = Convention::new("naming").with_rule(ConventionRule::new(
            "upper-case-name",
            Severity::Info,
            "Names start with an upper-case letter",
            |view| {
                view.lm
                    .units()
                    .filter(|u| !u.name().starts_with(char::is_uppercase))
                    .map(|u| Finding::new("lower-case name").with_unit(u.id(), u.natural_key()))
                    .collect()
            },
        ));
        let mut lm = LogicalModel::new("v1");
        lm.register_entity(Entity::new("orders", "orders")).unwrap();
        let pm = PhysicalModel::new("v1");
        let bi = BusinessInformation::new("v1");

        let findings = convention.validate(&ModelView::new(&lm, &pm, &bi));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, "upper-case-name");
        assert_eq!(findings[0].severity, Severity::Info);
    }
}
