//! Subcommand implementations
//!
//! Each command works on document text and returns what `main` prints or
//! writes, so file handling and exit codes stay in one place.

use anyhow::{Context, Result};
use lineage_assets::{AssetPropertyGraph, AssetSession, SessionConfig, SyncReport};
use lineage_core::{DocumentId, NodePath, TypeRegistry};
use lineage_graph::{walk, Content, NodeGraph, NodeId, VisitFlow, WalkOptions};
use lineage_yaml::{load_with, save, LoadOptions, LoadReport};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Registry from a schema file's text
pub(crate) fn registry(schema: &str) -> Result<Arc<TypeRegistry>> {
    let registry = TypeRegistry::from_yaml_str(schema).context("invalid type schema")?;
    Ok(Arc::new(registry))
}

/// Result of `check`
#[derive(Debug)]
pub(crate) struct CheckOutcome {
    pub(crate) report: LoadReport,
    pub(crate) saved: String,
    pub(crate) identical: bool,
}

/// Load, re-save and compare
pub(crate) fn check(registry: &Arc<TypeRegistry>, text: &str, config: &SessionConfig) -> Result<CheckOutcome> {
    // Markers are kept so they take part in the comparison
    let options = LoadOptions::from_config(config, true);
    let (document, report) = load_with(registry, text, DocumentId::new(), options)?;
    let saved = save(&document)?;
    let identical = saved == text;
    info!(identical, warnings = report.warnings.len(), "round-trip check");
    Ok(CheckOutcome {
        report,
        saved,
        identical,
    })
}

/// Result of `sync`
#[derive(Debug)]
pub(crate) struct SyncOutcome {
    pub(crate) base_report: LoadReport,
    pub(crate) derived_report: LoadReport,
    pub(crate) sync: SyncReport,
    pub(crate) saved: String,
}

/// Synchronize a derived document with its base
pub(crate) fn sync(
    registry: &Arc<TypeRegistry>,
    base_text: &str,
    derived_text: &str,
    config: &SessionConfig,
) -> Result<SyncOutcome> {
    let base_id = DocumentId::new();
    let derived_id = DocumentId::new();
    let (base, base_report) = load_with(registry, base_text, base_id, LoadOptions::from_config(config, false))
        .context("loading base document")?;
    let (derived, derived_report) =
        load_with(registry, derived_text, derived_id, LoadOptions::from_config(config, true))
            .context("loading derived document")?;

    let mut session = AssetSession::new(Arc::clone(registry), config.clone());
    session.add_document(base, None)?;
    let sync = session.add_document(derived, Some(base_id))?;
    let saved = save(session.document(derived_id)?)?;
    info!(
        operations = sync.operations.len(),
        warnings = sync.warnings.len(),
        "derived document synchronized"
    );
    Ok(SyncOutcome {
        base_report,
        derived_report,
        sync,
        saved,
    })
}

/// One line of `tree`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct TreeEntry {
    pub(crate) path: String,
    #[serde(rename = "override")]
    pub(crate) state: String,
    pub(crate) kind: String,
}

/// Every node with its override state, depth first
pub(crate) fn tree(registry: &Arc<TypeRegistry>, text: &str, config: &SessionConfig) -> Result<(Vec<TreeEntry>, LoadReport)> {
    let (document, report) = load_with(registry, text, DocumentId::new(), LoadOptions::from_config(config, true))?;
    Ok((entries(&document)?, report))
}

fn entries(document: &AssetPropertyGraph) -> Result<Vec<TreeEntry>> {
    let graph = document.graph();
    let mut lines = Vec::new();
    walk(
        graph,
        graph.root(),
        &mut |g: &NodeGraph, node: NodeId, path: &NodePath| {
            if let Ok(n) = g.node(node) {
                lines.push(TreeEntry {
                    path: display_path(path),
                    state: document.override_of(node).to_string(),
                    kind: kind(n.content()),
                });
            }
            VisitFlow::Continue
        },
        WalkOptions::default(),
    )?;
    Ok(lines)
}

/// Plain-text rendering of `tree`
#[must_use]
pub(crate) fn render_tree(entries: &[TreeEntry]) -> String {
    let width = entries.iter().map(|e| e.path.len()).max().unwrap_or(0);
    entries
        .iter()
        .map(|e| format!("{:width$}  {:<10}  {}\n", e.path, e.state, e.kind))
        .collect()
}

fn display_path(path: &NodePath) -> String {
    if path.is_empty() {
        ".".to_string()
    } else {
        path.to_string()
    }
}

fn kind(content: &Content) -> String {
    match content {
        Content::Leaf(value) => value.kind_name().to_string(),
        Content::Object { type_name, .. } => type_name.clone(),
        Content::Sequence(items) => format!("sequence[{}]", items.len()),
        Content::Map(entries) => format!("map[{}]", entries.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineage_test_utils::SCHEMA_YAML;
    use pretty_assertions::assert_eq;

    const BASE: &str = "!Character\nName: Archetype\nHealth: 80\nInventory:\n  '00000000000000000000000000000001': a\n";

    fn schema() -> Arc<TypeRegistry> {
        registry(SCHEMA_YAML).unwrap()
    }

    #[test]
    fn saved_text_passes_check() {
        let config = SessionConfig::default();
        let first = check(&schema(), BASE, &config).unwrap();
        assert!(first.report.is_clean());

        let second = check(&schema(), &first.saved, &config).unwrap();
        assert!(second.identical);
    }

    #[test]
    fn sync_pulls_base_values_into_derived() {
        let derived = "!Character\nName: Copy\nHealth: 100\n";
        let outcome = sync(&schema(), BASE, derived, &SessionConfig::default()).unwrap();
        assert!(outcome.saved.contains("Health: 80"));
        assert!(outcome.saved.contains("00000000000000000000000000000001"));
        assert!(!outcome.sync.is_noop());
    }

    #[test]
    fn sync_keeps_new_members() {
        let derived = "!Character\nName: Copy\nHealth*: 7\n";
        let outcome = sync(&schema(), BASE, derived, &SessionConfig::default()).unwrap();
        assert!(outcome.saved.contains("Health*: 7"));
    }

    #[test]
    fn tree_lists_root_and_overrides() {
        let text = "!Character\nName: Copy\nHealth*: 7\n";
        let (entries, _) = tree(&schema(), text, &SessionConfig::default()).unwrap();
        assert_eq!(entries[0].path, ".");
        assert_eq!(entries[0].kind, "Character");
        let health = entries.iter().find(|e| e.path == "Health").unwrap();
        assert_eq!(health.state, "New");
        assert_eq!(health.kind, "int");
    }

    #[test]
    fn rendered_tree_has_one_line_per_node() {
        let entries = vec![
            TreeEntry {
                path: ".".into(),
                state: "Base".into(),
                kind: "Character".into(),
            },
            TreeEntry {
                path: "Health".into(),
                state: "New".into(),
                kind: "int".into(),
            },
        ];
        let text = render_tree(&entries);
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().nth(1).unwrap().starts_with("Health"));
    }
}
