//! Tree renderings of failures and of the kind hierarchy.

use colored::Colorize;
use termtree::Tree;
use tracing::instrument;

use crate::config::Settings;
use crate::domain::{Exception, ExceptionKind, KindRegistry};

pub trait ToTermTree {
    fn to_term_tree(&self, settings: &Settings) -> Tree<String>;
}

impl ToTermTree for Exception {
    #[instrument(level = "trace", skip_all)]
    fn to_term_tree(&self, settings: &Settings) -> Tree<String> {
        build(self, settings, 1)
    }
}

fn label(exception: &Exception) -> String {
    match exception {
        Exception::Leaf(leaf) if leaf.message().is_empty() => leaf.kind().name().red().to_string(),
        Exception::Leaf(leaf) => format!("{}: {}", leaf.kind().name().red(), leaf.message()),
        Exception::Group(group) => format!("{}: {}", group.kind().name().cyan().bold(), group),
    }
}

fn build(exception: &Exception, settings: &Settings, depth: usize) -> Tree<String> {
    let mut tree = Tree::new(label(exception));
    if settings.show_notes {
        for note in exception.notes() {
            tree.push(Tree::new(format!("{} {}", "note:".dimmed(), note)));
        }
    }
    if let Exception::Group(group) = exception {
        if depth >= settings.max_depth {
            tree.push(Tree::new(format!("... {} more", group.leaf_count())));
        } else {
            for member in group.exceptions() {
                tree.push(build(member, settings, depth + 1));
            }
        }
    }
    tree
}

/// `root` and every registered kind below it. Kinds with several parents
/// appear under each of them.
pub fn kind_tree(registry: &KindRegistry, root: &ExceptionKind) -> Tree<String> {
    let mut tree = Tree::new(root.name().to_string());
    for child in registry.children_of(root) {
        tree.push(kind_tree(registry, child));
    }
    tree
}
