//! Declarative catch scenarios.
//!
//! A scenario document names the failure to raise, any extra kinds it needs
//! and a table of handlers. Running it drives the real dispatcher and
//! records every handler invocation.
//!
//! ```toml
//! [[kinds]]
//! name = "QuotaError"
//! parents = ["RuntimeError"]
//!
//! [raise]
//! group = "booboo"
//! exceptions = [
//!     { kind = "ValueError", message = "foo" },
//!     { group = "nested", exceptions = [{ kind = "QuotaError", message = "bar" }] },
//! ]
//!
//! [[handlers]]
//! types = ["ValueError", "RuntimeError"]
//!
//! [[handlers]]
//! types = ["ZeroDivisionError"]
//! action = "raise"
//! raise = { kind = "RuntimeError", message = "new" }
//! ```

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::application::catch::{catch, Disposition, HandlerMap};
use crate::application::error::{ApplicationError, ApplicationResult};
use crate::application::error_ext::IoResultExt;
use crate::domain::{Exception, ExceptionGroup, GroupResult, KindRegistry, Leaf, TypeSet};

/// A kind declared by the document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KindSpec {
    pub name: String,
    pub parents: Vec<String>,
}

/// One node of the raised tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum NodeSpec {
    Group {
        group: String,
        exceptions: Vec<NodeSpec>,
        #[serde(default)]
        notes: Vec<String>,
    },
    Leaf {
        kind: String,
        #[serde(default)]
        message: String,
        #[serde(default)]
        notes: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HandlerAction {
    /// Return normally: the matched failure is handled.
    #[default]
    Absorb,
    /// Raise the failure described by `raise`.
    Raise,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RaiseSpec {
    pub kind: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HandlerSpec {
    pub types: Vec<String>,
    #[serde(default)]
    pub action: HandlerAction,
    pub raise: Option<RaiseSpec>,
}

/// The document as written on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ScenarioDoc {
    #[serde(default)]
    pub kinds: Vec<KindSpec>,
    pub raise: NodeSpec,
    #[serde(default)]
    pub handlers: Vec<HandlerSpec>,
}

#[derive(Debug, Clone)]
enum Reaction {
    Absorb,
    Raise(Leaf),
}

#[derive(Debug, Clone)]
struct ResolvedHandler {
    types: TypeSet,
    reaction: Reaction,
}

/// One call of a handler during [`Scenario::run`].
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Position of the handler in the document.
    pub handler: usize,
    pub received: ExceptionGroup,
}

/// Result of running a scenario.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub invocations: Vec<Invocation>,
    pub disposition: Disposition,
}

/// A resolved scenario, ready to run.
#[derive(Debug, Clone)]
pub struct Scenario {
    source: PathBuf,
    registry: KindRegistry,
    raised: Exception,
    handlers: Vec<ResolvedHandler>,
}

impl Scenario {
    /// Read and resolve a scenario file on top of `registry`.
    #[instrument(level = "debug", skip(registry))]
    pub fn load(path: &Path, registry: &KindRegistry) -> ApplicationResult<Self> {
        let content = std::fs::read_to_string(path).with_path_context("read scenario", path)?;
        Self::parse(&content, path, registry)
    }

    /// Resolve scenario text; `source` only labels errors.
    pub fn parse(content: &str, source: &Path, registry: &KindRegistry) -> ApplicationResult<Self> {
        let doc: ScenarioDoc = toml::from_str(content).map_err(|e| ApplicationError::Scenario {
            path: source.to_path_buf(),
            message: e.message().to_string(),
        })?;
        Self::resolve(doc, source, registry)
    }

    fn resolve(doc: ScenarioDoc, source: &Path, registry: &KindRegistry) -> ApplicationResult<Self> {
        let invalid = |message: String| ApplicationError::Scenario {
            path: source.to_path_buf(),
            message,
        };

        let mut registry = registry.clone();
        registry.declare_all(doc.kinds.iter().map(|k| (k.name.as_str(), k.parents.clone())))?;

        let raised = build_node(&doc.raise, &registry)?;

        let mut handlers = Vec::with_capacity(doc.handlers.len());
        for (index, spec) in doc.handlers.iter().enumerate() {
            let types = registry_types(&registry, &spec.types)?;
            let reaction = match (spec.action, &spec.raise) {
                (HandlerAction::Absorb, None) => Reaction::Absorb,
                (HandlerAction::Raise, Some(raise)) => {
                    Reaction::Raise(Leaf::new(&registry.resolve(&raise.kind)?, raise.message.clone())?)
                }
                (HandlerAction::Absorb, Some(_)) => {
                    return Err(invalid(format!("handler #{index} absorbs but names a failure to raise")))
                }
                (HandlerAction::Raise, None) => {
                    return Err(invalid(format!("handler #{index} raises but names no failure")))
                }
            };
            handlers.push(ResolvedHandler { types, reaction });
        }
        debug!(handlers = handlers.len(), raised = %raised, "scenario resolved");

        Ok(Self {
            source: source.to_path_buf(),
            registry,
            raised,
            handlers,
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Builtins plus the kinds the document declared.
    pub fn registry(&self) -> &KindRegistry {
        &self.registry
    }

    pub fn raised(&self) -> &Exception {
        &self.raised
    }

    /// Split the raised group by the named kinds.
    pub fn split<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> ApplicationResult<(Option<ExceptionGroup>, Option<ExceptionGroup>)> {
        let types = registry_types(&self.registry, names)?;
        match &self.raised {
            Exception::Group(group) => Ok(group.split(&types)),
            Exception::Leaf(_) => Err(ApplicationError::Scenario {
                path: self.source.clone(),
                message: "the raised failure is not a group".to_string(),
            }),
        }
    }

    /// Raise the scenario's failure inside a catch scope built from its
    /// handler table.
    #[instrument(level = "debug", skip(self), fields(source = %self.source.display()))]
    pub fn run(&self) -> ApplicationResult<Outcome> {
        let log = RefCell::new(Vec::new());

        let disposition = {
            let mut handlers = HandlerMap::new();
            for (index, handler) in self.handlers.iter().enumerate() {
                let log = &log;
                handlers = handlers.on(handler.types.clone(), move |group: &ExceptionGroup| {
                    log.borrow_mut().push(Invocation {
                        handler: index,
                        received: group.clone(),
                    });
                    match &handler.reaction {
                        Reaction::Absorb => Ok(()),
                        Reaction::Raise(leaf) => Err(Exception::Leaf(leaf.duplicate())),
                    }
                });
            }
            let mut catcher = catch(handlers)?;
            catcher.exit(Some(self.raised.clone()))
        };

        Ok(Outcome {
            invocations: log.into_inner(),
            disposition,
        })
    }
}

fn registry_types<S: AsRef<str>>(registry: &KindRegistry, names: &[S]) -> GroupResult<TypeSet> {
    names.iter().map(|n| registry.resolve(n.as_ref())).collect()
}

fn build_node(node: &NodeSpec, registry: &KindRegistry) -> GroupResult<Exception> {
    match node {
        NodeSpec::Leaf {
            kind,
            message,
            notes,
        } => {
            let leaf = Leaf::new(&registry.resolve(kind)?, message.clone())?;
            Ok(notes.iter().fold(Exception::Leaf(leaf), |e, n| e.with_note(n.clone())))
        }
        NodeSpec::Group {
            group,
            exceptions,
            notes,
        } => {
            let members = exceptions
                .iter()
                .map(|child| build_node(child, registry))
                .collect::<GroupResult<Vec<_>>>()?;
            let built = ExceptionGroup::new(group.clone(), members)?;
            Ok(notes.iter().fold(Exception::Group(built), |e, n| e.with_note(n.clone())))
        }
    }
}
