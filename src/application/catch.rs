//! Selective catch: route the matching members of a raised failure to
//! handlers and re-raise whatever is left.
//!
//! ```ignore
//! let mut catcher = catch(
//!     HandlerMap::new()
//!         .on([value_error(), key_error()], |group| { log(group); Ok(()) })
//!         .on(runtime_error(), |_| Ok(())),
//! )?;
//! catcher.run(|| risky())?;
//! ```

use std::fmt;

use tracing::{debug, instrument, trace};

use crate::application::error::CatchError;
use crate::domain::{Exception, ExceptionGroup, Leaf, TypeSet};

/// A handler receives the matched failure wrapped in a group. Returning
/// `Err` is the handler raising: the error joins the unhandled remainder.
///
/// Failures are copy-on-write values. Attaching the handled leaf as context
/// to a failure the handler still shares elsewhere yields a copy; a failure
/// that already has a context is kept as is.
pub type Handler<'h> = Box<dyn FnMut(&ExceptionGroup) -> Result<(), Exception> + 'h>;

/// Handlers keyed by type-set, in declaration order.
#[derive(Default)]
pub struct HandlerMap<'h> {
    entries: Vec<(TypeSet, Handler<'h>)>,
}

impl<'h> HandlerMap<'h> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register `handler` for every kind in `types`.
    pub fn on<T, F>(mut self, types: T, handler: F) -> Self
    where
        T: Into<TypeSet>,
        F: FnMut(&ExceptionGroup) -> Result<(), Exception> + 'h,
    {
        self.entries.push((types.into(), Box::new(handler)));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for HandlerMap<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(types, _)| types))
            .finish()
    }
}

/// What happens to a failure leaving a catch scope.
#[derive(Debug, Clone)]
pub enum Disposition {
    /// Nothing escapes: the failure was fully handled, or there was none.
    Suppress,
    /// No handler matched; the original failure escapes unchanged.
    Passthrough(Exception),
    /// A new failure escapes in place of the original, not chained to it.
    /// Clearing the cause copies a shared value that still has one.
    Replace(Exception),
}

impl Disposition {
    pub fn is_suppressed(&self) -> bool {
        matches!(self, Disposition::Suppress)
    }

    pub fn into_result(self) -> Result<(), Exception> {
        match self {
            Disposition::Suppress => Ok(()),
            Disposition::Passthrough(e) | Disposition::Replace(e) => Err(e),
        }
    }
}

/// Build a catch scope from `handlers`.
///
/// Rejects type-sets naming a group kind (groups are split, never caught
/// whole) and empty type-sets.
#[instrument(level = "debug", skip(handlers), fields(count = handlers.len()))]
pub fn catch(handlers: HandlerMap<'_>) -> Result<Catcher<'_>, CatchError> {
    let mut types = TypeSet::new();
    for (index, (set, _)) in handlers.entries.iter().enumerate() {
        if set.is_empty() {
            return Err(CatchError::EmptyTypeSet { index });
        }
        if let Some(kind) = set.group_kind() {
            return Err(CatchError::GroupKind {
                kind: kind.name().to_string(),
            });
        }
        types = types.union(set);
    }
    debug!(%types, "catch configured");
    Ok(Catcher {
        entries: handlers.entries,
        types,
    })
}

/// Scope guard returned by [`catch`].
pub struct Catcher<'h> {
    entries: Vec<(TypeSet, Handler<'h>)>,
    /// Union of all registered type-sets.
    types: TypeSet,
}

impl fmt::Debug for Catcher<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catcher")
            .field("types", &self.types)
            .field("handlers", &self.entries.len())
            .finish()
    }
}

impl<'h> Catcher<'h> {
    /// Run `body` inside the scope.
    ///
    /// `Ok(Some(v))` on success, `Ok(None)` when the failure was absorbed,
    /// `Err` with the original or replacement failure otherwise.
    pub fn run<T, F>(&mut self, body: F) -> Result<Option<T>, Exception>
    where
        F: FnOnce() -> Result<T, Exception>,
    {
        let (value, error) = match body() {
            Ok(value) => (Some(value), None),
            Err(error) => (None, Some(error)),
        };
        match self.exit(error) {
            Disposition::Suppress => Ok(value),
            Disposition::Passthrough(e) | Disposition::Replace(e) => Err(e),
        }
    }

    /// Release step of the scope: decide what escapes.
    #[instrument(level = "debug", skip(self))]
    pub fn exit(&mut self, error: Option<Exception>) -> Disposition {
        let Some(error) = error else {
            trace!("clean exit");
            return Disposition::Suppress;
        };
        match self.handle_exception(&error) {
            None => {
                debug!("fully handled");
                Disposition::Suppress
            }
            Some(unhandled) if unhandled.ptr_eq(&error) => {
                debug!("no handler matched");
                Disposition::Passthrough(error)
            }
            Some(unhandled) => {
                debug!(%unhandled, "raising remainder");
                let detached = unhandled.cause().is_none() && unhandled.suppress_context();
                if detached {
                    Disposition::Replace(unhandled)
                } else {
                    Disposition::Replace(unhandled.without_cause())
                }
            }
        }
    }

    /// What remains of `exception` after the handlers ran; `None` when
    /// nothing does. An unmatched leaf comes back as the very same value.
    pub fn handle_exception(&mut self, exception: &Exception) -> Option<Exception> {
        match exception {
            Exception::Group(group) => self.handle_group(group),
            Exception::Leaf(leaf) => self.handle_leaf(leaf),
        }
    }

    /// Type-sets are applied in declaration order, each to what the earlier
    /// ones left unmatched. Handler results come first, the final unmatched
    /// remainder last.
    fn handle_group(&mut self, group: &ExceptionGroup) -> Option<Exception> {
        let mut unhandled = Vec::new();
        let mut rest = Some(group.clone());

        for index in 0..self.entries.len() {
            let Some(current) = rest.take() else {
                break;
            };
            let (matched, remaining) = current.split(&self.entries[index].0);
            rest = remaining;

            if let Some(matched) = matched {
                trace!(handler = index, members = matched.exceptions().len(), "type-set matched");
                for member in matched.exceptions() {
                    unhandled.extend(self.handle_exception(member));
                }
            }
        }

        unhandled.extend(rest.map(Exception::Group));
        ExceptionGroup::remainder(unhandled).map(Exception::Group)
    }

    fn handle_leaf(&mut self, leaf: &Leaf) -> Option<Exception> {
        let Some((index, (types, handler))) = self
            .entries
            .iter_mut()
            .enumerate()
            .find(|(_, entry)| entry.0.matches(leaf.kind()))
        else {
            trace!(?leaf, "no handler");
            return Some(Exception::Leaf(leaf.clone()));
        };

        debug!(handler = index, %types, ?leaf, "invoking handler");
        let wrapped = ExceptionGroup::wrap(Exception::Leaf(leaf.clone()));
        match (*handler)(&wrapped) {
            Ok(()) => None,
            Err(raised) => {
                debug!(%raised, "handler raised");
                let reraised = matches!(&raised, Exception::Leaf(l) if l.ptr_eq(leaf));
                if reraised || raised.context().is_some() {
                    Some(raised)
                } else {
                    Some(raised.with_context(leaf.clone()))
                }
            }
        }
    }
}
