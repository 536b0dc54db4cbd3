//! Grouped failures for Rust.
//!
//! An [`ExceptionGroup`] bundles several concurrently raised failures into
//! one value. Groups are immutable trees that can be [split](ExceptionGroup::split)
//! by kind while keeping their structure and provenance. [`catch`] builds a
//! scope that routes matching members to handlers and re-raises the rest.
//!
//! Kinds form an explicit hierarchy ([`ExceptionKind`], [`builtins`]) and all
//! matching is by subtype.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod util;

pub use application::{catch, Catcher, CatchError, Disposition, Handler, HandlerMap};
pub use domain::{
    builtins, Exception, ExceptionGroup, ExceptionKind, Frame, GroupError, GroupResult,
    KindRegistry, Leaf, Traceback, TypeSet,
};
