//! Turns macro names and `--use` selections into the set of handles to run.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::constants::AUTO_MACRO;
use crate::handlers::HandlerRegistry;
use crate::macros::MacroStore;

/// Deduplicated handle names requested for this run.
pub type RequestSet = BTreeSet<String>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("can't find the macro '{0}' in the macro file")]
    UnknownMacro(String),
    #[error("no handler provides the handle '{0}'")]
    UnknownHandle(String),
}

/// Union of the named macros' handles and `explicit_use`.
///
/// `auto` is never looked up.
///
/// # Errors
///
/// Returns [`SelectionError::UnknownMacro`] for the first macro name that is
/// not in `store`.
pub fn expand(
    store: &MacroStore,
    macros: &[String],
    explicit_use: &[String],
) -> Result<RequestSet, SelectionError> {
    let mut requested = RequestSet::new();

    for name in macros.iter().filter(|m| m.as_str() != AUTO_MACRO) {
        let handles = store
            .get(name)
            .ok_or_else(|| SelectionError::UnknownMacro(name.clone()))?;
        requested.extend(handles.iter().cloned());
    }

    requested.extend(explicit_use.iter().cloned());
    Ok(requested)
}

/// [`expand`], then check every handle against the registry.
///
/// # Errors
///
/// Returns [`SelectionError::UnknownMacro`] or
/// [`SelectionError::UnknownHandle`]; both abort the run before any dispatch.
pub fn resolve(
    store: &MacroStore,
    macros: &[String],
    explicit_use: &[String],
    registry: &HandlerRegistry,
) -> Result<RequestSet, SelectionError> {
    let requested = expand(store, macros, explicit_use)?;

    if let Some(unknown) = requested.iter().find(|h| !registry.knows(h)) {
        return Err(SelectionError::UnknownHandle(unknown.clone()));
    }

    Ok(requested)
}
