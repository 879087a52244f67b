// Copyright 2024 The Gecko Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;
use std::{error, result};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NoError,      // will never be produced
    DoesNotExist, // the referenced element isn't part of the project
    Generic,
    EmptyName,
    DuplicateName,
    InvalidStartState,
    StateNotInAutomaton,
    ContractNotOnSource,
    CyclicSystem,
    CannotRemoveRoot,
    SelfConnection,
    SameLevelConnection,
    IllegalConnection,
    DestinationConnected,
    MissingDependency,
    EmptyClipboard,
    ModeMismatch,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ErrorCode::*;
        let name = match self {
            NoError => "no_error",
            DoesNotExist => "does_not_exist",
            Generic => "generic",
            EmptyName => "empty_name",
            DuplicateName => "duplicate_name",
            InvalidStartState => "invalid_start_state",
            StateNotInAutomaton => "state_not_in_automaton",
            ContractNotOnSource => "contract_not_on_source",
            CyclicSystem => "cyclic_system",
            CannotRemoveRoot => "cannot_remove_root",
            SelfConnection => "self_connection",
            SameLevelConnection => "same_level_connection",
            IllegalConnection => "illegal_connection",
            DestinationConnected => "destination_connected",
            MissingDependency => "missing_dependency",
            EmptyClipboard => "empty_clipboard",
            ModeMismatch => "mode_mismatch",
        };

        write!(f, "{name}")
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A lookup or factory call against the project failed.
    Model,
    /// A structural rule would be broken by the requested mutation.
    Invariant,
    /// Copy/paste could not run at all (nothing copied, wrong editor).
    Clipboard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub details: Option<String>,
}

impl Error {
    pub fn new(kind: ErrorKind, code: ErrorCode, details: Option<String>) -> Self {
        Error {
            kind,
            code,
            details,
        }
    }

    pub fn get_details(&self) -> Option<String> {
        self.details.clone()
    }

    pub fn is_invariant_violation(&self) -> bool {
        self.kind == ErrorKind::Invariant
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self.kind {
            ErrorKind::Model => "ModelError",
            ErrorKind::Invariant => "InvariantViolation",
            ErrorKind::Clipboard => "ClipboardError",
        };
        match self.details {
            Some(ref details) => write!(f, "{}{{{}: {}}}", kind, self.code, details),
            None => write!(f, "{}{{{}}}", kind, self.code),
        }
    }
}

impl error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;

#[macro_export]
macro_rules! model_err(
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(
            ErrorKind::Model,
            ErrorCode::$code,
            Some($str),
        ))
    }}
);

#[macro_export]
macro_rules! invariant_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(
            ErrorKind::Invariant,
            ErrorCode::$code,
            Some($str),
        ))
    }};
    ($code:tt) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Invariant, ErrorCode::$code, None))
    }};
}

#[macro_export]
macro_rules! clipboard_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(
            ErrorKind::Clipboard,
            ErrorCode::$code,
            Some($str),
        ))
    }};
    ($code:tt) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Clipboard, ErrorCode::$code, None))
    }};
}

#[test]
fn test_error_display() {
    let err = Error::new(
        ErrorKind::Invariant,
        ErrorCode::IllegalConnection,
        Some("Element_3 -> Element_4".to_string()),
    );
    assert_eq!(
        "InvariantViolation{illegal_connection: Element_3 -> Element_4}",
        format!("{err}")
    );
    assert!(err.is_invariant_violation());

    let err = Error::new(ErrorKind::Clipboard, ErrorCode::EmptyClipboard, None);
    assert_eq!("ClipboardError{empty_clipboard}", format!("{err}"));
    assert!(!err.is_invariant_violation());
}

#[test]
fn test_error_macros() {
    let r: Result<()> = invariant_err!(SelfConnection);
    let err = r.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Invariant);
    assert_eq!(err.code, ErrorCode::SelfConnection);
    assert!(err.get_details().is_none());

    let r: Result<()> = model_err!(DoesNotExist, "state 7".to_string());
    let err = r.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Model);
    assert_eq!(err.get_details(), Some("state 7".to_string()));
}
