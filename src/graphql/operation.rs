// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Operation type detection for GraphQL documents.
//!
//! Only the top level of the document is inspected: operation keywords,
//! operation names and the opening brace of each definition. Selection sets,
//! variable definitions, comments and string literals are skipped. Validation
//! of the document is left to the execution engine.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// GraphQL operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    /// Whether the operation may change server state.
    pub fn is_mutation(self) -> bool {
        self == OperationKind::Mutation
    }
}

/// Operation selection failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperationError {
    #[error("Document contains no operation")]
    NoOperation,
    #[error("Operation name is required when the document contains multiple operations")]
    AmbiguousOperation,
    #[error("Unknown operation named \"{0}\"")]
    UnknownOperation(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct OperationDefinition {
    kind: OperationKind,
    name: Option<String>,
}

/// Determine the type of the operation `operation_name` selects in `query`.
pub fn classify(query: &str, operation_name: Option<&str>) -> Result<OperationKind, OperationError> {
    let operations = scan_operations(query);
    let selected = match operation_name.filter(|name| !name.is_empty()) {
        Some(name) => operations
            .iter()
            .find(|op| op.name.as_deref() == Some(name))
            .ok_or_else(|| OperationError::UnknownOperation(name.to_owned()))?,
        None => match operations.as_slice() {
            [] => return Err(OperationError::NoOperation),
            [single] => single,
            _ => return Err(OperationError::AmbiguousOperation),
        },
    };
    Ok(selected.kind)
}

/// Definition currently being read at the top level.
enum Pending {
    None,
    Operation {
        kind: OperationKind,
        name: Option<String>,
        expect_name: bool,
    },
    Fragment,
}

fn scan_operations(source: &str) -> Vec<OperationDefinition> {
    let bytes = source.as_bytes();
    let mut operations = Vec::new();
    let mut brace_depth = 0usize;
    let mut paren_depth = 0usize;
    let mut pending = Pending::None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'#' => {
                while i < bytes.len() && !is_line_terminator(bytes[i]) {
                    i += 1;
                }
                continue;
            }
            b'"' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'{' => {
                if brace_depth == 0 && paren_depth == 0 {
                    match std::mem::replace(&mut pending, Pending::None) {
                        Pending::Operation { kind, name, .. } => {
                            operations.push(OperationDefinition { kind, name })
                        }
                        Pending::None => operations.push(OperationDefinition {
                            kind: OperationKind::Query,
                            name: None,
                        }),
                        Pending::Fragment => {}
                    }
                }
                brace_depth += 1;
            }
            b'}' => brace_depth = brace_depth.saturating_sub(1),
            b'(' => {
                paren_depth += 1;
                stop_expecting_name(&mut pending);
            }
            b')' => paren_depth = paren_depth.saturating_sub(1),
            _ if is_name_start(b) => {
                let start = i;
                while i < bytes.len() && is_name_continue(bytes[i]) {
                    i += 1;
                }
                if brace_depth == 0 && paren_depth == 0 {
                    on_top_level_name(&source[start..i], &mut pending);
                }
                continue;
            }
            _ if b.is_ascii_whitespace() || b == b',' => {}
            _ => stop_expecting_name(&mut pending),
        }
        i += 1;
    }

    operations
}

fn on_top_level_name(name: &str, pending: &mut Pending) {
    match pending {
        Pending::None => {
            *pending = match name {
                "query" => operation(OperationKind::Query),
                "mutation" => operation(OperationKind::Mutation),
                "subscription" => operation(OperationKind::Subscription),
                "fragment" => Pending::Fragment,
                _ => Pending::None,
            };
        }
        Pending::Operation {
            name: slot,
            expect_name,
            ..
        } => {
            if *expect_name {
                *slot = Some(name.to_owned());
                *expect_name = false;
            }
        }
        Pending::Fragment => {}
    }
}

fn operation(kind: OperationKind) -> Pending {
    Pending::Operation {
        kind,
        name: None,
        expect_name: true,
    }
}

fn stop_expecting_name(pending: &mut Pending) {
    if let Pending::Operation { expect_name, .. } = pending {
        *expect_name = false;
    }
}

/// Return the index just past the string literal starting at `start`.
fn skip_string(bytes: &[u8], start: usize) -> usize {
    if bytes[start..].starts_with(b"\"\"\"") {
        let mut i = start + 3;
        while i < bytes.len() {
            if bytes[i] == b'\\' && bytes[i + 1..].starts_with(b"\"\"\"") {
                i += 4;
            } else if bytes[i..].starts_with(b"\"\"\"") {
                return i + 3;
            } else {
                i += 1;
            }
        }
        return bytes.len();
    }

    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return i + 1,
            b if is_line_terminator(b) => return i,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// GraphQL ends a line on `\n`, `\r` or `\r\n`.
fn is_line_terminator(b: u8) -> bool {
    b == b'\n' || b == b'\r'
}

fn is_name_start(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphabetic()
}

fn is_name_continue(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphanumeric()
}
