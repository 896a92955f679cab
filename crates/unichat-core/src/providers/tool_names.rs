//! Tool name sanitizing
//!
//! Backends restrict function names (OpenAI and Gemini accept roughly
//! `^[a-zA-Z_][a-zA-Z0-9_.-]{0,63}$`). Executor tool names are free-form, so
//! declarations go out under a sanitized name and incoming calls are mapped
//! back through the same `ToolNameMap`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::types::Tool;

/// Longest name backends accept
pub const MAX_TOOL_NAME_LEN: usize = 64;

static INVALID_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_.]").expect("static pattern"));

/// Sanitize one tool name
///
/// Characters outside `[A-Za-z0-9_.]` become `_`; a name that does not start
/// with a letter or underscore gets a `tool_` prefix; the result is cut to
/// 64 characters.
pub fn sanitize_tool_name(name: &str) -> String {
    let mut sanitized = INVALID_CHARS.replace_all(name, "_").into_owned();
    let starts_ok = sanitized
        .chars()
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if !starts_ok {
        sanitized.insert_str(0, "tool_");
    }
    // only ASCII remains, byte truncation is safe
    sanitized.truncate(MAX_TOOL_NAME_LEN);
    sanitized
}

/// Two-way mapping between declared and wire tool names for one request
#[derive(Debug, Clone, Default)]
pub struct ToolNameMap {
    to_wire: HashMap<String, String>,
    to_declared: HashMap<String, String>,
}

impl ToolNameMap {
    /// Build the mapping for a request's tool declarations
    ///
    /// Deterministic: the same declaration order yields the same wire names.
    /// Colliding sanitized names get a numeric suffix (`_2`, `_3`, ...).
    pub fn new(tools: &[Tool]) -> Self {
        let mut map = Self::default();
        for tool in tools {
            if map.to_wire.contains_key(&tool.name) {
                continue;
            }
            let base = sanitize_tool_name(&tool.name);
            let mut wire = base.clone();
            let mut n = 2;
            while map.to_declared.contains_key(&wire) {
                let suffix = format!("_{}", n);
                let mut stem = base.clone();
                stem.truncate(MAX_TOOL_NAME_LEN - suffix.len());
                wire = format!("{}{}", stem, suffix);
                n += 1;
            }
            map.to_declared.insert(wire.clone(), tool.name.clone());
            map.to_wire.insert(tool.name.clone(), wire);
        }
        map
    }

    /// Wire name for a declared tool
    pub fn wire_name(&self, declared: &str) -> String {
        self.to_wire
            .get(declared)
            .cloned()
            .unwrap_or_else(|| sanitize_tool_name(declared))
    }

    /// Declared name for a name the backend sent back
    pub fn declared_name(&self, wire: &str) -> String {
        self.to_declared
            .get(wire)
            .cloned()
            .unwrap_or_else(|| wire.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.to_wire.is_empty()
    }
}
