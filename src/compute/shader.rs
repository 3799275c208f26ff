// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Compiled kernel programs.
//!
//! Kernel source is WGSL and otherwise opaque.  The only thing read from it on the host is
//! the set of `@compute` entry points, so that asking for an entry point the source does
//! not declare fails without a trip to the device.

use crate::compute::device::BoundDevice;
use crate::error::Error;
use crate::imp;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

pub(crate) fn hash_str(s: &str) -> u64 {
    let mut h = std::collections::hash_map::DefaultHasher::new();
    s.hash(&mut h);
    h.finish()
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Replaces comments with spaces.  Block comments nest.
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut depth = 0usize;
    let mut line_comment = false;
    while let Some(c) = chars.next() {
        if line_comment {
            if c == '\n' {
                line_comment = false;
                out.push('\n');
            }
            continue;
        }
        match (c, chars.peek()) {
            ('/', Some('*')) => {
                chars.next();
                depth += 1;
                out.push(' ');
            }
            ('*', Some('/')) if depth > 0 => {
                chars.next();
                depth -= 1;
                out.push(' ');
            }
            ('/', Some('/')) if depth == 0 => {
                chars.next();
                line_comment = true;
            }
            _ if depth > 0 => {}
            _ => out.push(c),
        }
    }
    out
}

/// Names of the functions marked `@compute`, in source order.
pub(crate) fn scan_entry_points(source: &str) -> Vec<String> {
    const ATTRIBUTE: &str = "@compute";
    let cleaned = strip_comments(source);
    let mut names = Vec::new();
    let mut rest = cleaned.as_str();
    while let Some(at) = rest.find(ATTRIBUTE) {
        rest = &rest[at + ATTRIBUTE.len()..];
        if rest.starts_with(is_ident_char) {
            //some longer attribute
            continue;
        }
        let mut tokens = rest.split(|c: char| !is_ident_char(c)).filter(|t| !t.is_empty());
        while let Some(token) = tokens.next() {
            if token == "fn" {
                if let Some(name) = tokens.next() {
                    names.push(name.to_string());
                }
                break;
            }
        }
    }
    names
}

/// Kernel source compiled into a device program.
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    label: String,
    source_hash: u64,
    entry_points: BTreeSet<String>,
    pub(crate) imp: imp::ShaderModule,
}

impl ShaderProgram {
    /// Compiles `source` on `device`.
    ///
    /// # Errors
    /// [Error::Compile] with the device's diagnostics if the source is rejected.
    pub async fn compile(device: &BoundDevice, label: &str, source: &str) -> Result<Self, Error> {
        let entry_points = scan_entry_points(source).into_iter().collect::<BTreeSet<_>>();
        let imp = imp::ShaderModule::compile(device.as_ref(), label, source).await?;
        logwise::info_sync!(
            "Compiled {label} with entry points {entry_points}",
            label = label,
            entry_points = logwise::privacy::LogIt(&entry_points)
        );
        Ok(ShaderProgram {
            label: label.to_string(),
            source_hash: hash_str(source),
            entry_points,
            imp,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Hash of the source text.  Programs compiled from identical text share it.
    pub fn source_hash(&self) -> u64 {
        self.source_hash
    }

    pub fn entry_points(&self) -> impl Iterator<Item = &str> {
        self.entry_points.iter().map(String::as_str)
    }

    pub fn declares(&self, entry_point: &str) -> bool {
        self.entry_points.contains(entry_point)
    }

    /// Fails with [Error::Compile] unless `entry_point` is declared.
    pub(crate) fn require_entry_point(&self, entry_point: &str) -> Result<(), Error> {
        if self.declares(entry_point) {
            Ok(())
        } else {
            Err(Error::Compile(format!(
                "{} has no compute entry point {entry_point:?}; declared: {:?}",
                self.label, self.entry_points
            )))
        }
    }
}
