// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Compute pipeline cache.
//!
//! A [ComputePipeline] is one entry point of one [ShaderProgram] compiled against one
//! [BindingLayoutSignature].  Device-side compilation is the expensive part of a dispatch,
//! so [PipelineCache] performs it at most once per
//! `(source hash, entry point, signature)`.
//!
//! Programs are cached the same way, keyed by the hash of their source text.

use crate::bindings::bind_style::BindingLayoutSignature;
use crate::compute::device::BoundDevice;
use crate::compute::shader::{ShaderProgram, hash_str};
use crate::error::Error;
use crate::imp;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_PIPELINE_ID: AtomicU64 = AtomicU64::new(0);

/// Identifies a compiled pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub source_hash: u64,
    pub entry_point: String,
    pub signature: BindingLayoutSignature,
}

/// A compiled, executable pipeline.
///
/// Clones share the compiled device object.
#[derive(Debug, Clone)]
pub struct ComputePipeline {
    id: u64,
    key: PipelineKey,
    pub(crate) imp: imp::Pipeline,
}

impl ComputePipeline {
    /// Compiles `entry_point` of `program` for `signature`, bypassing any cache.
    ///
    /// # Errors
    /// [Error::Compile] if the program does not declare `entry_point`, or the device rejects
    /// the combination (typically a kernel interface that disagrees with `signature`).
    pub async fn compile(
        device: &BoundDevice,
        program: &ShaderProgram,
        entry_point: &str,
        signature: &BindingLayoutSignature,
    ) -> Result<Self, Error> {
        program.require_entry_point(entry_point)?;
        let label = format!("{}::{entry_point}", program.label());
        let imp = imp::Pipeline::new(
            device.as_ref(),
            &label,
            &program.imp,
            entry_point,
            signature,
        )
        .await?;
        Ok(ComputePipeline {
            id: NEXT_PIPELINE_ID.fetch_add(1, Ordering::Relaxed),
            key: PipelineKey {
                source_hash: program.source_hash(),
                entry_point: entry_point.to_string(),
                signature: signature.clone(),
            },
            imp,
        })
    }

    /// Process-unique identifier.  Pipelines served from one cache entry share it.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn key(&self) -> &PipelineKey {
        &self.key
    }

    pub fn entry_point(&self) -> &str {
        &self.key.entry_point
    }

    pub fn signature(&self) -> &BindingLayoutSignature {
        &self.key.signature
    }
}

/// Memoizes programs and pipelines.
#[derive(Debug, Default)]
pub struct PipelineCache {
    programs: HashMap<u64, ShaderProgram>,
    pipelines: HashMap<PipelineKey, ComputePipeline>,
    compilations: usize,
}

impl PipelineCache {
    /// Creates an empty pipeline cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the program for `source`, compiling it the first time it is seen.
    pub async fn program(
        &mut self,
        device: &BoundDevice,
        label: &str,
        source: &str,
    ) -> Result<ShaderProgram, Error> {
        let source_hash = hash_str(source);
        if let Some(program) = self.programs.get(&source_hash) {
            return Ok(program.clone());
        }
        let program = ShaderProgram::compile(device, label, source).await?;
        self.programs.insert(source_hash, program.clone());
        Ok(program)
    }

    /// Retrieves an existing pipeline or compiles a new one.
    pub async fn get_or_create(
        &mut self,
        device: &BoundDevice,
        program: &ShaderProgram,
        entry_point: &str,
        signature: &BindingLayoutSignature,
    ) -> Result<ComputePipeline, Error> {
        let key = PipelineKey {
            source_hash: program.source_hash(),
            entry_point: entry_point.to_string(),
            signature: signature.clone(),
        };
        if let Some(pipeline) = self.pipelines.get(&key) {
            logwise::trace_sync!("pipeline cache hit {entry_point}", entry_point = entry_point);
            return Ok(pipeline.clone());
        }
        let pipeline = ComputePipeline::compile(device, program, entry_point, signature).await?;
        self.compilations += 1;
        logwise::info_sync!(
            "Compiled pipeline {entry_point} with {bindings} bindings",
            entry_point = entry_point,
            bindings = signature.entries().len()
        );
        self.pipelines.insert(key, pipeline.clone());
        Ok(pipeline)
    }

    /// Compiles (or reuses) both the program for `source` and the requested pipeline.
    pub async fn compile(
        &mut self,
        device: &BoundDevice,
        label: &str,
        source: &str,
        entry_point: &str,
        signature: &BindingLayoutSignature,
    ) -> Result<ComputePipeline, Error> {
        let program = self.program(device, label, source).await?;
        self.get_or_create(device, &program, entry_point, signature)
            .await
    }

    /// Number of pipelines compiled on the device through this cache.
    pub fn compilations(&self) -> usize {
        self.compilations
    }

    /// Number of cached pipelines.
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Drops every cached program and pipeline.
    pub fn clear(&mut self) {
        self.programs.clear();
        self.pipelines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{PipelineCache, PipelineKey};
    use crate::bindings::bind_style::{AccessMode, BindSlot, BindingLayoutSignature};

    #[test]
    fn keys_compare_by_every_component() {
        let signature =
            BindingLayoutSignature::new(vec![(BindSlot::new(0), AccessMode::ReadOnlyStorage)])
                .unwrap();
        let key = PipelineKey {
            source_hash: 1,
            entry_point: "main".to_string(),
            signature: signature.clone(),
        };
        assert_eq!(key.clone(), key);
        let other_entry = PipelineKey {
            entry_point: "other".to_string(),
            ..key.clone()
        };
        assert_ne!(other_entry, key);
        let other_source = PipelineKey {
            source_hash: 2,
            ..key.clone()
        };
        assert_ne!(other_source, key);
    }

    #[test]
    fn new_cache_is_empty() {
        let cache = PipelineCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.compilations(), 0);
    }
}
