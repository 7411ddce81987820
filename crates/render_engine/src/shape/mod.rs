//! Shape pipeline dispatch boundary
//!
//! A shape characterizes its draw pipeline through a [`ShapeKey`], a
//! fixed-width bitset; the [`ShapePlumber`] registry resolves keys to
//! precompiled pipeline objects owned by the render backend. The culling
//! core only guarantees the contract at this boundary: unknown keys yield
//! no pipeline and are logged once per distinct key, never raising an
//! error.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use bitflags::bitflags;

bitflags! {
    /// Raw bit storage of a [`ShapeKey`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShapeKeyFlags: u16 {
        /// Blended, drawn in the translucent pass
        const TRANSLUCENT = 1 << 0;
        /// Samples a lightmap
        const LIGHTMAP = 1 << 1;
        /// Carries tangent-space data
        const TANGENTS = 1 << 2;
        /// Skinned by a joint palette
        const SKINNED = 1 << 3;
        /// No lighting model applied
        const UNLIT = 1 << 4;
        /// Rendered with a depth bias
        const DEPTH_BIAS = 1 << 5;
        /// Rendered as wireframe
        const WIREFRAME = 1 << 6;
        /// Back-face culling disabled
        const NO_CULL_FACE = 1 << 7;
        /// Cross-fading in or out
        const FADE = 1 << 8;
        /// The shape configures its own pipeline; the registry is bypassed
        const OWN_PIPELINE = 1 << 9;
        /// Not a usable key
        const INVALID = 1 << 10;
    }
}

/// Bitset key selecting a draw pipeline for a shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ShapeKey {
    flags: ShapeKeyFlags,
}

impl ShapeKey {
    /// Start building a key
    pub fn builder() -> ShapeKeyBuilder {
        ShapeKeyBuilder::default()
    }

    /// The raw bits of this key
    pub fn flags(&self) -> ShapeKeyFlags {
        self.flags
    }

    /// Drawn in the translucent pass
    pub fn is_translucent(&self) -> bool {
        self.flags.contains(ShapeKeyFlags::TRANSLUCENT)
    }

    /// Samples a lightmap
    pub fn has_lightmap(&self) -> bool {
        self.flags.contains(ShapeKeyFlags::LIGHTMAP)
    }

    /// Carries tangent-space data
    pub fn has_tangents(&self) -> bool {
        self.flags.contains(ShapeKeyFlags::TANGENTS)
    }

    /// Skinned by a joint palette
    pub fn is_skinned(&self) -> bool {
        self.flags.contains(ShapeKeyFlags::SKINNED)
    }

    /// No lighting model applied
    pub fn is_unlit(&self) -> bool {
        self.flags.contains(ShapeKeyFlags::UNLIT)
    }

    /// Rendered with a depth bias
    pub fn has_depth_bias(&self) -> bool {
        self.flags.contains(ShapeKeyFlags::DEPTH_BIAS)
    }

    /// Rendered as wireframe
    pub fn is_wireframe(&self) -> bool {
        self.flags.contains(ShapeKeyFlags::WIREFRAME)
    }

    /// Back-face culling disabled
    pub fn is_cull_face(&self) -> bool {
        !self.flags.contains(ShapeKeyFlags::NO_CULL_FACE)
    }

    /// Cross-fading in or out
    pub fn is_faded(&self) -> bool {
        self.flags.contains(ShapeKeyFlags::FADE)
    }

    /// The shape configures its own pipeline
    pub fn has_own_pipeline(&self) -> bool {
        self.flags.contains(ShapeKeyFlags::OWN_PIPELINE)
    }

    /// Whether this key can select a pipeline at all
    pub fn is_valid(&self) -> bool {
        !self.flags.contains(ShapeKeyFlags::INVALID)
    }
}

/// Accumulating builder for [`ShapeKey`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ShapeKeyBuilder {
    flags: ShapeKeyFlags,
}

impl ShapeKeyBuilder {
    /// Finish building
    pub fn build(self) -> ShapeKey {
        ShapeKey { flags: self.flags }
    }

    /// Draw in the translucent pass
    pub fn with_translucent(mut self) -> Self {
        self.flags.insert(ShapeKeyFlags::TRANSLUCENT);
        self
    }

    /// Sample a lightmap
    pub fn with_lightmap(mut self) -> Self {
        self.flags.insert(ShapeKeyFlags::LIGHTMAP);
        self
    }

    /// Carry tangent-space data
    pub fn with_tangents(mut self) -> Self {
        self.flags.insert(ShapeKeyFlags::TANGENTS);
        self
    }

    /// Skin by a joint palette
    pub fn with_skinned(mut self) -> Self {
        self.flags.insert(ShapeKeyFlags::SKINNED);
        self
    }

    /// Apply no lighting model
    pub fn with_unlit(mut self) -> Self {
        self.flags.insert(ShapeKeyFlags::UNLIT);
        self
    }

    /// Render with a depth bias
    pub fn with_depth_bias(mut self) -> Self {
        self.flags.insert(ShapeKeyFlags::DEPTH_BIAS);
        self
    }

    /// Render as wireframe
    pub fn with_wireframe(mut self) -> Self {
        self.flags.insert(ShapeKeyFlags::WIREFRAME);
        self
    }

    /// Disable back-face culling
    pub fn with_no_cull_face(mut self) -> Self {
        self.flags.insert(ShapeKeyFlags::NO_CULL_FACE);
        self
    }

    /// Cross-fade in or out
    pub fn with_fade(mut self) -> Self {
        self.flags.insert(ShapeKeyFlags::FADE);
        self
    }

    /// Let the shape configure its own pipeline
    pub fn with_own_pipeline(mut self) -> Self {
        self.flags.insert(ShapeKeyFlags::OWN_PIPELINE);
        self
    }

    /// Mark the key unusable
    pub fn invalid(mut self) -> Self {
        self.flags.insert(ShapeKeyFlags::INVALID);
        self
    }
}

/// Registry resolving [`ShapeKey`]s to the render backend's pipeline objects
///
/// An explicit object passed by reference rather than a process-wide
/// registry, so tests and tools can construct isolated instances. The
/// pipeline type is the backend's own; the culling core never inspects it.
#[derive(Debug)]
pub struct ShapePlumber<P> {
    pipelines: HashMap<ShapeKey, P>,
    // distinct keys already reported missing, to log each once
    missing_keys: Mutex<HashSet<ShapeKey>>,
}

impl<P> Default for ShapePlumber<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> ShapePlumber<P> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            pipelines: HashMap::new(),
            missing_keys: Mutex::new(HashSet::new()),
        }
    }

    /// Number of registered pipelines
    pub fn num_pipelines(&self) -> usize {
        self.pipelines.len()
    }

    /// Register a pipeline for a key, returning the registered pipeline
    ///
    /// Registering a key that already has a pipeline keeps and returns the
    /// existing one.
    pub fn add_pipeline(&mut self, key: ShapeKey, pipeline: P) -> &P {
        match self.pipelines.entry(key) {
            std::collections::hash_map::Entry::Occupied(existing) => {
                log::debug!("ShapePlumber: pipeline already registered for {:?}", key);
                existing.into_mut()
            }
            std::collections::hash_map::Entry::Vacant(slot) => slot.insert(pipeline),
        }
    }

    /// Look up the pipeline for a key
    ///
    /// Own-pipeline shapes resolve to no pipeline by design. An invalid or
    /// unregistered key also yields `None`, logged once per distinct key;
    /// the caller skips drawing that item rather than failing.
    pub fn pick_pipeline(&self, key: &ShapeKey) -> Option<&P> {
        if key.has_own_pipeline() {
            return None;
        }

        let found = if key.is_valid() {
            self.pipelines.get(key)
        } else {
            None
        };

        if found.is_none() {
            if let Ok(mut missing) = self.missing_keys.lock() {
                if missing.insert(*key) {
                    log::warn!("ShapePlumber: no pipeline for {:?}", key);
                }
            }
        }

        found
    }
}
