//! Item classification keys
//!
//! The key is the KEY to filter items and build specialized lists: a
//! fixed-width set of named flags describing everything the render pipeline
//! needs to know to route an item (type, translucency, space, dynamics,
//! visibility, tags, layer). Keys are immutable values built through an
//! accumulating [`Builder`]; equality and hashing are bitwise.

use bitflags::bitflags;

/// One of the eight independent tag slots of an [`ItemKey`]
pub type Tag = u8;

/// Number of available tag slots
pub const NUM_TAGS: Tag = 8;

/// Layer slot of an [`ItemKey`], in `0..NUM_LAYERS`
pub type Layer = u8;

/// The default layer: items here are not considered layered
pub const LAYER_DEFAULT: Layer = 0;

/// Last layer, the background by convention
pub const LAYER_BACKGROUND: Layer = 7;

/// Number of exclusive layers (encoded in 3 bits)
pub const NUM_LAYERS: Layer = 8;

const TAG_SHIFT: u32 = 9;
const TAG_BITS_MASK: u32 = 0xFF << TAG_SHIFT;

const LAYER_SHIFT: u32 = TAG_SHIFT + 8;
const LAYER_BITS_MASK: u32 = 0x07 << LAYER_SHIFT;

bitflags! {
    /// Raw flag storage shared by [`ItemKey`] and
    /// [`crate::scene::filter::ItemFilter`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct KeyFlags: u32 {
        /// Item draws a geometry with a material
        const TYPE_SHAPE = 1 << 0;
        /// Item contributes lighting
        const TYPE_LIGHT = 1 << 1;
        /// Item stands for a higher-level object represented by sub-items
        const TYPE_META = 1 << 2;

        /// Transparent, not opaque
        const TRANSLUCENT = 1 << 3;
        /// Bound expressed in view space, not world space
        const VIEW_SPACE = 1 << 4;
        /// Bound will change, unlike a static item
        const DYNAMIC = 1 << 5;
        /// Deformed within its bound, not solid
        const DEFORMED = 1 << 6;
        /// Not visible in the scene
        const INVISIBLE = 1 << 7;
        /// Item casts shadows
        const SHADOW_CASTER = 1 << 8;

        /// First of the eight independent tag bits
        const TAG_0 = 1u32 << TAG_SHIFT;
        /// Tag slot 1
        const TAG_1 = 1u32 << (TAG_SHIFT + 1);
        /// Tag slot 2
        const TAG_2 = 1u32 << (TAG_SHIFT + 2);
        /// Tag slot 3
        const TAG_3 = 1u32 << (TAG_SHIFT + 3);
        /// Tag slot 4
        const TAG_4 = 1u32 << (TAG_SHIFT + 4);
        /// Tag slot 5
        const TAG_5 = 1u32 << (TAG_SHIFT + 5);
        /// Tag slot 6
        const TAG_6 = 1u32 << (TAG_SHIFT + 6);
        /// Tag slot 7
        const TAG_7 = 1u32 << (TAG_SHIFT + 7);

        /// The 3-bit exclusive layer field
        const LAYER_BITS = LAYER_BITS_MASK;

        /// Item is smaller than the cell it landed in; set by the spatial
        /// tree, deferred to a per-item size test at selection time
        const SMALLER = 1 << 20;
    }
}

/// Replace the tag field of `key_bits` with `tag_bits`
pub(crate) fn tag_bits_with_key_bits(tag_bits: u8, key_bits: u32) -> u32 {
    (key_bits & !TAG_BITS_MASK) | (u32::from(tag_bits) << TAG_SHIFT)
}

/// Replace the layer field of `key_bits` with `layer`
pub(crate) fn layer_bits_with_key_bits(layer: Layer, key_bits: u32) -> u32 {
    (key_bits & !LAYER_BITS_MASK) | (u32::from(layer & (NUM_LAYERS - 1)) << LAYER_SHIFT)
}

/// Render-relevant classification of a scene item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ItemKey {
    flags: KeyFlags,
}

impl ItemKey {
    /// Create a key directly from raw flags
    pub fn from_flags(flags: KeyFlags) -> Self {
        Self { flags }
    }

    /// The raw flag set of this key
    pub fn flags(&self) -> KeyFlags {
        self.flags
    }

    /// Start building a key
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Item is a shape
    pub fn is_shape(&self) -> bool {
        self.flags.contains(KeyFlags::TYPE_SHAPE)
    }

    /// Item is a light
    pub fn is_light(&self) -> bool {
        self.flags.contains(KeyFlags::TYPE_LIGHT)
    }

    /// Item is a meta grouping of sub-items
    pub fn is_meta(&self) -> bool {
        self.flags.contains(KeyFlags::TYPE_META)
    }

    /// Item is opaque
    pub fn is_opaque(&self) -> bool {
        !self.is_transparent()
    }

    /// Item is transparent
    pub fn is_transparent(&self) -> bool {
        self.flags.contains(KeyFlags::TRANSLUCENT)
    }

    /// Bound is expressed in world space
    pub fn is_world_space(&self) -> bool {
        !self.is_view_space()
    }

    /// Bound is expressed in view space
    pub fn is_view_space(&self) -> bool {
        self.flags.contains(KeyFlags::VIEW_SPACE)
    }

    /// Bound does not change frame to frame
    pub fn is_static(&self) -> bool {
        !self.is_dynamic()
    }

    /// Bound changes frame to frame
    pub fn is_dynamic(&self) -> bool {
        self.flags.contains(KeyFlags::DYNAMIC)
    }

    /// Item is solid within its bound
    pub fn is_rigid(&self) -> bool {
        !self.is_deformed()
    }

    /// Item deforms within its bound
    pub fn is_deformed(&self) -> bool {
        self.flags.contains(KeyFlags::DEFORMED)
    }

    /// Item is visible in the scene
    pub fn is_visible(&self) -> bool {
        !self.is_invisible()
    }

    /// Item is hidden
    pub fn is_invisible(&self) -> bool {
        self.flags.contains(KeyFlags::INVISIBLE)
    }

    /// Item casts shadows
    pub fn is_shadow_caster(&self) -> bool {
        self.flags.contains(KeyFlags::SHADOW_CASTER)
    }

    /// Whether the given tag slot is set
    pub fn is_tag(&self, tag: Tag) -> bool {
        debug_assert!(tag < NUM_TAGS);
        self.flags.bits() & (1u32 << (TAG_SHIFT + u32::from(tag))) != 0
    }

    /// All eight tag slots packed into one byte
    pub fn tag_bits(&self) -> u8 {
        ((self.flags.bits() & TAG_BITS_MASK) >> TAG_SHIFT) as u8
    }

    /// The layer this item belongs to
    pub fn layer(&self) -> Layer {
        ((self.flags.bits() & LAYER_BITS_MASK) >> LAYER_SHIFT) as Layer
    }

    /// Whether the item belongs to the given layer
    pub fn is_layer(&self, layer: Layer) -> bool {
        self.layer() == layer
    }

    /// Whether the item belongs to any non-default layer
    pub fn is_layered(&self) -> bool {
        self.layer() != LAYER_DEFAULT
    }

    /// Whether the item participates in the spatial index
    pub fn is_spatial(&self) -> bool {
        !self.is_layered()
    }

    /// Whether the spatial tree classified this item as smaller than its cell
    pub fn is_small(&self) -> bool {
        self.flags.contains(KeyFlags::SMALLER)
    }

    /// Set or clear the smaller-than-cell classification
    ///
    /// Owned by the spatial tree; not part of the public builder vocabulary.
    pub fn set_smaller(&mut self, smaller: bool) {
        self.flags.set(KeyFlags::SMALLER, smaller);
    }
}

/// Accumulating builder for [`ItemKey`]
#[derive(Debug, Clone, Copy, Default)]
pub struct Builder {
    flags: KeyFlags,
}

impl Builder {
    /// Start from an existing key
    pub fn from_key(key: ItemKey) -> Self {
        Self { flags: key.flags }
    }

    /// Finish building
    pub fn build(self) -> ItemKey {
        ItemKey::from_flags(self.flags)
    }

    /// Mark the item as a shape
    pub fn with_type_shape(mut self) -> Self {
        self.flags.insert(KeyFlags::TYPE_SHAPE);
        self
    }

    /// Mark the item as a light
    pub fn with_type_light(mut self) -> Self {
        self.flags.insert(KeyFlags::TYPE_LIGHT);
        self
    }

    /// Mark the item as a meta grouping
    pub fn with_type_meta(mut self) -> Self {
        self.flags.insert(KeyFlags::TYPE_META);
        self
    }

    /// Mark the item as transparent
    pub fn with_transparent(mut self) -> Self {
        self.flags.insert(KeyFlags::TRANSLUCENT);
        self
    }

    /// Express the bound in view space
    pub fn with_view_space(mut self) -> Self {
        self.flags.insert(KeyFlags::VIEW_SPACE);
        self
    }

    /// Express the bound in world space
    pub fn without_view_space(mut self) -> Self {
        self.flags.remove(KeyFlags::VIEW_SPACE);
        self
    }

    /// Mark the bound as changing frame to frame
    pub fn with_dynamic(mut self) -> Self {
        self.flags.insert(KeyFlags::DYNAMIC);
        self
    }

    /// Mark the item as deformed within its bound
    pub fn with_deformed(mut self) -> Self {
        self.flags.insert(KeyFlags::DEFORMED);
        self
    }

    /// Hide the item
    pub fn with_invisible(mut self) -> Self {
        self.flags.insert(KeyFlags::INVISIBLE);
        self
    }

    /// Show the item
    pub fn with_visible(mut self) -> Self {
        self.flags.remove(KeyFlags::INVISIBLE);
        self
    }

    /// Mark the item as a shadow caster
    pub fn with_shadow_caster(mut self) -> Self {
        self.flags.insert(KeyFlags::SHADOW_CASTER);
        self
    }

    /// Clear the shadow caster mark
    pub fn without_shadow_caster(mut self) -> Self {
        self.flags.remove(KeyFlags::SHADOW_CASTER);
        self
    }

    /// Set one tag slot
    pub fn with_tag(mut self, tag: Tag) -> Self {
        debug_assert!(tag < NUM_TAGS);
        self.flags = KeyFlags::from_bits_retain(
            self.flags.bits() | (1u32 << (TAG_SHIFT + u32::from(tag))),
        );
        self
    }

    /// Set all tag slots in one call from packed tag bits
    pub fn with_tag_bits(mut self, tag_bits: u8) -> Self {
        self.flags =
            KeyFlags::from_bits_retain(tag_bits_with_key_bits(tag_bits, self.flags.bits()));
        self
    }

    /// Put the item in the given layer
    pub fn with_layer(mut self, layer: Layer) -> Self {
        self.flags =
            KeyFlags::from_bits_retain(layer_bits_with_key_bits(layer, self.flags.bits()));
        self
    }

    /// Put the item back in the default (non-layered) layer
    pub fn without_layer(self) -> Self {
        self.with_layer(LAYER_DEFAULT)
    }

    // Convenient standard keys used all over the pipeline

    /// An opaque world-space shape
    pub fn opaque_shape() -> Self {
        Self::default().with_type_shape()
    }

    /// A transparent world-space shape
    pub fn transparent_shape() -> Self {
        Self::default().with_type_shape().with_transparent()
    }

    /// A light
    pub fn light() -> Self {
        Self::default().with_type_light()
    }

    /// The view-space background layer
    pub fn background() -> Self {
        Self::default().with_view_space().with_layer(LAYER_BACKGROUND)
    }
}

pub(crate) const KEY_LAYER_BITS_MASK: u32 = LAYER_BITS_MASK;
