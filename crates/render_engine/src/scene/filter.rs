//! Item selection filters
//!
//! A filter is a (value, mask) pair over [`KeyFlags`]: a key passes when its
//! masked bits equal the filter's masked value bits. Filters select item
//! buckets (opaque shapes, transparent shapes, lights, per-tag subsets)
//! without iterating the whole index.

use std::cmp::Ordering;

use crate::scene::key::{
    layer_bits_with_key_bits, tag_bits_with_key_bits, ItemKey, KeyFlags, Layer, Tag,
    KEY_LAYER_BITS_MASK, LAYER_BACKGROUND, LAYER_DEFAULT, NUM_TAGS,
};

/// Predicate over [`ItemKey`] values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ItemFilter {
    /// Expected bit values, meaningful only where `mask` is set
    pub value: KeyFlags,
    /// Which bits participate in the test
    pub mask: KeyFlags,
}

impl ItemFilter {
    /// Create a filter directly from value and mask bits
    pub fn new(value: KeyFlags, mask: KeyFlags) -> Self {
        Self { value, mask }
    }

    /// Start building a filter
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Whether `key` passes this filter
    pub fn test(&self, key: &ItemKey) -> bool {
        (key.flags() & self.mask) == (self.value & self.mask)
    }

    /// Whether this filter cannot select anything meaningfully
    pub fn selects_nothing(&self) -> bool {
        self.mask.is_empty()
    }
}

// Deterministic ordering so filters can key sorted maps
impl PartialOrd for ItemFilter {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ItemFilter {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .bits()
            .cmp(&other.value.bits())
            .then_with(|| self.mask.bits().cmp(&other.mask.bits()))
    }
}

/// Accumulating builder for [`ItemFilter`]
#[derive(Debug, Clone, Copy, Default)]
pub struct Builder {
    value: KeyFlags,
    mask: KeyFlags,
}

impl Builder {
    /// Start from an existing filter
    pub fn from_filter(filter: ItemFilter) -> Self {
        Self {
            value: filter.value,
            mask: filter.mask,
        }
    }

    /// Finish building
    pub fn build(self) -> ItemFilter {
        ItemFilter::new(self.value, self.mask)
    }

    fn require(mut self, flag: KeyFlags, set: bool) -> Self {
        self.value.set(flag, set);
        self.mask.insert(flag);
        self
    }

    /// Keep only shapes
    pub fn with_type_shape(self) -> Self {
        self.require(KeyFlags::TYPE_SHAPE, true)
    }

    /// Keep only lights
    pub fn with_type_light(self) -> Self {
        self.require(KeyFlags::TYPE_LIGHT, true)
    }

    /// Keep only meta items
    pub fn with_type_meta(self) -> Self {
        self.require(KeyFlags::TYPE_META, true)
    }

    /// Keep only opaque items
    pub fn with_opaque(self) -> Self {
        self.require(KeyFlags::TRANSLUCENT, false)
    }

    /// Keep only transparent items
    pub fn with_transparent(self) -> Self {
        self.require(KeyFlags::TRANSLUCENT, true)
    }

    /// Keep only world-space items
    pub fn with_world_space(self) -> Self {
        self.require(KeyFlags::VIEW_SPACE, false)
    }

    /// Keep only view-space items
    pub fn with_view_space(self) -> Self {
        self.require(KeyFlags::VIEW_SPACE, true)
    }

    /// Keep only static items
    pub fn with_static(self) -> Self {
        self.require(KeyFlags::DYNAMIC, false)
    }

    /// Keep only dynamic items
    pub fn with_dynamic(self) -> Self {
        self.require(KeyFlags::DYNAMIC, true)
    }

    /// Keep only rigid items
    pub fn with_rigid(self) -> Self {
        self.require(KeyFlags::DEFORMED, false)
    }

    /// Keep only deformed items
    pub fn with_deformed(self) -> Self {
        self.require(KeyFlags::DEFORMED, true)
    }

    /// Keep only visible items
    pub fn with_visible(self) -> Self {
        self.require(KeyFlags::INVISIBLE, false)
    }

    /// Keep only invisible items
    pub fn with_invisible(self) -> Self {
        self.require(KeyFlags::INVISIBLE, true)
    }

    /// Keep only items that do not cast shadows
    pub fn with_no_shadow_caster(self) -> Self {
        self.require(KeyFlags::SHADOW_CASTER, false)
    }

    /// Keep only shadow casters
    pub fn with_shadow_caster(self) -> Self {
        self.require(KeyFlags::SHADOW_CASTER, true)
    }

    /// Require the given tag slot to be set
    pub fn with_tag(mut self, tag: Tag) -> Self {
        debug_assert!(tag < NUM_TAGS);
        let bit = KeyFlags::from_bits_retain(KeyFlags::TAG_0.bits() << u32::from(tag));
        self.value.insert(bit);
        self.mask.insert(bit);
        self
    }

    /// Require the given tag slot to be clear
    pub fn without_tag(mut self, tag: Tag) -> Self {
        debug_assert!(tag < NUM_TAGS);
        let bit = KeyFlags::from_bits_retain(KeyFlags::TAG_0.bits() << u32::from(tag));
        self.value.remove(bit);
        self.mask.insert(bit);
        self
    }

    /// Set the whole tag field in one call: expected bits plus touched bits
    pub fn with_tag_bits(mut self, tag_bits: u8, tag_mask: u8) -> Self {
        self.value = KeyFlags::from_bits_retain(tag_bits_with_key_bits(tag_bits, self.value.bits()));
        self.mask = KeyFlags::from_bits_retain(tag_bits_with_key_bits(tag_mask, self.mask.bits()));
        self
    }

    /// Keep only non-layered items
    pub fn without_layered(mut self) -> Self {
        self.value =
            KeyFlags::from_bits_retain(layer_bits_with_key_bits(LAYER_DEFAULT, self.value.bits()));
        self.mask = KeyFlags::from_bits_retain(self.mask.bits() | KEY_LAYER_BITS_MASK);
        self
    }

    /// Keep only items of the given layer
    pub fn with_layer(mut self, layer: Layer) -> Self {
        self.value = KeyFlags::from_bits_retain(layer_bits_with_key_bits(layer, self.value.bits()));
        self.mask = KeyFlags::from_bits_retain(self.mask.bits() | KEY_LAYER_BITS_MASK);
        self
    }

    /// Clear every constraint: the resulting filter selects nothing
    pub fn with_nothing(mut self) -> Self {
        self.value = KeyFlags::empty();
        self.mask = KeyFlags::empty();
        self
    }

    // Convenient standard filters used all over the pipeline

    /// Visible items with world-space bounds
    pub fn visible_world_items() -> Self {
        Self::default().with_visible().with_world_space()
    }

    /// Opaque world-space shapes
    pub fn opaque_shape() -> Self {
        Self::default().with_type_shape().with_opaque().with_world_space()
    }

    /// Transparent world-space shapes
    pub fn transparent_shape() -> Self {
        Self::default()
            .with_type_shape()
            .with_transparent()
            .with_world_space()
    }

    /// Lights
    pub fn light() -> Self {
        Self::default().with_type_light()
    }

    /// Meta items
    pub fn meta() -> Self {
        Self::default().with_type_meta()
    }

    /// The view-space background layer
    pub fn background() -> Self {
        Self::default().with_view_space().with_layer(LAYER_BACKGROUND)
    }

    /// A filter that selects nothing
    pub fn nothing() -> Self {
        Self::default().with_nothing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::key::Builder as KeyBuilder;

    #[test]
    fn test_masked_equality() {
        let opaque_shape = Builder::opaque_shape().build();

        let shape = KeyBuilder::opaque_shape().build();
        let transparent = KeyBuilder::transparent_shape().build();
        let light = KeyBuilder::light().build();

        assert!(opaque_shape.test(&shape));
        assert!(!opaque_shape.test(&transparent));
        assert!(!opaque_shape.test(&light));

        // Bits outside the mask are ignored
        let tagged_shape = KeyBuilder::opaque_shape().with_tag(2).build();
        assert!(opaque_shape.test(&tagged_shape));
    }

    #[test]
    fn test_without_requires_clear_bit() {
        let no_shadow = Builder::default().with_no_shadow_caster().build();
        assert!(no_shadow.test(&ItemKey::default()));
        assert!(!no_shadow.test(&KeyBuilder::default().with_shadow_caster().build()));
    }

    #[test]
    fn test_tag_subsets() {
        let tag3 = Builder::default().with_tag(3).build();
        assert!(tag3.test(&KeyBuilder::default().with_tag(3).build()));
        assert!(!tag3.test(&ItemKey::default()));

        let not_tag3 = Builder::default().without_tag(3).build();
        assert!(not_tag3.test(&ItemKey::default()));
        assert!(!not_tag3.test(&KeyBuilder::default().with_tag(3).build()));

        // Whole-field form: expect tag 0 set and tag 1 clear, ignore the rest
        let field = Builder::default().with_tag_bits(0b01, 0b11).build();
        assert!(field.test(&KeyBuilder::default().with_tag(0).with_tag(7).build()));
        assert!(!field.test(&KeyBuilder::default().with_tag(0).with_tag(1).build()));
    }

    #[test]
    fn test_layer_filters() {
        let background = Builder::background().build();
        assert!(background.test(&KeyBuilder::background().build()));
        assert!(!background.test(&KeyBuilder::opaque_shape().build()));

        let spatial_only = Builder::default().without_layered().build();
        assert!(spatial_only.test(&KeyBuilder::opaque_shape().build()));
        assert!(!spatial_only.test(&KeyBuilder::background().build()));
    }

    #[test]
    fn test_selects_nothing() {
        assert!(Builder::nothing().build().selects_nothing());
        assert!(!Builder::opaque_shape().build().selects_nothing());

        // A nothing-filter still "passes" every key by masked equality; the
        // pipeline checks selects_nothing() before trusting it
        assert!(Builder::nothing().build().test(&KeyBuilder::light().build()));
    }

    #[test]
    fn test_deterministic_ordering() {
        let a = Builder::opaque_shape().build();
        let b = Builder::transparent_shape().build();
        let c = Builder::light().build();
        let mut filters = vec![c, b, a];
        filters.sort();
        let mut again = vec![b, a, c];
        again.sort();
        assert_eq!(filters, again);
    }
}
