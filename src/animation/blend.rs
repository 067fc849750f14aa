//! Per-target blend weight allocation.
//!
//! Every bone or slot touched by an active state owns one [`BlendState`].
//! States are visited in descending layer order each tick; higher layers
//! take weight first and lower layers share whatever remains.

use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendKind {
    /// Bone transform timelines.
    Bone,
    /// Slot display-index timelines.
    SlotDisplay,
}

/// Index of the object a blend state writes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendTarget {
    Bone(usize),
    Slot(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlendState {
    /// Contributions accepted or rejected this tick.
    pub(crate) dirty: u32,
    layer: i32,
    left_weight: f32,
    layer_weight: f32,
    blend_weight: f32,
    target: BlendTarget,
}

impl BlendState {
    #[must_use]
    pub fn new(target: BlendTarget) -> Self {
        Self {
            dirty: 0,
            layer: 0,
            left_weight: 0.0,
            layer_weight: 0.0,
            blend_weight: 0.0,
            target,
        }
    }

    /// Offers a contribution from a state on `layer` with `weight`.
    ///
    /// Returns `true` when the contribution is accepted; the weight it must
    /// apply is then available from [`BlendState::blend_weight`].
    pub fn update(&mut self, layer: i32, weight: f32) -> bool {
        if self.dirty == 0 {
            self.dirty = 1;
            self.layer = layer;
            self.left_weight = 1.0;
            self.blend_weight = weight;
            self.layer_weight = weight;
            return true;
        }

        if self.left_weight <= 0.0 {
            return false;
        }

        if self.layer != layer {
            if self.layer_weight >= self.left_weight {
                // Higher layers consumed everything.
                self.dirty += 1;
                self.layer = layer;
                self.left_weight = 0.0;
                self.blend_weight = 0.0;
                return false;
            }
            self.layer = layer;
            self.left_weight -= self.layer_weight;
            self.layer_weight = 0.0;
        }

        self.dirty += 1;
        self.blend_weight = weight * self.left_weight;
        self.layer_weight += self.blend_weight;
        true
    }

    pub fn reset(&mut self) {
        self.dirty = 0;
        self.layer = 0;
        self.left_weight = 0.0;
        self.layer_weight = 0.0;
        self.blend_weight = 0.0;
    }

    /// Whether the last accepted contribution was the first of this tick.
    #[inline]
    #[must_use]
    pub fn is_first(&self) -> bool {
        self.dirty == 1
    }

    #[inline]
    #[must_use]
    pub fn blend_weight(&self) -> f32 {
        self.blend_weight
    }

    #[inline]
    #[must_use]
    pub fn left_weight(&self) -> f32 {
        self.left_weight
    }

    #[inline]
    #[must_use]
    pub fn layer_weight(&self) -> f32 {
        self.layer_weight
    }

    #[inline]
    #[must_use]
    pub fn target(&self) -> BlendTarget {
        self.target
    }
}

/// Lazily populated blend states keyed by kind and target name.
#[derive(Debug, Default)]
pub struct BlendTable {
    states: FxHashMap<BlendKind, FxHashMap<String, BlendState>>,
}

impl BlendTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the state for `(kind, name)`, creating it bound to `target`.
    ///
    /// The target is only recorded on creation.
    pub fn get_or_create(&mut self, kind: BlendKind, name: &str, target: BlendTarget) -> &mut BlendState {
        self.states
            .entry(kind)
            .or_default()
            .entry(name.to_owned())
            .or_insert_with(|| BlendState::new(target))
    }

    #[must_use]
    pub fn get(&self, kind: BlendKind, name: &str) -> Option<&BlendState> {
        self.states.get(&kind)?.get(name)
    }

    pub fn reset_all(&mut self) {
        self.states
            .values_mut()
            .flat_map(|states| states.values_mut())
            .for_each(BlendState::reset);
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.values().map(|states| states.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-6;

    #[test]
    fn first_contribution_claims_layer() {
        let mut state = BlendState::new(BlendTarget::Bone(0));
        assert!(state.update(2, 0.75));
        assert!(state.is_first());
        assert!((state.blend_weight() - 0.75).abs() < EPSILON);
    }

    #[test]
    fn lower_layer_gets_the_remainder() {
        let mut state = BlendState::new(BlendTarget::Bone(0));
        assert!(state.update(1, 0.75));
        assert!(state.update(0, 1.0));
        assert!((state.blend_weight() - 0.25).abs() < EPSILON);
    }

    #[test]
    fn saturated_higher_layer_blocks_lower() {
        let mut state = BlendState::new(BlendTarget::Bone(0));
        assert!(state.update(1, 1.0));
        assert!(!state.update(0, 1.0));
        assert!(!state.update(-1, 1.0));
        assert_eq!(state.blend_weight(), 0.0);
    }

    #[test]
    fn same_layer_weights_add() {
        let mut state = BlendState::new(BlendTarget::Slot(3));
        assert!(state.update(0, 0.5));
        assert!(state.update(0, 0.5));
        assert!((state.layer_weight() - 1.0).abs() < EPSILON);
        assert_eq!(state.dirty, 2);
    }

    #[test]
    fn target_binds_only_on_creation() {
        let mut table = BlendTable::new();
        table.get_or_create(BlendKind::Bone, "arm", BlendTarget::Bone(1));
        let state = table.get_or_create(BlendKind::Bone, "arm", BlendTarget::Bone(9));
        assert_eq!(state.target(), BlendTarget::Bone(1));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn reset_all_zeroes_every_state() {
        let mut table = BlendTable::new();
        table.get_or_create(BlendKind::Bone, "a", BlendTarget::Bone(0)).update(0, 1.0);
        table.get_or_create(BlendKind::SlotDisplay, "b", BlendTarget::Slot(0)).update(0, 1.0);
        table.reset_all();
        assert_eq!(table.get(BlendKind::Bone, "a").map(|s| s.dirty), Some(0));
        assert_eq!(table.get(BlendKind::SlotDisplay, "b").map(|s| s.dirty), Some(0));
    }
}
