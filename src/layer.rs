//! Soil layers (spec §3.2): thickness, soil-type reference, and the
//! precomputed cumulative-depth boundaries the front advancer walks.

use serde::{Deserialize, Serialize};

use crate::soil::SoilType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    /// 1-based layer index, matching the original's 1-indexed layer arrays.
    pub layer_num: usize,
    pub thickness_cm: f64,
    pub soil_type_idx: usize,
    /// Depth of this layer's bottom boundary from the surface, cm.
    pub cumulative_depth_cm: f64,
    /// Multiplies Ks when the frozen-soil coupler is active. Default 1.0.
    pub frozen_factor: f64,
}

impl Layer {
    pub fn top_depth_cm(&self) -> f64 {
        self.cumulative_depth_cm - self.thickness_cm
    }
}

/// Ordered set of layers with precomputed cumulative boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerStack {
    layers: Vec<Layer>,
}

impl LayerStack {
    /// Builds a stack from (thickness_cm, soil_type_idx) pairs, computing
    /// cumulative boundaries and defaulting frozen_factor to 1.0.
    pub fn new(layer_specs: Vec<(f64, usize)>) -> Self {
        let mut cumulative = 0.0;
        let layers = layer_specs
            .into_iter()
            .enumerate()
            .map(|(i, (thickness_cm, soil_type_idx))| {
                cumulative += thickness_cm;
                Layer {
                    layer_num: i + 1,
                    thickness_cm,
                    soil_type_idx,
                    cumulative_depth_cm: cumulative,
                    frozen_factor: 1.0,
                }
            })
            .collect();
        Self { layers }
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn get(&self, layer_num: usize) -> &Layer {
        &self.layers[layer_num - 1]
    }

    pub fn get_mut(&mut self, layer_num: usize) -> &mut Layer {
        &mut self.layers[layer_num - 1]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    pub fn total_depth_cm(&self) -> f64 {
        self.layers.last().map(|l| l.cumulative_depth_cm).unwrap_or(0.0)
    }

    /// The layer index (1-based) containing `depth_cm`. A depth exactly on a
    /// boundary belongs to the shallower (upper) layer, consistent with
    /// invariant I3's treatment of `to_bottom` fronts.
    pub fn layer_at_depth(&self, depth_cm: f64) -> usize {
        for layer in &self.layers {
            if depth_cm <= layer.cumulative_depth_cm {
                return layer.layer_num;
            }
        }
        self.layers.len()
    }

    pub fn set_frozen_factor(&mut self, layer_num: usize, factor: f64) {
        self.get_mut(layer_num).frozen_factor = factor;
    }

    /// Effective Ks for the soil type of `layer_num`, scaled by its frozen
    /// factor (spec §3.2 / §6 `sft_coupled`).
    pub fn effective_ks_cm_per_h(&self, layer_num: usize, soil_types: &[SoilType]) -> f64 {
        let layer = self.get(layer_num);
        soil_types[layer.soil_type_idx].ks_cm_per_h * layer.frozen_factor
    }

    /// Scales an unscaled `K(theta)` value by `layer_num`'s frozen factor.
    /// Since `K(theta)` is linear in `Ks`, this is equivalent to having
    /// computed it with an effective (frozen-scaled) `Ks` in the first place.
    pub fn scale_k(&self, layer_num: usize, k_unscaled: f64) -> f64 {
        k_unscaled * self.get(layer_num).frozen_factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_are_cumulative() {
        let stack = LayerStack::new(vec![(20.0, 0), (30.0, 1), (150.0, 1)]);
        assert_eq!(stack.get(1).cumulative_depth_cm, 20.0);
        assert_eq!(stack.get(2).cumulative_depth_cm, 50.0);
        assert_eq!(stack.get(3).cumulative_depth_cm, 200.0);
        assert_eq!(stack.total_depth_cm(), 200.0);
    }

    #[test]
    fn layer_at_depth_assigns_boundary_to_upper_layer() {
        let stack = LayerStack::new(vec![(20.0, 0), (30.0, 1)]);
        assert_eq!(stack.layer_at_depth(10.0), 1);
        assert_eq!(stack.layer_at_depth(20.0), 1);
        assert_eq!(stack.layer_at_depth(20.0001), 2);
        assert_eq!(stack.layer_at_depth(50.0), 2);
    }
}
