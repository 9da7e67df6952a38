//! The wetting front and the ordered front list (spec §3.3, §3.4, §4.B).
//!
//! An owned, indexable `Vec<WettingFront>` on the engine: front order is the
//! vector order (index 0 = shallowest), "successor" means the next vector
//! element, and a snapshot is simply `FrontList::clone`.

use serde::{Deserialize, Serialize};

/// A single wetting front: a moving discontinuity in soil water content.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WettingFront {
    pub depth_cm: f64,
    pub theta: f64,
    pub psi_cm: f64,
    pub layer_num: usize,
    pub k_cm_per_h: f64,
    pub dzdt_cm_per_h: f64,
    /// True iff this front's leading edge sits exactly at its layer's bottom
    /// boundary (it has a companion front in the next layer, see §4.F phase 4).
    pub to_bottom: bool,
}

impl WettingFront {
    pub fn new(depth_cm: f64, theta: f64, psi_cm: f64, layer_num: usize, k_cm_per_h: f64) -> Self {
        Self {
            depth_cm,
            theta,
            psi_cm,
            layer_num,
            k_cm_per_h,
            dzdt_cm_per_h: 0.0,
            to_bottom: false,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.depth_cm.is_finite()
            && self.theta.is_finite()
            && self.psi_cm.is_finite()
            && self.k_cm_per_h.is_finite()
            && self.dzdt_cm_per_h.is_finite()
    }
}

/// The ordered collection of fronts, L = [f_1, .., f_N], shallowest first.
///
/// No single operation here re-establishes invariants I1-I6; that is the
/// job of the front advancer (§4.F), which calls these primitives and
/// restores the invariants by the time it returns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrontList {
    fronts: Vec<WettingFront>,
}

impl FrontList {
    pub fn new() -> Self {
        Self { fronts: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.fronts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fronts.is_empty()
    }

    pub fn append(&mut self, front: WettingFront) {
        self.fronts.push(front);
    }

    pub fn insert_before(&mut self, index: usize, front: WettingFront) {
        self.fronts.insert(index, front);
    }

    pub fn delete(&mut self, index: usize) -> WettingFront {
        self.fronts.remove(index)
    }

    /// An independent copy of the whole list, used for sub-step and
    /// front-creation snapshots (spec §3.6). Released (dropped) at the end
    /// of the scope that took it — no explicit free is needed in Rust.
    pub fn copy_whole_list(&self) -> FrontList {
        self.clone()
    }

    pub fn head(&self) -> Option<&WettingFront> {
        self.fronts.first()
    }

    pub fn head_mut(&mut self) -> Option<&mut WettingFront> {
        self.fronts.first_mut()
    }

    pub fn tail(&self) -> Option<&WettingFront> {
        self.fronts.last()
    }

    pub fn tail_mut(&mut self) -> Option<&mut WettingFront> {
        self.fronts.last_mut()
    }

    pub fn get(&self, index: usize) -> &WettingFront {
        &self.fronts[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut WettingFront {
        &mut self.fronts[index]
    }

    /// The immediate shallower and deeper neighbours of `index`, if any.
    pub fn neighbors(&self, index: usize) -> (Option<&WettingFront>, Option<&WettingFront>) {
        let prev = if index == 0 { None } else { self.fronts.get(index - 1) };
        let next = self.fronts.get(index + 1);
        (prev, next)
    }

    /// Indices of all fronts whose `layer_num` equals `layer_num`, in
    /// shallow-to-deep order.
    pub fn indices_in_layer(&self, layer_num: usize) -> Vec<usize> {
        self.fronts
            .iter()
            .enumerate()
            .filter(|(_, f)| f.layer_num == layer_num)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WettingFront> {
        self.fronts.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut WettingFront> {
        self.fronts.iter_mut()
    }

    pub fn as_slice(&self) -> &[WettingFront] {
        &self.fronts
    }

    pub fn to_vec(&self) -> Vec<WettingFront> {
        self.fronts.clone()
    }

    pub fn from_vec(fronts: Vec<WettingFront>) -> Self {
        Self { fronts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(depth: f64, theta: f64, layer: usize) -> WettingFront {
        WettingFront::new(depth, theta, 10.0, layer, 1.0)
    }

    #[test]
    fn append_and_index_roundtrip() {
        let mut list = FrontList::new();
        list.append(f(5.0, 0.3, 1));
        list.append(f(20.0, 0.2, 1));
        assert_eq!(list.len(), 2);
        assert_eq!(list.head().unwrap().depth_cm, 5.0);
        assert_eq!(list.tail().unwrap().depth_cm, 20.0);
    }

    #[test]
    fn neighbors_at_boundaries_are_none() {
        let mut list = FrontList::new();
        list.append(f(5.0, 0.3, 1));
        list.append(f(20.0, 0.2, 1));
        list.append(f(40.0, 0.1, 1));
        let (prev, next) = list.neighbors(0);
        assert!(prev.is_none());
        assert_eq!(next.unwrap().depth_cm, 20.0);
        let (prev, next) = list.neighbors(2);
        assert_eq!(prev.unwrap().depth_cm, 20.0);
        assert!(next.is_none());
    }

    #[test]
    fn indices_in_layer_filters_correctly() {
        let mut list = FrontList::new();
        list.append(f(5.0, 0.3, 1));
        list.append(f(20.0, 0.2, 1));
        list.append(f(40.0, 0.25, 2));
        assert_eq!(list.indices_in_layer(1), vec![0, 1]);
        assert_eq!(list.indices_in_layer(2), vec![2]);
    }

    #[test]
    fn copy_whole_list_is_independent() {
        let mut list = FrontList::new();
        list.append(f(5.0, 0.3, 1));
        let snapshot = list.copy_whole_list();
        list.get_mut(0).theta = 0.1;
        assert_eq!(snapshot.get(0).theta, 0.3);
    }
}
