//! The scene: geometry items, fill medium and spatial index.
//!
//! Items are added and configured through [`World::add_item`], then
//! [`World::build`] validates them, resolves default materials and builds the
//! bounding volume hierarchy. Once built, transport only reads geometry and
//! writes scored state through [`WorldTally`] merges. Space inside the world
//! bounds that is not claimed by an item is filled with the fill medium (dry
//! air by default); space outside the bounds is vacuum and a particle that
//! leaves the bounds has escaped.

use log::debug;
use nalgebra::{Point3, Vector3};
use std::ops::AddAssign;

use crate::bvh::Bvh;
use crate::config::WORLD_MARGIN;
use crate::dose::DoseScore;
use crate::error::{Error, Result};
use crate::geom::Aabb;
use crate::item::{Item, ItemKind, ItemTally, Medium};
use crate::material::Material;


/// Where a point lies: owning item (if any), zone inside that item and the
/// governing medium.
#[derive(Debug, Clone, Copy)]
pub struct Location<'a> {
    pub item: Option<usize>,
    pub zone: usize,
    pub medium: Medium<'a>,
}

/// Thread-local scored state for a whole world.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldTally {
    pub items: Vec<ItemTally>,
    /// Energy imparted in the fill medium.
    pub fill: DoseScore,
}

impl AddAssign<&WorldTally> for WorldTally {
    fn add_assign(&mut self, other: &WorldTally) {
        for (a, b) in self.items.iter_mut().zip(other.items.iter()) {
            *a += b;
        }
        self.fill += other.fill;
    }
}

impl WorldTally {
    /// Scores weighted energy `energy` (keV) deposited at `location`.
    pub fn deposit(&mut self, world: &World, location: &Location, energy: f64) {
        match location.item {
            Some(i) => world.items[i].deposit(&mut self.items[i], location.zone, energy),
            None => self.fill.record(energy),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct World {
    items: Vec<Item>,
    fill_material: Option<Material>,
    fill_density: Option<f64>,
    bvh: Bvh,
    bounds: Option<Aabb>,
    built: bool,
    fill_scored: DoseScore,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve_number_of_items(&mut self, additional: usize) {
        self.items.reserve(additional);
    }

    /// Adds a default item of kind `K` and returns it for configuration.
    /// The world must be (re)built afterwards.
    pub fn add_item<K: ItemKind>(&mut self) -> &mut K {
        self.built = false;
        self.items.push(K::default().into());
        let index = self.items.len() - 1;
        match K::from_item_mut(&mut self.items[index]) {
            Some(item) => item,
            None => unreachable!("item {} was inserted as its own kind", index),
        }
    }

    /// Sets the medium filling space not claimed by any item.
    pub fn set_fill_material(&mut self, material: Material, density: f64) {
        self.built = false;
        self.fill_material = Some(material);
        self.fill_density = Some(density);
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Item `index` if it is of kind `K`.
    pub fn get<K: ItemKind>(&self, index: usize) -> Option<&K> {
        self.items.get(index).and_then(K::from_item)
    }

    /// Mutable access to item `index`. Invalidates the build.
    pub fn get_mut<K: ItemKind>(&mut self, index: usize) -> Option<&mut K> {
        self.built = false;
        self.items.get_mut(index).and_then(K::from_item_mut)
    }

    /// All items of kind `K` in insertion order.
    pub fn items_of<K: ItemKind + 'static>(&self) -> impl Iterator<Item = &K> + '_ {
        self.items.iter().filter_map(K::from_item)
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Validates every item, resolves default materials and builds the
    /// spatial index. Calling it again without changes gives the same index.
    pub fn build(&mut self) -> Result<()> {
        self.built = false;
        if self.items.is_empty() {
            return Err(Error::InvalidGeometry {
                item: 0,
                kind: "World",
                reason: "world has no items".into(),
            });
        }
        for (index, item) in self.items.iter_mut().enumerate() {
            item.prepare(index)?;
            let aabb = item.aabb();
            if aabb.is_degenerate() {
                return Err(Error::InvalidGeometry {
                    item: index,
                    kind: item.kind_name(),
                    reason: format!("bounding box {:?} has zero volume", aabb),
                });
            }
        }
        if self.fill_material.is_none() {
            let air = Material::by_nist_name("Air, Dry (near sea level)")?;
            self.fill_density = Some(air.standard_density());
            self.fill_material = Some(air);
        }

        let boxes: Vec<Aabb> = self.items.iter().map(|i| i.aabb()).collect();
        let bounds = boxes
            .iter()
            .fold(Aabb::empty(), |acc, b| acc.union(b))
            .expanded(WORLD_MARGIN);
        self.bvh = Bvh::build(&boxes);
        self.bounds = Some(bounds);
        self.built = true;
        debug!(
            "world built with {} items, bounds {:?} to {:?}",
            self.items.len(),
            bounds.min,
            bounds.max
        );
        Ok(())
    }

    /// World bounds. Empty before the first build.
    pub fn bounds(&self) -> Aabb {
        self.bounds.unwrap_or_else(Aabb::empty)
    }

    /// Distance along the ray until it leaves the world bounds.
    pub fn exit_distance(&self, pos: &Point3<f64>, dir: &Vector3<f64>) -> Option<f64> {
        self.bounds?.ray_interval(pos, dir).map(|(_, t1)| t1)
    }

    /// Distance along the ray until it enters the world bounds, zero when inside.
    pub fn entry_distance(&self, pos: &Point3<f64>, dir: &Vector3<f64>) -> Option<f64> {
        self.bounds?.ray_interval(pos, dir).map(|(t0, _)| t0.max(0.0))
    }

    /// Medium governing `pos`, or `None` outside the world bounds.
    pub fn locate(&self, pos: &Point3<f64>) -> Option<Location<'_>> {
        if !self.bounds?.contains(pos) {
            return None;
        }
        let found = self.bvh.first_containing(pos, |i| {
            self.items[i]
                .medium_at(pos)
                .map(|(zone, medium)| Location {
                    item: Some(i),
                    zone,
                    medium,
                })
        });
        if found.is_some() {
            return found;
        }
        let material = self.fill_material.as_ref()?;
        Some(Location {
            item: None,
            zone: 0,
            medium: Medium {
                material,
                density: self.fill_density?,
            },
        })
    }

    /// Closest item surface ahead of the ray as `(item index, distance)`.
    pub fn intersect_nearest(&self, pos: &Point3<f64>, dir: &Vector3<f64>) -> Option<(usize, f64)> {
        self.bvh
            .nearest(pos, dir, |i| self.items[i].intersect(pos, dir))
    }

    /// Zeroed tallies for every item.
    pub fn tally(&self) -> WorldTally {
        WorldTally {
            items: self.items.iter().map(|i| i.tally()).collect(),
            fill: DoseScore::new(),
        }
    }

    /// Adds a tally into the items' scored state.
    pub fn merge_tally(&mut self, tally: &WorldTally) {
        for (item, t) in self.items.iter_mut().zip(tally.items.iter()) {
            item.merge(t);
        }
        self.fill_scored += tally.fill;
    }

    /// Energy imparted in the fill medium.
    pub fn fill_energy_imparted(&self) -> DoseScore {
        self.fill_scored
    }

    /// Item `index` for scoring calls from the transport loop.
    pub(crate) fn item(&self, index: usize) -> &Item {
        &self.items[index]
    }

    /// Resets the scored state of every item. Geometry and the index are kept.
    pub fn clear_dose_scored(&mut self) {
        for item in self.items.iter_mut() {
            item.clear_scored();
        }
        self.fill_scored.clear();
    }
}
