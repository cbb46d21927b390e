//! Closed set of geometry items that can be placed in a [`World`](crate::world::World).
//!
//! The item set is fixed (room, CTDI phantom, fluence scorer), so dispatch
//! goes through the [`Item`] enum rather than trait objects. Each variant
//! owns its geometry and its scored state. Scoring during transport goes into
//! an [`ItemTally`] that mirrors the variant; worker threads fill their own
//! tallies which are merged back into the items after each exposure.

use nalgebra::{Point3, Vector3};
use std::ops::AddAssign;

use crate::ctdi::{CtdiPhantom, CtdiTally};
use crate::dose::DoseScore;
use crate::error::Result;
use crate::fluence::{FluenceScore, FluenceTally};
use crate::geom::Aabb;
use crate::material::Material;
use crate::particle::Particle;
use crate::room::EnclosedRoom;

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn tallies_only_merge_matching_kinds() {
        let mut room = Item::from(EnclosedRoom::default());
        let mut tally = room.tally();
        if let ItemTally::Room(score) = &mut tally {
            score.record(5.0);
        }
        // a fluence tally is ignored by a room
        let other = Item::from(FluenceScore::default()).tally();
        room.merge(&other);
        room.merge(&tally);
        let Item::Room(r) = &room else {
            panic!("expected a room");
        };
        assert_eq!(r.energy_imparted().energy_imparted, 5.0);
        room.clear_scored();
        let Item::Room(r) = &room else {
            panic!("expected a room");
        };
        assert_eq!(r.energy_imparted().energy_imparted, 0.0);
    }

    #[test]
    fn kinds_round_trip_through_item() {
        let mut item: Item = CtdiPhantom::default().into();
        assert_eq!(item.kind_name(), "CtdiPhantom");
        assert!(CtdiPhantom::from_item(&item).is_some());
        assert!(FluenceScore::from_item_mut(&mut item).is_none());
    }
}

/// Material and density governing attenuation in a region.
#[derive(Debug, Clone, Copy)]
pub struct Medium<'a> {
    pub material: &'a Material,
    /// Mass density (g/cm³).
    pub density: f64,
}

impl Medium<'_> {
    /// Linear attenuation coefficient (1/cm) at `energy` keV.
    pub fn linear_attenuation(&self, energy: f64) -> f64 {
        self.material.linear_attenuation(energy, self.density)
    }
}

/// A geometry item placed in the world.
#[derive(Debug, Clone)]
pub enum Item {
    Room(EnclosedRoom),
    Ctdi(CtdiPhantom),
    Fluence(FluenceScore),
}

/// Scored state collected for one item during transport.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemTally {
    Room(DoseScore),
    Ctdi(CtdiTally),
    Fluence(FluenceTally),
}

impl AddAssign<&ItemTally> for ItemTally {
    fn add_assign(&mut self, other: &ItemTally) {
        match (self, other) {
            (ItemTally::Room(a), ItemTally::Room(b)) => *a += *b,
            (ItemTally::Ctdi(a), ItemTally::Ctdi(b)) => *a += b,
            (ItemTally::Fluence(a), ItemTally::Fluence(b)) => *a += b,
            _ => {}
        }
    }
}

/// Item types that can be created with [`World::add_item`](crate::world::World::add_item)
/// and looked up again by kind.
pub trait ItemKind: Default + Into<Item> {
    fn from_item(item: &Item) -> Option<&Self>;
    fn from_item_mut(item: &mut Item) -> Option<&mut Self>;
}

impl From<EnclosedRoom> for Item {
    fn from(room: EnclosedRoom) -> Self {
        Item::Room(room)
    }
}

impl From<CtdiPhantom> for Item {
    fn from(phantom: CtdiPhantom) -> Self {
        Item::Ctdi(phantom)
    }
}

impl From<FluenceScore> for Item {
    fn from(score: FluenceScore) -> Self {
        Item::Fluence(score)
    }
}

impl ItemKind for EnclosedRoom {
    fn from_item(item: &Item) -> Option<&Self> {
        match item {
            Item::Room(room) => Some(room),
            _ => None,
        }
    }

    fn from_item_mut(item: &mut Item) -> Option<&mut Self> {
        match item {
            Item::Room(room) => Some(room),
            _ => None,
        }
    }
}

impl ItemKind for CtdiPhantom {
    fn from_item(item: &Item) -> Option<&Self> {
        match item {
            Item::Ctdi(phantom) => Some(phantom),
            _ => None,
        }
    }

    fn from_item_mut(item: &mut Item) -> Option<&mut Self> {
        match item {
            Item::Ctdi(phantom) => Some(phantom),
            _ => None,
        }
    }
}

impl ItemKind for FluenceScore {
    fn from_item(item: &Item) -> Option<&Self> {
        match item {
            Item::Fluence(score) => Some(score),
            _ => None,
        }
    }

    fn from_item_mut(item: &mut Item) -> Option<&mut Self> {
        match item {
            Item::Fluence(score) => Some(score),
            _ => None,
        }
    }
}

impl Item {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Item::Room(_) => "EnclosedRoom",
            Item::Ctdi(_) => "CtdiPhantom",
            Item::Fluence(_) => "FluenceScore",
        }
    }

    pub fn aabb(&self) -> Aabb {
        match self {
            Item::Room(room) => room.aabb(),
            Item::Ctdi(phantom) => phantom.aabb(),
            Item::Fluence(score) => score.aabb(),
        }
    }

    /// Validates the geometry and resolves default materials. Called by
    /// [`World::build`](crate::world::World::build) with the item's index.
    pub fn prepare(&mut self, index: usize) -> Result<()> {
        match self {
            Item::Room(room) => room.prepare(index),
            Item::Ctdi(phantom) => phantom.prepare(index),
            Item::Fluence(score) => score.prepare(index),
        }
    }

    /// Distance to the nearest surface of this item ahead of the ray.
    pub fn intersect(&self, pos: &Point3<f64>, dir: &Vector3<f64>) -> Option<f64> {
        match self {
            Item::Room(room) => room.intersect(pos, dir),
            Item::Ctdi(phantom) => phantom.intersect(pos, dir),
            Item::Fluence(score) => score.intersect(pos, dir),
        }
    }

    /// Zone index and medium at `pos`, or `None` when the point is not in
    /// material owned by this item.
    pub fn medium_at(&self, pos: &Point3<f64>) -> Option<(usize, Medium<'_>)> {
        match self {
            Item::Room(room) => room.medium_at(pos),
            Item::Ctdi(phantom) => phantom.medium_at(pos),
            Item::Fluence(_) => None,
        }
    }

    /// A zeroed tally matching this item.
    pub fn tally(&self) -> ItemTally {
        match self {
            Item::Room(_) => ItemTally::Room(DoseScore::new()),
            Item::Ctdi(phantom) => ItemTally::Ctdi(phantom.tally()),
            Item::Fluence(score) => ItemTally::Fluence(score.tally()),
        }
    }

    /// Scores weighted energy `energy` (keV) deposited in `zone`.
    pub fn deposit(&self, tally: &mut ItemTally, zone: usize, energy: f64) {
        match (self, tally) {
            (Item::Room(_), ItemTally::Room(score)) => score.record(energy),
            (Item::Ctdi(phantom), ItemTally::Ctdi(t)) => phantom.deposit(t, zone, energy),
            _ => {}
        }
    }

    /// Scores a straight track of `length` cm travelled inside `zone`.
    pub fn score_track(&self, tally: &mut ItemTally, zone: usize, particle: &Particle, length: f64) {
        if let (Item::Ctdi(phantom), ItemTally::Ctdi(t)) = (self, tally) {
            phantom.score_track(t, zone, particle, length);
        }
    }

    /// Scores a particle crossing one of this item's surfaces.
    pub fn score_crossing(&self, tally: &mut ItemTally, particle: &Particle) {
        if let (Item::Fluence(score), ItemTally::Fluence(t)) = (self, tally) {
            score.score_crossing(t, particle);
        }
    }

    /// Adds a tally into the item's scored state. Tallies of another kind are ignored.
    pub fn merge(&mut self, tally: &ItemTally) {
        match (self, tally) {
            (Item::Room(room), ItemTally::Room(t)) => room.merge(t),
            (Item::Ctdi(phantom), ItemTally::Ctdi(t)) => phantom.merge(t),
            (Item::Fluence(score), ItemTally::Fluence(t)) => score.merge(t),
            _ => {}
        }
    }

    /// Resets the scored state without touching geometry.
    pub fn clear_scored(&mut self) {
        match self {
            Item::Room(room) => room.clear_scored(),
            Item::Ctdi(phantom) => phantom.clear_scored(),
            Item::Fluence(score) => score.clear_scored(),
        }
    }
}
