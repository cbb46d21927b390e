pub mod atoms;
pub mod beam;
pub mod bvh;
pub mod compounds;
pub mod config;
pub mod ctdi;
pub mod dose;
pub mod error;
pub mod fluence;
pub mod geom;
pub mod helpers;
pub mod interactions;
pub mod item;
pub mod material;
pub mod output;
pub mod particle;
pub mod room;
pub mod settings;
pub mod transport;
pub mod tube;
pub mod world;
