pub use self::{
    classifier::{Classification, HeuristicClassifier, StateClassifier, StateType},
    frame::*,
    signature::*,
    tile::*,
};

pub mod classifier;
mod frame;
mod signature;
mod tile;
