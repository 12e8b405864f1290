pub mod activations;
pub mod layers;
pub mod loss;
mod model;
mod sequential;
mod spec;

pub use model::{Mode, Model};
pub use sequential::Sequential;
pub use spec::{ActFnSpec, LayerSpec, ModelSpec};
