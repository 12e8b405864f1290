/// Rectifier that lets a small slope through for negative inputs.
#[derive(Clone, Debug, Default)]
pub struct LeakyRelu {
    slope: f32,
}

impl LeakyRelu {
    pub fn new(slope: f32) -> Self {
        Self { slope }
    }

    pub fn f(&self, z: f32) -> f32 {
        if z > 0. { z } else { self.slope * z }
    }

    pub fn df(&self, z: f32) -> f32 {
        if z > 0. { 1. } else { self.slope }
    }
}
