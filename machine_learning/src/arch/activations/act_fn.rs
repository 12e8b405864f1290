use super::LeakyRelu;
use crate::arch::ActFnSpec;

/// An element-wise activation applied after a dense layer.
#[derive(Clone, Debug)]
pub enum ActFn {
    LeakyRelu(LeakyRelu),
}

impl ActFn {
    pub fn leaky_relu(slope: f32) -> Self {
        Self::LeakyRelu(LeakyRelu::new(slope))
    }

    pub fn f(&self, x: f32) -> f32 {
        match self {
            Self::LeakyRelu(a) => a.f(x),
        }
    }

    pub fn df(&self, x: f32) -> f32 {
        match self {
            Self::LeakyRelu(a) => a.df(x),
        }
    }
}

impl From<ActFnSpec> for ActFn {
    fn from(spec: ActFnSpec) -> Self {
        match spec {
            ActFnSpec::LeakyRelu { slope } => ActFn::leaky_relu(slope),
        }
    }
}
