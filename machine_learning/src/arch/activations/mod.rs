mod act_fn;
mod leaky_relu;

pub use act_fn::ActFn;
pub use leaky_relu::LeakyRelu;
