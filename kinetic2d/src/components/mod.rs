//! Built-in components: physics bindings and texture drawing.

mod body;
mod fixture;
mod joint;
mod sprite;

pub use body::BodyComponent;
pub use fixture::FixtureComponent;
pub use joint::JointComponent;
pub use sprite::TextureRenderer;
