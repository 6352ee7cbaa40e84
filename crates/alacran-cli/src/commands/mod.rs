mod build;
mod doctor;
mod render;
mod templates;
mod validate;

pub use build::build;
pub use doctor::doctor;
pub use render::render;
pub use templates::templates;
pub use validate::validate;
