pub mod check;
pub mod inspect;
pub mod project;
pub mod render;
