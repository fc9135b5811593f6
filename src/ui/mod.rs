pub mod events;
pub mod renderer;
pub mod widgets;
