pub mod align;
pub mod compute;
pub mod consts;
pub mod error;
pub mod filters;
pub mod flow;
pub mod frame;
pub mod io;
pub mod output;
pub mod pipeline;
pub mod stack;
pub mod warp;
