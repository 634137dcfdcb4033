mod count_up;
mod count_viewer;

pub use count_up::{COUNT_UP_ACTION, CountUp};
pub use count_viewer::CountViewer;
