pub mod face_detector;
pub mod region_selector;
