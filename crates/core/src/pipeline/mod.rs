pub mod capture_loop_use_case;
pub mod extract_faces_use_case;
pub mod loop_logger;
pub mod process_image_use_case;
