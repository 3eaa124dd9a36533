pub mod capture_frame;
