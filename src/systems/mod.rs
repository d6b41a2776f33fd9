pub mod motion_system;
