pub mod recording_dirs;
pub mod session_info;
