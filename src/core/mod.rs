pub mod clock;
pub mod config;
pub mod inference_client;
pub mod prompt;
pub mod session_state;

// Drawing and the per-frame loop
pub mod overlay;
pub mod classification_loop;
