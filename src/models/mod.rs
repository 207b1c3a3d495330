// Data models for frames, pose detection and classification, and session state

pub mod capture;
pub mod pose;
pub mod session;
