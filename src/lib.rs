// src/lib.rs

pub mod rendering_lib;
pub mod volume_lib;
