//! IO modules - filesystem side effects and archive decoding

pub mod fs;
pub mod unitypackage;
