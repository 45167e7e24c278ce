/// Reading H3D files back into the asset model
pub mod data;
/// Error definitions
pub mod error;
/// Scene compilation and the H3D writers
pub mod export;
/// The compiled asset model (groups, materials, armatures) and the algorithms that build it
pub mod models;
/// The scene provider contract and an in-memory scene
pub mod scene;
