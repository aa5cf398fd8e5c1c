pub mod density;
pub mod marching_cubes;
pub mod mesh;
pub mod editor;
