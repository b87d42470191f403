// Host records for the demo's parameter blocks and the one triangle it draws.

use bytemuck::{Pod, Zeroable};
use refract_core::{schema, Reflect, Schema, SchemaMember, TypeTag};
use refract_gpu::Vertex;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Camera {
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
}

schema! {
    static CAMERA: Camera {
        view => SchemaMember::Primitive(TypeTag::Mat4),
        proj => SchemaMember::Primitive(TypeTag::Mat4),
    }
}

impl Reflect for Camera {
    fn schema() -> &'static Schema {
        &CAMERA
    }
}

impl Camera {
    /// Identity view looking down -z with a simple orthographic projection.
    pub fn looking_at_origin(zoom: f32) -> Self {
        Self {
            view: IDENTITY,
            proj: [
                [zoom, 0.0, 0.0, 0.0],
                [0.0, zoom, 0.0, 0.0],
                [0.0, 0.0, 0.5, 0.0],
                [0.0, 0.0, 0.5, 1.0],
            ],
        }
    }
}

const IDENTITY: [[f32; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Light {
    pub color: [f32; 4],
    pub intensity: f32,
    pub _pad: [f32; 3],
}

schema! {
    static LIGHT: Light {
        color => SchemaMember::Primitive(TypeTag::Vec4),
        intensity => SchemaMember::Primitive(TypeTag::F32),
    }
}

/// Material record; texture and sampler members are placeholders for handles
/// supplied at bind time.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Material {
    pub tint: [f32; 4],
    pub albedo: u32,
    pub albedo_sampler: u32,
    pub _pad: [u32; 2],
    pub light: Light,
}

schema! {
    static MATERIAL: Material {
        tint => SchemaMember::Primitive(TypeTag::Vec4),
        albedo => SchemaMember::Resource,
        albedo_sampler as "albedoSampler" => SchemaMember::Resource,
        light => SchemaMember::Nested(&LIGHT),
    }
}

impl Reflect for Material {
    fn schema() -> &'static Schema {
        &MATERIAL
    }
}

pub const TRIANGLE: [Vertex; 3] = [
    Vertex {
        position: [0.0, 0.5, 0.0],
        normal: [0.0, 0.0, 1.0],
        uv: [0.5, 0.0],
        tex_id: 0,
    },
    Vertex {
        position: [-0.5, -0.5, 0.0],
        normal: [0.0, 0.0, 1.0],
        uv: [0.0, 1.0],
        tex_id: 0,
    },
    Vertex {
        position: [0.5, -0.5, 0.0],
        normal: [0.0, 0.0, 1.0],
        uv: [1.0, 1.0],
        tex_id: 0,
    },
];
