// WGSL source and compiler reflection for the demo's lit pipeline.

pub const LIT_SHADER: &str = r#"
struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) tex_id: u32,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) normal: vec3<f32>,
    @location(1) uv: vec2<f32>,
};

struct Camera {
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
};

struct Material {
    tint: vec4<f32>,
};

struct Light {
    color: vec4<f32>,
    intensity: f32,
};

@group(0) @binding(0) var<uniform> camera: Camera;

@group(1) @binding(0) var<uniform> material: Material;
@group(1) @binding(1) var albedo: texture_2d<f32>;
@group(1) @binding(2) var albedo_sampler: sampler;

@group(2) @binding(0) var<uniform> light: Light;

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = camera.proj * camera.view * vec4<f32>(in.position, 1.0);
    out.normal = in.normal;
    out.uv = in.uv;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let base = textureSample(albedo, albedo_sampler, in.uv) * material.tint;
    let lambert = max(dot(normalize(in.normal), vec3<f32>(0.0, 0.0, 1.0)), 0.0);
    return vec4<f32>(base.rgb * light.color.rgb * light.intensity * lambert, base.a);
}
"#;

/// Reflection for `LIT_SHADER`, in the compiler's JSON shape.
pub const LIT_REFLECTION: &str = r#"{
    "parameters": [
        {
            "name": "camera",
            "binding": { "kind": "subElementRegisterSpace", "index": 0 },
            "type": {
                "kind": "parameterBlock",
                "elementVarLayout": {
                    "binding": { "kind": "uniform", "offset": 0, "size": 128 },
                    "type": {
                        "kind": "struct",
                        "fields": [
                            { "name": "view", "binding": { "kind": "uniform", "offset": 0, "size": 64 } },
                            { "name": "proj", "binding": { "kind": "uniform", "offset": 64, "size": 64 } }
                        ]
                    }
                }
            }
        },
        {
            "name": "material",
            "binding": { "kind": "subElementRegisterSpace", "index": 1 },
            "type": {
                "kind": "parameterBlock",
                "elementVarLayout": {
                    "bindings": [
                        { "kind": "uniform", "offset": 0, "size": 16 },
                        { "kind": "descriptorTableSlot", "index": 0, "count": 3 }
                    ],
                    "type": {
                        "kind": "struct",
                        "fields": [
                            { "name": "tint", "binding": { "kind": "uniform", "offset": 0, "size": 16 } },
                            {
                                "name": "albedo",
                                "binding": { "kind": "descriptorTableSlot", "index": 1 },
                                "type": { "kind": "resource", "baseShape": "texture2D" }
                            },
                            {
                                "name": "albedoSampler",
                                "binding": { "kind": "descriptorTableSlot", "index": 2 },
                                "type": { "kind": "samplerState" }
                            },
                            {
                                "name": "light",
                                "binding": { "kind": "subElementRegisterSpace", "index": 2 },
                                "type": {
                                    "kind": "parameterBlock",
                                    "elementVarLayout": {
                                        "binding": { "kind": "uniform", "offset": 0, "size": 32 },
                                        "type": {
                                            "kind": "struct",
                                            "fields": [
                                                { "name": "color", "binding": { "kind": "uniform", "offset": 0, "size": 16 } },
                                                { "name": "intensity", "binding": { "kind": "uniform", "offset": 16, "size": 4 } }
                                            ]
                                        }
                                    }
                                }
                            }
                        ]
                    }
                }
            }
        }
    ]
}"#;
