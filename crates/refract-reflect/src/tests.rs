#[cfg(test)]
mod tests {
    use crate::{
        bind, bind_parameter, block_layout, block_layouts, NodeKind, ReflectionError,
        ReflectionNode, ReflectionTree,
    };
    use refract_core::{
        schema, PlacementKind, ResourceShape, SchemaMember, SlotKind, TextureDimension, TypeTag,
    };
    use serde_json::{json, Value};

    #[repr(C)]
    struct Camera {
        view: [[f32; 4]; 4],
        proj: [[f32; 4]; 4],
    }

    schema! {
        static CAMERA: Camera {
            view => SchemaMember::Primitive(TypeTag::Mat4),
            proj => SchemaMember::Primitive(TypeTag::Mat4),
        }
    }

    #[repr(C)]
    struct Light {
        color: [f32; 4],
        intensity: f32,
    }

    schema! {
        static LIGHT: Light {
            color => SchemaMember::Primitive(TypeTag::Vec4),
            intensity => SchemaMember::Primitive(TypeTag::F32),
        }
    }

    #[repr(C)]
    struct Material {
        tint: [f32; 4],
        albedo: u32,
        albedo_sampler: u32,
        light: Light,
    }

    schema! {
        static MATERIAL: Material {
            tint => SchemaMember::Primitive(TypeTag::Vec4),
            albedo => SchemaMember::Resource,
            albedo_sampler as "albedoSampler" => SchemaMember::Resource,
            light => SchemaMember::Nested(&LIGHT),
        }
    }

    fn camera_json() -> Value {
        json!({
            "parameters": [{
                "name": "camera",
                "binding": { "index": 0 },
                "type": {
                    "kind": "parameterBlock",
                    "elementVarLayout": {
                        "type": {
                            "fields": [
                                { "name": "view", "binding": { "kind": "uniform", "offset": 0, "size": 64 } },
                                { "name": "proj", "binding": { "kind": "uniform", "offset": 64, "size": 64 } }
                            ]
                        }
                    }
                }
            }]
        })
    }

    fn material_json() -> Value {
        json!({
            "parameters": [{
                "name": "material",
                "binding": { "index": 1 },
                "type": {
                    "kind": "parameterBlock",
                    "elementVarLayout": {
                        "bindings": [
                            { "kind": "uniform", "offset": 0, "size": 16 },
                            { "kind": "descriptorTableSlot", "index": 0, "count": 2 }
                        ],
                        "type": {
                            "fields": [
                                {
                                    "name": "albedo",
                                    "binding": { "kind": "descriptorTableSlot", "index": 1 },
                                    "type": { "kind": "resource", "baseShape": "texture2D" }
                                },
                                { "name": "tint", "binding": { "kind": "uniform", "offset": 0, "size": 16 } },
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
            }]
        })
    }

    fn tree(value: Value) -> ReflectionTree {
        ReflectionTree::from_value(&value).unwrap()
    }

    fn uniform_node(name: &str, offset: u64, size: u64) -> ReflectionNode {
        ReflectionNode::new(name, NodeKind::Uniform { offset, size })
    }

    fn texture_node(name: &str, index: u32) -> ReflectionNode {
        ReflectionNode::new(
            name,
            NodeKind::Resource {
                index,
                shape: ResourceShape::Texture(TextureDimension::D2),
            },
        )
    }

    fn block_node(name: &str, group: u32, uniform_size: Option<u64>, children: Vec<ReflectionNode>) -> ReflectionNode {
        ReflectionNode::new(
            name,
            NodeKind::Block {
                group,
                uniform_size,
                children,
            },
        )
    }

    fn assert_contiguous(layout: &refract_core::BlockLayout) {
        for (_, block) in layout.walk() {
            let bindings: Vec<u32> = block.slots.iter().map(|s| s.binding).collect();
            let expected: Vec<u32> = (0..bindings.len() as u32).collect();
            assert_eq!(bindings, expected, "block `{}`", block.name);
        }
    }

    // ──────────────────────────────────────────
    // Reflection tree decoding
    // ──────────────────────────────────────────

    #[test]
    fn test_parse_camera_block() {
        let tree = tree(camera_json());
        let camera = tree.parameter("camera").unwrap();
        assert!(camera.is_block());
        assert_eq!(camera.children().len(), 2);
        match camera.kind() {
            NodeKind::Block {
                group,
                uniform_size,
                ..
            } => {
                assert_eq!(*group, 0);
                assert_eq!(*uniform_size, Some(128));
            }
            other => panic!("expected block, got {:?}", other),
        }
        assert_eq!(
            camera.child("proj").unwrap().kind(),
            &NodeKind::Uniform {
                offset: 64,
                size: 64
            }
        );
    }

    #[test]
    fn test_parse_from_str() {
        let text = camera_json().to_string();
        let tree: ReflectionTree = text.parse().unwrap();
        assert_eq!(tree.parameters().len(), 1);
    }

    #[test]
    fn test_parse_invalid_json() {
        let err = "{ not json".parse::<ReflectionTree>().unwrap_err();
        assert!(matches!(err, ReflectionError::Json(_)));
    }

    #[test]
    fn test_declared_uniform_size_from_bindings_array() {
        let tree = tree(material_json());
        let material = tree.parameter("material").unwrap();
        match material.kind() {
            NodeKind::Block { uniform_size, group, .. } => {
                assert_eq!(*uniform_size, Some(16));
                assert_eq!(*group, 1);
            }
            other => panic!("expected block, got {:?}", other),
        }
    }

    #[test]
    fn test_resource_shapes() {
        let tree = tree(material_json());
        let material = tree.parameter("material").unwrap();
        assert_eq!(
            material.child("albedo").unwrap().kind(),
            &NodeKind::Resource {
                index: 1,
                shape: ResourceShape::Texture(TextureDimension::D2)
            }
        );
        assert_eq!(
            material.child("albedoSampler").unwrap().kind(),
            &NodeKind::Resource {
                index: 2,
                shape: ResourceShape::Sampler
            }
        );
    }

    #[test]
    fn test_find_nested_path() {
        let tree = tree(material_json());
        let node = tree.find("material.light.intensity").unwrap();
        assert_eq!(node.kind(), &NodeKind::Uniform { offset: 16, size: 4 });

        let err = tree.find("material.light.missing").unwrap_err();
        match err {
            ReflectionError::FieldNotFound(path) => assert_eq!(path, "light.missing"),
            other => panic!("expected FieldNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_binding_kind_is_fatal() {
        let mut doc = camera_json();
        doc["parameters"][0]["type"]["elementVarLayout"]["type"]["fields"][1]["binding"]["kind"] =
            json!("pushConstantBuffer");
        let err = ReflectionTree::from_value(&doc).unwrap_err();
        match err {
            ReflectionError::UnknownBindingKind { field, kind } => {
                assert_eq!(field, "camera.proj");
                assert_eq!(kind, "pushConstantBuffer");
            }
            other => panic!("expected UnknownBindingKind, got {:?}", other),
        }
    }

    #[test]
    fn test_unrecognized_resource_shape_is_kept() {
        let doc = json!({
            "parameters": [{
                "name": "post",
                "binding": { "index": 0 },
                "type": {
                    "kind": "parameterBlock",
                    "elementVarLayout": {
                        "type": {
                            "fields": [{
                                "name": "history",
                                "binding": { "kind": "descriptorTableSlot", "index": 0 },
                                "type": { "kind": "resource", "baseShape": "structuredBuffer" }
                            }]
                        }
                    }
                }
            }]
        });
        let tree = tree(doc);
        let node = tree.find("post.history").unwrap();
        assert_eq!(
            node.kind(),
            &NodeKind::Resource {
                index: 0,
                shape: ResourceShape::Unrecognized("resource/structuredBuffer".to_string())
            }
        );
    }

    #[test]
    fn test_missing_members_are_malformed() {
        let err = ReflectionTree::from_value(&json!({})).unwrap_err();
        assert!(matches!(err, ReflectionError::Malformed { .. }));

        let mut doc = camera_json();
        doc["parameters"][0]["type"]["elementVarLayout"]["type"]["fields"][0]["binding"]
            .as_object_mut()
            .unwrap()
            .remove("size");
        let err = ReflectionTree::from_value(&doc).unwrap_err();
        match err {
            ReflectionError::Malformed { context, .. } => assert_eq!(context, "camera.view"),
            other => panic!("expected Malformed, got {:?}", other),
        }
    }

    #[repr(C)]
    struct Frame {
        time: f32,
    }

    schema! {
        static FRAME_TIME: Frame {
            time => SchemaMember::Primitive(TypeTag::F32),
        }
    }

    #[test]
    fn test_top_level_uniform_is_wrapped_in_a_block() {
        let doc = json!({
            "parameters": [{
                "name": "time",
                "binding": { "index": 3, "kind": "uniform", "offset": 0, "size": 4 },
                "type": { "kind": "scalar" }
            }]
        });
        let tree = tree(doc);
        let node = tree.parameter("time").unwrap();
        assert_eq!(
            node.kind(),
            &NodeKind::Block {
                group: 3,
                uniform_size: Some(4),
                children: vec![uniform_node("time", 0, 4)],
            }
        );

        let layout = bind_parameter(&FRAME_TIME, &tree, "time").unwrap();
        assert_eq!(layout.group, 3);
        assert_eq!(layout.binding_count(), 1);
        let time = layout.field("time").unwrap();
        assert_eq!((time.group, time.binding, time.offset, time.size), (3, 0, 0, 4));
    }

    #[test]
    fn test_top_level_resource_is_wrapped_in_a_block() {
        let doc = json!({
            "parameters": [{
                "name": "skybox",
                "binding": { "index": 2, "kind": "descriptorTableSlot" },
                "type": { "kind": "resource", "baseShape": "textureCube" }
            }]
        });
        let tree = tree(doc);
        let layout = block_layout(tree.parameter("skybox").unwrap()).unwrap();
        assert_eq!(layout.group, 2);
        assert_eq!(layout.uniform_size, None);
        assert_eq!(layout.binding_count(), 1);
        assert_eq!(
            layout.slots[0].kind,
            SlotKind::Resource {
                name: "skybox".to_string(),
                shape: ResourceShape::Texture(TextureDimension::Cube),
            }
        );
    }

    #[test]
    fn test_top_level_unknown_kind_is_fatal() {
        let doc = json!({
            "parameters": [{
                "name": "counters",
                "binding": { "index": 0, "kind": "shaderResource" },
                "type": { "kind": "structuredBuffer" }
            }]
        });
        let err = ReflectionTree::from_value(&doc).unwrap_err();
        assert!(matches!(err, ReflectionError::UnknownBindingKind { field, .. } if field == "counters"));
    }

    #[test]
    fn test_overflowing_uniform_extent_is_malformed() {
        let mut doc = camera_json();
        doc["parameters"][0]["type"]["elementVarLayout"]["type"]["fields"][1]["binding"]["offset"] =
            json!(u64::MAX);
        let err = ReflectionTree::from_value(&doc).unwrap_err();
        match err {
            ReflectionError::Malformed { context, .. } => assert_eq!(context, "camera.proj"),
            other => panic!("expected Malformed, got {:?}", other),
        }
    }

    // ──────────────────────────────────────────
    // Binder
    // ──────────────────────────────────────────

    #[test]
    fn test_bind_camera_scenario() {
        let tree = tree(camera_json());
        let layout = bind_parameter(&CAMERA, &tree, "camera").unwrap();

        assert_eq!(layout.name, "camera");
        assert_eq!(layout.group, 0);
        assert_eq!(layout.uniform_size, Some(128));
        assert_eq!(layout.binding_count(), 1);

        let view = layout.field("view").unwrap();
        let proj = layout.field("proj").unwrap();
        assert_eq!((view.offset, view.size), (0, 64));
        assert_eq!((proj.offset, proj.size), (64, 64));
        for field in [view, proj] {
            assert_eq!(field.kind, PlacementKind::Uniform);
            assert_eq!(field.binding, 0);
            assert_eq!(field.group, 0);
        }
        assert_eq!(view.host_offset, 0);
        assert_eq!(proj.host_offset, 64);
    }

    #[test]
    fn test_bind_round_trips_offsets() {
        let children: Vec<ReflectionNode> = (0..12)
            .map(|i| uniform_node(&format!("f{}", i), (11 - i) * 16, 16))
            .collect();
        let node = block_node("big", 3, Some(192), children.clone());

        static FIELDS: [refract_core::SchemaField; 4] = [
            refract_core::SchemaField::new("f0", 0, SchemaMember::Primitive(TypeTag::Vec4)),
            refract_core::SchemaField::new("f5", 16, SchemaMember::Primitive(TypeTag::Vec4)),
            refract_core::SchemaField::new("f7", 32, SchemaMember::Primitive(TypeTag::Vec4)),
            refract_core::SchemaField::new("f11", 48, SchemaMember::Primitive(TypeTag::Vec4)),
        ];
        static SUBSET: refract_core::Schema = refract_core::Schema::new("Subset", &FIELDS);

        let layout = bind(&SUBSET, &node).unwrap();
        assert_eq!(layout.fields().count(), 4);
        for placement in layout.fields() {
            let reflected = children.iter().find(|c| c.name() == placement.name).unwrap();
            match reflected.kind() {
                NodeKind::Uniform { offset, size } => {
                    assert_eq!(placement.offset, *offset);
                    assert_eq!(placement.size, *size);
                }
                other => panic!("expected uniform, got {:?}", other),
            }
            assert_eq!(placement.group, 3);
        }
    }

    #[test]
    fn test_bind_resources_and_nested_block() {
        let tree = tree(material_json());
        let layout = bind_parameter(&MATERIAL, &tree, "material").unwrap();

        // uniform buffer, albedo, albedoSampler
        assert_eq!(layout.binding_count(), 3);
        assert_contiguous(&layout);

        let albedo = layout.field("albedo").unwrap();
        assert_eq!(albedo.binding, 1);
        assert_eq!(
            albedo.kind,
            PlacementKind::Resource(ResourceShape::Texture(TextureDimension::D2))
        );
        let sampler = layout.field("albedoSampler").unwrap();
        assert_eq!(sampler.binding, 2);
        assert_eq!(sampler.kind, PlacementKind::Resource(ResourceShape::Sampler));
        assert_eq!(sampler.host_offset, 20);

        let light = layout.block("light").unwrap();
        assert_eq!(light.group, 2);
        assert_eq!(light.uniform_size, Some(32));
        assert_eq!(light.host_offset, 24);
        let intensity = layout.find("light.intensity").unwrap();
        assert_eq!(intensity.offset, 16);
        assert_eq!(intensity.group, 2);
        assert_eq!(intensity.host_offset, 24 + 16);
    }

    #[test]
    fn test_bind_schema_order_does_not_change_bindings() {
        #[repr(C)]
        struct Reordered {
            albedo_sampler: u32,
            albedo: u32,
        }
        schema! {
            static REORDERED: Reordered {
                albedo_sampler as "albedoSampler" => SchemaMember::Resource,
                albedo => SchemaMember::Resource,
            }
        }

        let tree = tree(material_json());
        let layout = bind_parameter(&REORDERED, &tree, "material").unwrap();
        assert_eq!(layout.field("albedo").unwrap().binding, 1);
        assert_eq!(layout.field("albedoSampler").unwrap().binding, 2);
    }

    #[test]
    fn test_binding_contiguity_across_shapes() {
        let shapes: Vec<(Option<u64>, Vec<ReflectionNode>)> = vec![
            (None, vec![]),
            (None, vec![texture_node("a", 0)]),
            (None, vec![texture_node("a", 0), texture_node("b", 1), texture_node("c", 2)]),
            (Some(16), vec![uniform_node("u", 0, 16)]),
            (
                Some(32),
                vec![
                    texture_node("a", 1),
                    uniform_node("u", 0, 16),
                    texture_node("b", 2),
                    uniform_node("v", 16, 16),
                ],
            ),
            (
                Some(16),
                vec![
                    uniform_node("u", 0, 16),
                    block_node("inner", 4, None, vec![texture_node("t", 0), texture_node("s", 1)]),
                    texture_node("a", 1),
                ],
            ),
        ];

        for (uniform_size, children) in shapes {
            let resources = children
                .iter()
                .filter(|c| matches!(c.kind(), NodeKind::Resource { .. }))
                .count();
            let node = block_node("b", 0, uniform_size, children);
            let layout = block_layout(&node).unwrap();
            assert_contiguous(&layout);
            assert_eq!(
                layout.binding_count(),
                resources + usize::from(uniform_size.is_some())
            );
            if let Some(size) = uniform_size {
                assert_eq!(layout.slots[0].kind, SlotKind::UniformBuffer { size });
            }
        }
    }

    #[test]
    fn test_missing_field_fails() {
        let mut doc = camera_json();
        doc["parameters"][0]["type"]["elementVarLayout"]["type"]["fields"]
            .as_array_mut()
            .unwrap()
            .pop();
        let tree = tree(doc);
        let err = bind_parameter(&CAMERA, &tree, "camera").unwrap_err();
        match err {
            ReflectionError::FieldNotFound(path) => assert_eq!(path, "camera.proj"),
            other => panic!("expected FieldNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_parameter_fails() {
        let tree = tree(camera_json());
        let err = bind_parameter(&CAMERA, &tree, "lights").unwrap_err();
        assert!(matches!(err, ReflectionError::FieldNotFound(ref name) if name == "lights"));
    }

    #[test]
    fn test_kind_mismatch() {
        #[repr(C)]
        struct Wrong {
            albedo: [f32; 4],
        }
        schema! {
            static WRONG: Wrong {
                albedo => SchemaMember::Primitive(TypeTag::Vec4),
            }
        }

        let tree = tree(material_json());
        let err = bind_parameter(&WRONG, &tree, "material").unwrap_err();
        match err {
            ReflectionError::KindMismatch {
                field,
                expected,
                found,
            } => {
                assert_eq!(field, "material.albedo");
                assert_eq!(expected, "inline uniform");
                assert_eq!(found, "opaque resource");
            }
            other => panic!("expected KindMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_schema_field() {
        #[repr(C)]
        struct Twice {
            view: [[f32; 4]; 4],
            view_again: [[f32; 4]; 4],
        }
        schema! {
            static TWICE: Twice {
                view => SchemaMember::Primitive(TypeTag::Mat4),
                view_again as "view" => SchemaMember::Primitive(TypeTag::Mat4),
            }
        }

        let tree = tree(camera_json());
        let err = bind_parameter(&TWICE, &tree, "camera").unwrap_err();
        assert!(matches!(err, ReflectionError::DuplicateField { field, .. } if field == "view"));
    }

    #[test]
    fn test_uniform_past_declared_size() {
        let node = block_node("tight", 0, Some(64), vec![uniform_node("view", 0, 64), uniform_node("proj", 64, 64)]);
        let err = block_layout(&node).unwrap_err();
        match err {
            ReflectionError::OutOfBounds { field, end, size } => {
                assert_eq!(field, "tight.proj");
                assert_eq!(end, 128);
                assert_eq!(size, 64);
            }
            other => panic!("expected OutOfBounds, got {:?}", other),
        }
    }

    #[test]
    fn test_overflowing_uniform_is_out_of_bounds() {
        let node = block_node("huge", 0, Some(64), vec![uniform_node("tail", u64::MAX - 1, 16)]);
        let err = block_layout(&node).unwrap_err();
        assert!(matches!(
            err,
            ReflectionError::OutOfBounds { end: u64::MAX, size: 64, .. }
        ));
    }

    #[test]
    fn test_bind_rejects_non_block_node() {
        let err = bind(&CAMERA, &uniform_node("view", 0, 64)).unwrap_err();
        assert!(matches!(err, ReflectionError::KindMismatch { .. }));
    }

    #[test]
    fn test_block_layouts_cover_every_parameter() {
        let mut doc = material_json();
        let camera = camera_json()["parameters"][0].clone();
        doc["parameters"].as_array_mut().unwrap().insert(0, camera);
        let tree = tree(doc);

        let layouts = block_layouts(&tree).unwrap();
        assert_eq!(layouts.len(), 2);
        assert_eq!(layouts[0].name, "camera");
        assert_eq!(layouts[1].name, "material");
        assert_eq!(layouts[1].fields().count(), 0);

        let paths: Vec<String> = layouts[1].walk().into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["material".to_string(), "material.light".to_string()]);
    }

    #[test]
    fn test_bind_is_deterministic() {
        let tree = tree(material_json());
        let a = bind_parameter(&MATERIAL, &tree, "material").unwrap();
        let b = bind_parameter(&MATERIAL, &tree, "material").unwrap();
        assert_eq!(a, b);
    }
}
