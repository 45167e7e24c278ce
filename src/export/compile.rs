use std::collections::HashMap;

use tracing::{debug, info, warn};

use super::options::ExportOptions;
use crate::error::H3dResult;
use crate::models::H3dAsset;
use crate::models::animation;
use crate::models::group::{Skin, build_group};
use crate::models::material::MaterialTable;
use crate::models::skeleton::{Armature, flatten};
use crate::scene::{SceneObject, SceneProvider};

/// Compile every object the provider exposes into an in-memory asset.
///
/// Nothing is written here; a contract violation anywhere in the scene fails
/// the whole compile.
pub fn compile_scene<S: SceneProvider + ?Sized>(scene: &S, options: &ExportOptions) -> H3dResult<H3dAsset> {
    let mut armatures: Vec<Armature> = Vec::new();
    if options.export_armatures {
        let frames = options.frame_range(scene.frame_range())?;
        for object in scene.objects() {
            let SceneObject::Armature(rig) = object else {
                continue;
            };
            let mut armature = flatten(rig);
            if options.export_keyframes {
                animation::bake(scene, rig, &mut armature, frames.clone());
            }
            armatures.push(armature);
        }
    }

    let joint_maps: HashMap<&str, HashMap<&str, i32>> = armatures
        .iter()
        .map(|armature| (armature.name.as_str(), armature.joint_indices()))
        .collect();

    let settings = options.group_settings();
    let mut materials = MaterialTable::default();
    let mut groups = Vec::new();
    for object in scene.objects() {
        let SceneObject::Mesh(mesh) = object else {
            continue;
        };

        let material_index = mesh
            .material
            .map_or(-1, |id| materials.resolve(id, scene.materials()));

        let skin = match (options.export_armatures, mesh.armature.as_deref()) {
            (true, Some(name)) => match joint_maps.get_key_value(name) {
                Some((&armature, joints)) => Some(Skin { armature, joints }),
                None => {
                    warn!(mesh = %mesh.name, armature = name, "mesh refers to an unknown armature, exporting unskinned");
                    None
                }
            },
            _ => None,
        };

        groups.push(build_group(mesh, &settings, skin.as_ref(), material_index)?);
    }

    let asset = H3dAsset {
        groups,
        materials: materials.into_descriptors(),
        armatures,
        bones_per_vertex: options.bones_per_vertex,
    };
    debug!(
        keyframes = asset
            .armatures
            .iter()
            .flat_map(|a| &a.joints)
            .map(|j| j.keyframes.len())
            .sum::<usize>(),
        "baked keyframes"
    );
    info!(
        groups = asset.groups.len(),
        materials = asset.materials.len(),
        armatures = asset.armatures.len(),
        "compiled scene"
    );
    Ok(asset)
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec3};

    use super::*;
    use crate::models::shape_key::ShapeKeyMode;
    use crate::models::vertex::BonesPerVertex;
    use crate::scene::{
        ArmatureAnimation, ArmatureObject, Bone, BoneChannels, GroupWeight, IDENTITY, MaterialId, MeshObject, Scene,
        SourceLoop, SourceMaterial, SourceVertex,
    };

    fn quad(name: &str) -> MeshObject {
        let corners = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
        let uvs = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        MeshObject {
            name: name.to_string(),
            world_transform: IDENTITY,
            vertices: corners
                .iter()
                .map(|&position| SourceVertex {
                    position,
                    groups: Vec::new(),
                })
                .collect(),
            loops: [0u32, 1, 2, 0, 2, 3]
                .iter()
                .map(|&vertex| SourceLoop {
                    vertex,
                    normal: [0.0, 0.0, 1.0],
                    uv: uvs[vertex as usize],
                })
                .collect(),
            triangles: vec![[0, 1, 2], [3, 4, 5]],
            vertex_groups: Vec::new(),
            material: None,
            armature: None,
            shape_keys: Vec::new(),
        }
    }

    fn rig() -> ArmatureObject {
        ArmatureObject {
            name: "rig".to_string(),
            world_transform: IDENTITY,
            bones: vec![
                Bone {
                    name: "root".to_string(),
                    parent: None,
                    matrix_local: IDENTITY,
                },
                Bone {
                    name: "child".to_string(),
                    parent: Some("root".to_string()),
                    matrix_local: Mat4::from_translation(Vec3::Y).to_cols_array_2d(),
                },
            ],
        }
    }

    fn animated_scene() -> Scene {
        let mut anim = ArmatureAnimation::default();
        anim.channels.insert(
            "child".to_string(),
            BoneChannels {
                location: vec![],
                rotation: vec![10],
            },
        );
        anim.poses.insert(
            10,
            HashMap::from([(
                "child".to_string(),
                (Mat4::from_translation(Vec3::Y) * Mat4::from_rotation_x(0.5)).to_cols_array_2d(),
            )]),
        );

        let mut mesh = quad("body");
        mesh.armature = Some("rig".to_string());
        mesh.vertex_groups = vec!["root".to_string(), "child".to_string(), "tail".to_string()];
        mesh.vertices[2].groups = vec![
            GroupWeight { group: 0, weight: 0.2 },
            GroupWeight { group: 1, weight: 0.6 },
            GroupWeight { group: 2, weight: 0.9 },
        ];

        Scene {
            objects: vec![SceneObject::Mesh(mesh), SceneObject::Armature(rig())],
            animations: HashMap::from([("rig".to_string(), anim)]),
            ..Default::default()
        }
    }

    #[test]
    fn single_quad_scene() {
        let scene = Scene {
            objects: vec![SceneObject::Mesh(quad("quad"))],
            ..Default::default()
        };
        let asset = compile_scene(&scene, &ExportOptions::default()).unwrap();
        assert_eq!(asset.groups.len(), 1);
        assert_eq!(asset.groups[0].vertices.len(), 4);
        assert_eq!(asset.groups[0].triangles.len(), 2);
        assert_eq!(asset.groups[0].material_index, -1);
        assert!(asset.materials.is_empty());
        assert!(asset.armatures.is_empty());
    }

    #[test]
    fn two_bone_rig_with_one_key() {
        let asset = compile_scene(&animated_scene(), &ExportOptions::default()).unwrap();
        assert_eq!(asset.armatures.len(), 1);
        let joints = &asset.armatures[0].joints;
        assert_eq!(joints.len(), 2);
        assert_eq!(joints[1].parent_index, 0);
        assert!(joints[0].keyframes.is_empty());
        assert_eq!(joints[1].keyframes.len(), 1);
        assert_eq!(joints[1].keyframes[0].frame, 10);

        let group = &asset.groups[0];
        assert_eq!(group.armature.as_deref(), Some("rig"));
    }

    #[test]
    fn two_bones_per_vertex_keeps_heaviest() {
        let options = ExportOptions::builder()
            .bones_per_vertex(BonesPerVertex::new(2).unwrap())
            .build();
        let asset = compile_scene(&animated_scene(), &options).unwrap();
        assert_eq!(asset.bones_per_vertex.get(), 2);

        // "tail" has no joint, so only root and child remain.
        let skinned = asset.groups[0]
            .vertices
            .iter()
            .find(|v| !v.influences.is_empty())
            .unwrap();
        assert_eq!(skinned.influences.len(), 2);
        assert_eq!(skinned.influences[0].joint, 1);
        assert!((skinned.influences[0].weight - 0.75).abs() < 1e-5);
        assert!((skinned.influences[1].weight - 0.25).abs() < 1e-5);
    }

    #[test]
    fn armatures_disabled_leaves_meshes_unskinned() {
        let options = ExportOptions::builder().export_armatures(false).build();
        let asset = compile_scene(&animated_scene(), &options).unwrap();
        assert!(asset.armatures.is_empty());
        assert!(!asset.groups[0].animated());
        assert!(asset.groups[0].vertices.iter().all(|v| v.influences.is_empty()));
    }

    #[test]
    fn keyframes_disabled_keeps_rest_pose() {
        let options = ExportOptions::builder().export_keyframes(false).build();
        let asset = compile_scene(&animated_scene(), &options).unwrap();
        assert!(asset.armatures[0].joints.iter().all(|j| j.keyframes.is_empty()));
    }

    #[test]
    fn unknown_armature_exports_unskinned() {
        let mut mesh = quad("orphan");
        mesh.armature = Some("missing".to_string());
        let scene = Scene {
            objects: vec![SceneObject::Mesh(mesh)],
            ..Default::default()
        };
        let asset = compile_scene(&scene, &ExportOptions::default()).unwrap();
        assert!(!asset.groups[0].animated());
    }

    #[test]
    fn shared_material_is_listed_once() {
        let mut a = quad("a");
        a.material = Some(MaterialId(3));
        let mut b = quad("b");
        b.material = Some(MaterialId(3));
        let scene = Scene {
            objects: vec![SceneObject::Mesh(a), SceneObject::Mesh(b)],
            materials: vec![SourceMaterial {
                id: MaterialId(3),
                ..Default::default()
            }],
            ..Default::default()
        };
        let options = ExportOptions::builder().shape_keys(ShapeKeyMode::Ignore).build();
        let asset = compile_scene(&scene, &options).unwrap();
        assert_eq!(asset.materials.len(), 1);
        assert_eq!(asset.groups[0].material_index, 0);
        assert_eq!(asset.groups[1].material_index, 0);
    }

    #[test]
    fn bad_frame_range_fails_before_baking() {
        let options = ExportOptions::builder().frame_start(9).frame_end(2).build();
        assert!(compile_scene(&animated_scene(), &options).is_err());
    }
}
