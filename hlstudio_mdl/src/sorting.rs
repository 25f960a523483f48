//! Draw order of the meshes selected by a body value and skin family.

use crate::asset::{Asset, TextureFlags};

/// Coarse blending class of a mesh. Declared in draw order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RenderClass {
    Opaque,
    AlphaTested,
    Translucent,
}

impl RenderClass {
    #[must_use]
    pub fn from_flags(flags: TextureFlags) -> Self {
        if flags.intersects(TextureFlags::ADDITIVE | TextureFlags::ALPHA) {
            Self::Translucent
        } else if flags.contains(TextureFlags::MASKED) {
            Self::AlphaTested
        } else {
            Self::Opaque
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshFragment {
    pub body_part: usize,
    pub model: usize,
    pub mesh: usize,
    /// Resolved through the skin family, `None` if the skin table doesn't cover the mesh.
    pub texture: Option<usize>,
    pub class: RenderClass,
}

/// Meshes of the submodels selected by `body`, in declaration order.
#[must_use]
pub fn fragments(asset: &Asset, body: usize, skin: usize) -> Vec<MeshFragment> {
    let mut fragments = Vec::new();

    for (body_part_index, body_part) in asset.body_parts().iter().enumerate() {
        let model_index = body_part.model_index(body);
        let Some(model) = body_part.models.get(model_index) else {
            continue;
        };

        for (mesh_index, mesh) in model.meshes.iter().enumerate() {
            let texture = asset.texture_index(skin, mesh.skin_reference);
            let class = texture
                .and_then(|texture| asset.textures().get(texture))
                .map_or(RenderClass::Opaque, |texture| {
                    RenderClass::from_flags(texture.flags)
                });

            fragments.push(MeshFragment {
                body_part: body_part_index,
                model: model_index,
                mesh: mesh_index,
                texture,
                class,
            });
        }
    }

    fragments
}

/// Opaque before alpha tested before translucent, then grouped by texture.
/// Equal keys keep their input order.
pub fn sort(fragments: &mut [MeshFragment]) {
    fragments.sort_by_key(|fragment| (fragment.class, fragment.texture));
}

#[must_use]
pub fn sorted(asset: &Asset, body: usize, skin: usize) -> Vec<MeshFragment> {
    let mut fragments = fragments(asset, body, skin);
    sort(&mut fragments);
    fragments
}

/// Selected meshes drawn with `texture`.
#[must_use]
pub fn using_texture(asset: &Asset, body: usize, skin: usize, texture: usize) -> Vec<MeshFragment> {
    fragments(asset, body, skin)
        .into_iter()
        .filter(|fragment| fragment.texture == Some(texture))
        .collect()
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use hlstudio_test_utils::{BodyPartDef, ModelBuilder, ModelDef, SequenceDef, TextureDef};

    use super::*;

    fn asset() -> Asset {
        let bytes = ModelBuilder::new()
            .sequence(SequenceDef::new("idle", 10.0, 1))
            .texture(TextureDef::new("skin.bmp", 0))
            .texture(TextureDef::new("glow.bmp", TextureFlags::ADDITIVE.bits()))
            .texture(TextureDef::new("grate.bmp", TextureFlags::MASKED.bits()))
            .texture(TextureDef::new("face.bmp", TextureFlags::FULLBRIGHT.bits()))
            .skin_family(&[1, 0, 2, 0, 3])
            .skin_family(&[0, 0, 0, 0, 0])
            .body_part(BodyPartDef::new(
                "body",
                1,
                vec![
                    ModelDef::new("body", &[0, 1, 2, 3, 4]),
                    ModelDef::new("body_damaged", &[3]),
                ],
            ))
            .body_part(BodyPartDef::new(
                "head",
                2,
                vec![
                    ModelDef::new("blank", &[]),
                    ModelDef::new("helmet", &[2]),
                    ModelDef::new("mask", &[1, 4]),
                ],
            ))
            .build();

        Asset::decode(&bytes).unwrap()
    }

    fn fragment(mesh: usize, texture: usize, class: RenderClass) -> MeshFragment {
        MeshFragment {
            body_part: 0,
            model: 0,
            mesh,
            texture: Some(texture),
            class,
        }
    }

    #[test]
    fn classes_from_flags() {
        assert_eq!(
            RenderClass::from_flags(TextureFlags::FULLBRIGHT),
            RenderClass::Opaque
        );
        assert_eq!(
            RenderClass::from_flags(TextureFlags::MASKED),
            RenderClass::AlphaTested
        );
        assert_eq!(
            RenderClass::from_flags(TextureFlags::ADDITIVE | TextureFlags::MASKED),
            RenderClass::Translucent
        );
    }

    #[test]
    fn opaque_first_then_by_texture() {
        let asset = asset();
        let sorted = sorted(&asset, 0, 0);

        let meshes: Vec<_> = sorted.iter().map(|fragment| fragment.mesh).collect();
        assert_eq!(meshes, [1, 3, 4, 2, 0]);

        let classes: Vec<_> = sorted.iter().map(|fragment| fragment.class).collect();
        assert_eq!(
            classes,
            [
                RenderClass::Opaque,
                RenderClass::Opaque,
                RenderClass::Opaque,
                RenderClass::AlphaTested,
                RenderClass::Translucent
            ]
        );
    }

    #[test]
    fn skin_family_changes_textures() {
        let asset = asset();
        let sorted = sorted(&asset, 0, 1);

        let meshes: Vec<_> = sorted.iter().map(|fragment| fragment.mesh).collect();
        assert_eq!(meshes, [0, 1, 2, 3, 4]);
        assert!(sorted.iter().all(|fragment| fragment.texture == Some(0)));

        // unknown skin family resolves nothing
        assert!(fragments(&asset, 0, 9)
            .iter()
            .all(|fragment| fragment.texture.is_none()));
    }

    #[test]
    fn body_value_selects_submodels() {
        let asset = asset();

        // body part 0 digit 1, body part 1 digit 2
        let fragments = fragments(&asset, 5, 0);
        let selected: Vec<_> = fragments
            .iter()
            .map(|fragment| (fragment.body_part, fragment.model, fragment.mesh))
            .collect();
        assert_eq!(selected, [(0, 1, 0), (1, 2, 0), (1, 2, 1)]);

        let head = &asset.body_parts()[1];
        assert_eq!(head.model_index(5), 2);
        assert_eq!(head.with_model(5, 0), 1);
        assert_eq!(head.with_model(1, 1), 3);
        assert_eq!(asset.body_parts()[0].model_index(head.with_model(5, 0)), 1);
    }

    #[test]
    fn texture_users() {
        let asset = asset();

        let users: Vec<_> = using_texture(&asset, 0, 0, 0)
            .iter()
            .map(|fragment| fragment.mesh)
            .collect();
        assert_eq!(users, [1, 3]);
        assert!(using_texture(&asset, 0, 0, 7).is_empty());
    }

    #[test]
    fn equal_keys_keep_input_order() {
        let equal = [
            fragment(0, 1, RenderClass::Opaque),
            fragment(1, 1, RenderClass::Opaque),
            fragment(2, 1, RenderClass::Opaque),
            fragment(3, 1, RenderClass::Opaque),
        ];
        let others = [
            fragment(10, 0, RenderClass::Translucent),
            fragment(11, 0, RenderClass::Opaque),
        ];

        for permutation in equal.iter().chain(&others).copied().permutations(6) {
            let mut sorted = permutation.clone();
            sort(&mut sorted);

            let input_order: Vec<_> = permutation
                .iter()
                .filter(|fragment| fragment.mesh < 10)
                .map(|fragment| fragment.mesh)
                .collect();
            let output_order: Vec<_> = sorted
                .iter()
                .filter(|fragment| fragment.mesh < 10)
                .map(|fragment| fragment.mesh)
                .collect();

            assert_eq!(input_order, output_order);
            assert_eq!(sorted[0].mesh, 11);
            assert_eq!(sorted[5].mesh, 10);
        }
    }
}
