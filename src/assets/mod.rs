mod loader;

pub use loader::{AssetLoader, LoadEvent};

use crate::scene::geometry::{MeshData, MeshVertex};
use glam::Mat4;
use half::f16;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_ASSET_ID: AtomicU64 = AtomicU64::new(1);

fn next_asset_id() -> u64 {
    NEXT_ASSET_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode HDR image {path}: {source}")]
    DecodeHdr {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to load glTF {path}: {source}")]
    Gltf {
        path: String,
        #[source]
        source: gltf::Error,
    },
    #[error("glTF has no triangle geometry: {path}")]
    EmptyModel { path: String },
    #[error("failed to start asset worker: {0}")]
    Spawn(#[source] std::io::Error),
}

/// One level of an env map mip chain, RGBA half floats.
#[derive(Clone)]
pub struct EnvMapLevel {
    pub width: u32,
    pub height: u32,
    pub texels: Vec<f16>,
}

/// Decoded equirectangular environment map with a box-filtered mip chain.
pub struct EnvMap {
    id: u64,
    label: String,
    levels: Vec<EnvMapLevel>,
}

impl fmt::Debug for EnvMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvMap")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("size", &(self.width(), self.height()))
            .field("mips", &self.levels.len())
            .finish()
    }
}

impl EnvMap {
    /// Build from tightly packed RGB f32 pixels, row 0 at the top.
    pub fn from_rgb32f(label: impl Into<String>, width: u32, height: u32, rgb: &[f32]) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mut level: Vec<f32> = Vec::with_capacity((width * height * 4) as usize);
        for pixel in 0..(width * height) as usize {
            let base = pixel * 3;
            let texel = rgb.get(base..base + 3).unwrap_or(&[0.0, 0.0, 0.0]);
            level.extend_from_slice(texel);
            level.push(1.0);
        }

        let mut levels = vec![to_half_level(width, height, &level)];
        let (mut w, mut h) = (width, height);
        while w > 1 || h > 1 {
            let (next_w, next_h) = ((w / 2).max(1), (h / 2).max(1));
            level = downsample(&level, w, h, next_w, next_h);
            levels.push(to_half_level(next_w, next_h, &level));
            w = next_w;
            h = next_h;
        }

        Self {
            id: next_asset_id(),
            label: label.into(),
            levels,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn width(&self) -> u32 {
        self.levels[0].width
    }

    pub fn height(&self) -> u32 {
        self.levels[0].height
    }

    pub fn levels(&self) -> &[EnvMapLevel] {
        &self.levels
    }

    pub fn mip_count(&self) -> u32 {
        self.levels.len() as u32
    }
}

fn to_half_level(width: u32, height: u32, texels: &[f32]) -> EnvMapLevel {
    EnvMapLevel {
        width,
        height,
        texels: texels.iter().copied().map(f16::from_f32).collect(),
    }
}

fn downsample(src: &[f32], width: u32, height: u32, dst_width: u32, dst_height: u32) -> Vec<f32> {
    let mut dst = vec![0.0f32; (dst_width * dst_height * 4) as usize];
    for y in 0..dst_height {
        for x in 0..dst_width {
            let xs = [(x * 2).min(width - 1), (x * 2 + 1).min(width - 1)];
            let ys = [(y * 2).min(height - 1), (y * 2 + 1).min(height - 1)];
            let out = ((y * dst_width + x) * 4) as usize;
            for sy in ys {
                for sx in xs {
                    let at = ((sy * width + sx) * 4) as usize;
                    for channel in 0..4 {
                        dst[out + channel] += src[at + channel] * 0.25;
                    }
                }
            }
        }
    }
    dst
}

/// Read and decode a Radiance HDR equirect map.
pub fn load_env_map(path: &Path) -> Result<EnvMap, AssetError> {
    let bytes = std::fs::read(path).map_err(|source| AssetError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let image = image::load_from_memory(&bytes).map_err(|source| AssetError::DecodeHdr {
        path: path.display().to_string(),
        source,
    })?;
    let rgb = image.to_rgb32f();
    let label = path
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or("envmap")
        .to_string();
    Ok(EnvMap::from_rgb32f(label, rgb.width(), rgb.height(), rgb.as_raw()))
}

/// 8-bit sRGB RGBA texture taken from a model.
#[derive(Clone)]
pub struct RgbaTexture {
    pub id: u64,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl fmt::Debug for RgbaTexture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RgbaTexture#{}({}x{})", self.id, self.width, self.height)
    }
}

#[derive(Debug, Clone)]
pub struct ModelPrimitive {
    pub mesh: MeshData,
    pub local_transform: Mat4,
    pub base_color: [f32; 4],
    pub base_color_texture: Option<Arc<RgbaTexture>>,
}

#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub name: String,
    pub primitives: Vec<ModelPrimitive>,
}

pub fn load_model(path: &Path) -> Result<LoadedModel, AssetError> {
    let display = path.display().to_string();
    let (document, buffers, images) = gltf::import(path).map_err(|source| AssetError::Gltf {
        path: display.clone(),
        source,
    })?;

    let textures: Vec<Option<Arc<RgbaTexture>>> =
        images.iter().map(|data| convert_image(data).map(Arc::new)).collect();

    let mut primitives = Vec::new();
    if let Some(scene) = document.default_scene().or_else(|| document.scenes().next()) {
        for node in scene.nodes() {
            collect_primitives(&node, Mat4::IDENTITY, &buffers, &textures, &mut primitives);
        }
    }
    if primitives.is_empty() {
        return Err(AssetError::EmptyModel { path: display });
    }

    let name = PathBuf::from(path)
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or("gltf")
        .to_string();
    Ok(LoadedModel { name, primitives })
}

fn collect_primitives(
    node: &gltf::Node,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    textures: &[Option<Arc<RgbaTexture>>],
    out: &mut Vec<ModelPrimitive>,
) {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                continue;
            }
            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| &data.0[..]));
            let Some(positions) = reader.read_positions() else {
                continue;
            };
            let positions: Vec<[f32; 3]> = positions.collect();
            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };
            let normals: Vec<[f32; 3]> = match reader.read_normals() {
                Some(normals) => normals.collect(),
                None => smooth_normals(&positions, &indices),
            };
            let uvs: Vec<[f32; 2]> = match reader.read_tex_coords(0) {
                Some(uvs) => uvs.into_f32().collect(),
                None => vec![[0.0, 0.0]; positions.len()],
            };

            let vertices = positions
                .iter()
                .enumerate()
                .map(|(index, position)| MeshVertex {
                    position: *position,
                    normal: normals.get(index).copied().unwrap_or([0.0, 1.0, 0.0]),
                    uv: uvs.get(index).copied().unwrap_or([0.0, 0.0]),
                })
                .collect();

            let pbr = primitive.material().pbr_metallic_roughness();
            let base_color_texture = pbr
                .base_color_texture()
                .and_then(|info| textures.get(info.texture().source().index()).cloned().flatten());

            out.push(ModelPrimitive {
                mesh: MeshData { vertices, indices },
                local_transform: world,
                base_color: pbr.base_color_factor(),
                base_color_texture,
            });
        }
    }

    for child in node.children() {
        collect_primitives(&child, world, buffers, textures, out);
    }
}

fn convert_image(data: &gltf::image::Data) -> Option<RgbaTexture> {
    use gltf::image::Format;

    let pixels = match data.format {
        Format::R8G8B8A8 => data.pixels.clone(),
        Format::R8G8B8 => data
            .pixels
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect(),
        Format::R8G8 => data
            .pixels
            .chunks_exact(2)
            .flat_map(|p| [p[0], p[0], p[0], p[1]])
            .collect(),
        Format::R8 => data.pixels.iter().flat_map(|&p| [p, p, p, 255]).collect(),
        other => {
            log::warn!("Unsupported glTF texture format {:?}; using base color factor only.", other);
            return None;
        }
    };
    Some(RgbaTexture {
        id: next_asset_id(),
        width: data.width,
        height: data.height,
        pixels,
    })
}

fn smooth_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut normals = vec![glam::Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if a >= positions.len() || b >= positions.len() || c >= positions.len() {
            continue;
        }
        let pa = glam::Vec3::from(positions[a]);
        let face = (glam::Vec3::from(positions[b]) - pa).cross(glam::Vec3::from(positions[c]) - pa);
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }
    normals
        .into_iter()
        .map(|normal| normal.try_normalize().unwrap_or(glam::Vec3::Y).to_array())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_chain_reaches_one_pixel_and_preserves_average() {
        let (width, height) = (8u32, 4u32);
        let mut rgb = Vec::new();
        for index in 0..(width * height) {
            let value = index as f32;
            rgb.extend_from_slice(&[value, 1.0, 0.5]);
        }
        let map = EnvMap::from_rgb32f("ramp", width, height, &rgb);

        assert_eq!(map.mip_count(), 4);
        let last = map.levels().last().unwrap();
        assert_eq!((last.width, last.height), (1, 1));

        let mean = (0..width * height).map(|i| i as f32).sum::<f32>() / (width * height) as f32;
        assert!((last.texels[0].to_f32() - mean).abs() < 0.1);
        assert!((last.texels[1].to_f32() - 1.0).abs() < 1e-3);
        assert_eq!(last.texels[3].to_f32(), 1.0);
    }

    #[test]
    fn env_maps_get_unique_ids() {
        let a = EnvMap::from_rgb32f("a", 1, 1, &[1.0, 1.0, 1.0]);
        let b = EnvMap::from_rgb32f("b", 1, 1, &[1.0, 1.0, 1.0]);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn short_pixel_buffer_pads_with_black() {
        let map = EnvMap::from_rgb32f("short", 2, 1, &[2.0, 2.0, 2.0]);
        let base = &map.levels()[0];
        assert_eq!(base.texels.len(), 8);
        assert_eq!(base.texels[4].to_f32(), 0.0);
        assert_eq!(base.texels[7].to_f32(), 1.0);
    }

    #[test]
    fn missing_hdr_is_a_read_error() {
        let err = load_env_map(Path::new("does/not/exist.hdr")).unwrap_err();
        assert!(matches!(err, AssetError::Read { .. }));
    }

    #[test]
    fn garbage_hdr_is_a_decode_error() {
        let mut path = std::env::temp_dir();
        path.push(format!("envmap_viewer_garbage_{}.hdr", std::process::id()));
        std::fs::write(&path, b"definitely not radiance").unwrap();

        let err = load_env_map(&path).unwrap_err();
        assert!(matches!(err, AssetError::DecodeHdr { .. }));

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn smooth_normals_face_outward_for_single_triangle() {
        let positions = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let normals = smooth_normals(&positions, &[0, 1, 2]);
        for normal in normals {
            assert!((normal[2] - 1.0).abs() < 1e-6);
        }
    }
}
