//! Binary glTF (GLB) codec
//!
//! Decoding goes through the `gltf` crate and supports documents whose
//! buffers live in the embedded BIN chunk. Encoding writes a self-contained
//! GLB with a single buffer, one buffer view per accessor, POSITION (with
//! bounds), optional NORMAL and `UNSIGNED_INT` indices. Nodes, their
//! transforms and children, and scenes are carried through both ways.

use crate::codec::MeshCodec;
use decimesh_core::{Error, Mesh, MeshDocument, Node, Primitive, Result, Scene, Topology, Transform};
use gltf::Semantic;
use itertools::Itertools;
use serde_json::{json, Map, Value};

const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: &[u8; 4] = b"JSON";
const CHUNK_BIN: &[u8; 4] = b"BIN\0";

const FLOAT: u32 = 5126;
const UNSIGNED_INT: u32 = 5125;
const ARRAY_BUFFER: u32 = 34962;
const ELEMENT_ARRAY_BUFFER: u32 = 34963;

/// Binary glTF reader and writer
#[derive(Debug, Clone, Default)]
pub struct GlbCodec {
    generator: Option<String>,
}

impl GlbCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the `asset.generator` string written into encoded files
    pub fn with_generator<S: Into<String>>(mut self, generator: S) -> Self {
        self.generator = Some(generator.into());
        self
    }
}

impl MeshCodec for GlbCodec {
    fn decode(&self, bytes: &[u8]) -> Result<MeshDocument> {
        let gltf = gltf::Gltf::from_slice(bytes).map_err(|e| Error::Decode(e.to_string()))?;
        let blob = gltf.blob.as_deref();
        check_ranges(&gltf.document, blob.map_or(0, <[u8]>::len))?;

        let mut meshes = Vec::new();
        for mesh in gltf.document.meshes() {
            let mut primitives = Vec::new();
            for primitive in mesh.primitives() {
                primitives.push(read_primitive(&primitive, blob)?);
            }
            meshes.push(Mesh {
                name: mesh.name().map(str::to_owned),
                primitives,
            });
        }

        let nodes = gltf.document.nodes().map(|node| read_node(&node)).collect();
        let scenes = gltf
            .document
            .scenes()
            .map(|scene| Scene {
                name: scene.name().map(str::to_owned),
                nodes: scene.nodes().map(|node| node.index()).collect(),
            })
            .collect();

        let document = MeshDocument {
            meshes,
            nodes,
            scenes,
            scene: gltf.document.default_scene().map(|scene| scene.index()),
        };
        document.validate()?;
        Ok(document)
    }

    fn encode(&self, document: &MeshDocument) -> Result<Vec<u8>> {
        document.validate()?;
        let mut bin = BinBuilder::default();
        let mut meshes = Vec::with_capacity(document.meshes.len());

        for mesh in &document.meshes {
            let mut primitives = Vec::with_capacity(mesh.primitives.len());
            for primitive in &mesh.primitives {
                primitives.push(bin.write_primitive(primitive)?);
            }
            let mut value = json!({ "primitives": primitives });
            if let Some(name) = &mesh.name {
                value["name"] = json!(name);
            }
            meshes.push(value);
        }

        let mut root = json!({
            "asset": {
                "version": "2.0",
                "generator": self.generator.as_deref().unwrap_or("decimesh"),
            },
        });
        if let Some(scene) = document.scene {
            root["scene"] = json!(scene);
        }
        if !document.scenes.is_empty() {
            root["scenes"] = Value::Array(document.scenes.iter().map(scene_json).collect());
        }
        if !document.nodes.is_empty() {
            root["nodes"] = Value::Array(document.nodes.iter().map(node_json).collect());
        }
        if !meshes.is_empty() {
            root["meshes"] = Value::Array(meshes);
        }
        if !bin.accessors.is_empty() {
            root["accessors"] = Value::Array(bin.accessors);
        }
        if !bin.bytes.is_empty() {
            root["bufferViews"] = Value::Array(bin.views);
            root["buffers"] = json!([{ "byteLength": bin.bytes.len() }]);
        }

        let json = serde_json::to_vec(&root).map_err(|e| Error::Encode(e.to_string()))?;
        assemble_glb(json, bin.bytes)
    }

    fn format_name(&self) -> &'static str {
        "glb"
    }
}

/// Reject documents whose views or accessors point past the BIN chunk
fn check_ranges(document: &gltf::Document, blob_len: usize) -> Result<()> {
    for buffer in document.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Uri(uri) => {
                return Err(Error::UnsupportedFormat(format!(
                    "external buffer '{}' is not supported",
                    uri
                )));
            }
            gltf::buffer::Source::Bin => {
                if buffer.length() > blob_len {
                    return Err(Error::Decode(format!(
                        "BIN chunk holds {} bytes but buffer declares {}",
                        blob_len,
                        buffer.length()
                    )));
                }
            }
        }
    }

    for view in document.views() {
        if view.offset() + view.length() > view.buffer().length() {
            return Err(Error::Decode(format!(
                "buffer view {} exceeds its buffer",
                view.index()
            )));
        }
    }

    for accessor in document.accessors() {
        let Some(view) = accessor.view() else { continue };
        if accessor.count() == 0 {
            continue;
        }
        let stride = view.stride().unwrap_or(accessor.size());
        let needed = accessor.offset() + stride * (accessor.count() - 1) + accessor.size();
        if needed > view.length() {
            return Err(Error::Decode(format!(
                "accessor {} needs {} bytes but its view holds {}",
                accessor.index(),
                needed,
                view.length()
            )));
        }
    }

    Ok(())
}

fn read_primitive(primitive: &gltf::Primitive<'_>, blob: Option<&[u8]>) -> Result<Primitive> {
    let gl_mode = primitive.mode().as_gl_enum();
    let mode = Topology::from_gl(gl_mode)
        .ok_or_else(|| Error::Decode(format!("unknown primitive mode {}", gl_mode)))?;
    let reader = primitive.reader(|buffer| match buffer.source() {
        gltf::buffer::Source::Bin => blob,
        gltf::buffer::Source::Uri(_) => None,
    });

    let positions = match primitive.get(&Semantic::Positions) {
        Some(accessor) if accessor.count() == 0 => Some(Vec::new()),
        Some(_) => Some(
            reader
                .read_positions()
                .ok_or_else(|| Error::Decode("unreadable POSITION accessor".to_string()))?
                .collect::<Vec<[f32; 3]>>(),
        ),
        None => None,
    };

    let normals = match primitive.get(&Semantic::Normals) {
        Some(accessor) if accessor.count() == 0 => Some(Vec::new()),
        Some(_) => Some(
            reader
                .read_normals()
                .ok_or_else(|| Error::Decode("unreadable NORMAL accessor".to_string()))?
                .collect::<Vec<[f32; 3]>>(),
        ),
        None => None,
    };

    let indices = match primitive.indices() {
        Some(accessor) if accessor.count() == 0 => Some(Vec::new()),
        Some(_) => {
            let read = reader
                .read_indices()
                .ok_or_else(|| Error::Decode("unreadable index accessor".to_string()))?;
            Some(read.into_u32().collect::<Vec<u32>>())
        }
        None => None,
    };

    Ok(Primitive {
        mode,
        positions,
        normals,
        indices,
    })
}

fn read_node(node: &gltf::Node<'_>) -> Node {
    let transform = match node.transform() {
        gltf::scene::Transform::Matrix { matrix } => Transform::Matrix(matrix),
        gltf::scene::Transform::Decomposed {
            translation,
            rotation,
            scale,
        } => Transform::Decomposed {
            translation,
            rotation,
            scale,
        },
    };
    Node {
        name: node.name().map(str::to_owned),
        mesh: node.mesh().map(|mesh| mesh.index()),
        transform,
        children: node.children().map(|child| child.index()).collect(),
    }
}

fn node_json(node: &Node) -> Value {
    let mut value = json!({});
    if let Some(name) = &node.name {
        value["name"] = json!(name);
    }
    if let Some(mesh) = node.mesh {
        value["mesh"] = json!(mesh);
    }
    if !node.children.is_empty() {
        value["children"] = json!(node.children);
    }
    if !node.transform.is_identity() {
        match node.transform {
            Transform::Matrix(matrix) => {
                value["matrix"] = json!(matrix.iter().flatten().copied().collect::<Vec<f32>>());
            }
            Transform::Decomposed {
                translation,
                rotation,
                scale,
            } => {
                value["translation"] = json!(translation);
                value["rotation"] = json!(rotation);
                value["scale"] = json!(scale);
            }
        }
    }
    value
}

fn scene_json(scene: &Scene) -> Value {
    let mut value = json!({ "nodes": scene.nodes });
    if let Some(name) = &scene.name {
        value["name"] = json!(name);
    }
    value
}

/// Accumulates the BIN chunk together with its views and accessors
#[derive(Default)]
struct BinBuilder {
    bytes: Vec<u8>,
    views: Vec<Value>,
    accessors: Vec<Value>,
}

impl BinBuilder {
    fn write_primitive(&mut self, primitive: &Primitive) -> Result<Value> {
        let positions = primitive
            .positions
            .as_ref()
            .ok_or_else(|| Error::Encode("primitive has no POSITION attribute".to_string()))?;

        let mut attributes = Map::new();
        let position = self.push_vec3(positions, true);
        attributes.insert("POSITION".to_string(), json!(position));
        if let Some(normals) = &primitive.normals {
            let normal = self.push_vec3(normals, false);
            attributes.insert("NORMAL".to_string(), json!(normal));
        }

        let mut value = json!({
            "attributes": attributes,
            "mode": primitive.mode.as_gl(),
        });
        if let Some(indices) = &primitive.indices {
            let bytes = indices.iter().flat_map(|i| i.to_le_bytes()).collect();
            let accessor = self.push_accessor(
                bytes,
                indices.len(),
                UNSIGNED_INT,
                "SCALAR",
                ELEMENT_ARRAY_BUFFER,
            );
            value["indices"] = json!(accessor);
        }
        Ok(value)
    }

    fn push_vec3(&mut self, values: &[[f32; 3]], with_bounds: bool) -> usize {
        let bytes = values.iter().flatten().flat_map(|v| v.to_le_bytes()).collect();
        let index = self.push_accessor(bytes, values.len(), FLOAT, "VEC3", ARRAY_BUFFER);
        if with_bounds {
            let (min, max) = bounds(values);
            self.accessors[index]["min"] = json!(min);
            self.accessors[index]["max"] = json!(max);
        }
        index
    }

    fn push_accessor(
        &mut self,
        bytes: Vec<u8>,
        count: usize,
        component_type: u32,
        kind: &str,
        target: u32,
    ) -> usize {
        let mut accessor = json!({
            "componentType": component_type,
            "count": count,
            "type": kind,
        });

        // Every component is four bytes wide, so offsets stay aligned.
        if !bytes.is_empty() {
            self.views.push(json!({
                "buffer": 0,
                "byteOffset": self.bytes.len(),
                "byteLength": bytes.len(),
                "target": target,
            }));
            self.bytes.extend_from_slice(&bytes);
            accessor["bufferView"] = json!(self.views.len() - 1);
        }

        self.accessors.push(accessor);
        self.accessors.len() - 1
    }
}

fn bounds(values: &[[f32; 3]]) -> ([f32; 3], [f32; 3]) {
    let mut min = [0.0f32; 3];
    let mut max = [0.0f32; 3];
    for axis in 0..3 {
        if let Some((lo, hi)) = values.iter().map(|v| v[axis]).minmax().into_option() {
            min[axis] = lo;
            max[axis] = hi;
        }
    }
    (min, max)
}

fn assemble_glb(mut json: Vec<u8>, mut bin: Vec<u8>) -> Result<Vec<u8>> {
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    while bin.len() % 4 != 0 {
        bin.push(0);
    }

    let bin_chunk = if bin.is_empty() { 0 } else { 8 + bin.len() };
    let total = 12 + 8 + json.len() + bin_chunk;
    let total = u32::try_from(total)
        .map_err(|_| Error::Encode(format!("GLB of {} bytes exceeds 4 GiB", total)))?;

    let mut out = Vec::with_capacity(total as usize);
    out.extend_from_slice(GLB_MAGIC);
    out.extend_from_slice(&GLB_VERSION.to_le_bytes());
    out.extend_from_slice(&total.to_le_bytes());

    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(CHUNK_JSON);
    out.extend_from_slice(&json);

    if !bin.is_empty() {
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(CHUNK_BIN);
        out.extend_from_slice(&bin);
    }

    Ok(out)
}
