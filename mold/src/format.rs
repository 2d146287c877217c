use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader, BufWriter, Read, Seek, Write},
    path::Path,
};

use anyhow::{bail, Context, Result};
use obj::raw::{object::Polygon, parse_obj};
use stl_io::{Normal, Triangle, Vertex};
use tracing::info;

use crate::{mesh::Mesh, Pos};

/// Loads a `.stl` or `.obj` file, naming the mesh after the file stem.
pub fn load_mesh(path: &Path) -> Result<Mesh> {
    let name = path
        .file_stem()
        .map(|x| x.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mesh".to_owned());
    let format = extension(path)?;

    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let mesh = match format.as_str() {
        "stl" => read_stl(&mut reader, name),
        "obj" => read_obj(reader, name),
        _ => bail!("Unsupported format: {format}"),
    }
    .with_context(|| format!("Failed to read {}", path.display()))?;

    info!(
        "Loaded `{}` with {} vertices and {} faces",
        mesh.name(),
        mesh.vertex_count(),
        mesh.face_count()
    );
    Ok(mesh)
}

/// Writes a mesh to `.stl` (n-gons are fanned into triangles) or `.obj`
/// (faces are kept as they are).
pub fn save_mesh(mesh: &Mesh, path: &Path) -> Result<()> {
    let format = extension(path)?;
    if !matches!(format.as_str(), "stl" | "obj") {
        bail!("Unsupported format: {format}");
    }

    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    if format == "stl" {
        write_stl(mesh, &mut writer)?;
    } else {
        write_obj(mesh, &mut writer)?;
    }
    writer.flush()?;

    info!("Saved `{}` to {}", mesh.name(), path.display());
    Ok(())
}

pub fn read_stl<T: Read + Seek>(reader: &mut T, name: impl Into<String>) -> Result<Mesh> {
    let model = stl_io::read_stl(reader)?;

    // Facets can repeat positions stl_io did not merge, so weld on the exact
    // bit pattern to keep the surface connected.
    let mut welded = HashMap::new();
    let mut vertices = Vec::new();
    let remap = (model.vertices.iter())
        .map(|v| {
            let pos = Pos::new(v[0], v[1], v[2]);
            *welded.entry(pos.map(f32::to_bits)).or_insert_with(|| {
                vertices.push(pos);
                vertices.len() as u32 - 1
            })
        })
        .collect::<Vec<_>>();

    let faces = (model.faces.iter())
        .map(|f| f.vertices.iter().map(|&v| remap[v]).collect())
        .collect();

    Ok(Mesh::new(name, vertices, faces))
}

pub fn read_obj<T: BufRead>(reader: T, name: impl Into<String>) -> Result<Mesh> {
    let raw = parse_obj(reader)?;

    let vertices = (raw.positions.iter())
        .map(|&(x, y, z, _)| Pos::new(x, y, z))
        .collect::<Vec<_>>();

    let mut faces = Vec::with_capacity(raw.polygons.len());
    for polygon in raw.polygons {
        let face = match polygon {
            Polygon::P(face) => face,
            Polygon::PT(face) => face.into_iter().map(|(p, _)| p).collect(),
            Polygon::PN(face) => face.into_iter().map(|(p, _)| p).collect(),
            Polygon::PTN(face) => face.into_iter().map(|(p, _, _)| p).collect(),
        };

        if let Some(&bad) = face.iter().find(|&&x| x >= vertices.len()) {
            bail!("Face references missing vertex {bad}");
        }
        faces.push(face.into_iter().map(|x| x as u32).collect());
    }

    Ok(Mesh::new(name, vertices, faces))
}

pub fn write_stl<T: Write>(mesh: &Mesh, writer: &mut T) -> Result<()> {
    let vertex = |idx: u32| {
        let pos = mesh.vertices()[idx as usize];
        Vertex::new([pos.x, pos.y, pos.z])
    };

    let mut triangles = Vec::new();
    for (idx, face) in mesh.faces().iter().enumerate() {
        let normal = mesh.normal(idx);
        for pair in face[1..].windows(2) {
            triangles.push(Triangle {
                normal: Normal::new([normal.x, normal.y, normal.z]),
                vertices: [vertex(face[0]), vertex(pair[0]), vertex(pair[1])],
            });
        }
    }

    stl_io::write_stl(writer, triangles.iter())?;
    Ok(())
}

pub fn write_obj<T: Write>(mesh: &Mesh, writer: &mut T) -> Result<()> {
    writeln!(writer, "o {}", mesh.name())?;
    for v in mesh.vertices() {
        writeln!(writer, "v {} {} {}", v.x, v.y, v.z)?;
    }

    for face in mesh.faces() {
        write!(writer, "f")?;
        for idx in face {
            write!(writer, " {}", idx + 1)?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn extension(path: &Path) -> Result<String> {
    path.extension()
        .map(|x| x.to_string_lossy().to_ascii_lowercase())
        .with_context(|| format!("{} has no file extension", path.display()))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use approx::assert_relative_eq;

    use super::*;
    use crate::builder::MeshBuilder;

    fn unit_cube() -> Mesh {
        let mut builder = MeshBuilder::new();
        builder.add_box(Pos::zeros(), Pos::repeat(1.0));
        builder.build("cube")
    }

    #[test]
    fn stl_fans_faces_and_welds_vertices() {
        let cube = unit_cube();
        let mut buf = Vec::new();
        write_stl(&cube, &mut buf).unwrap();
        // Header, triangle count and 50 bytes per triangle.
        assert_eq!(buf.len(), 84 + 12 * 50);

        let mesh = read_stl(&mut Cursor::new(buf), "cube").unwrap();
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.face_count(), 12);
        assert!(mesh.is_manifold());
        assert_relative_eq!(mesh.volume(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn obj_keeps_polygons() {
        let cube = unit_cube();
        let mut buf = Vec::new();
        write_obj(&cube, &mut buf).unwrap();

        let mesh = read_obj(Cursor::new(buf), "cube").unwrap();
        assert_eq!(mesh.vertices(), cube.vertices());
        assert_eq!(mesh.faces(), cube.faces());
    }

    #[test]
    fn obj_with_texture_and_normal_indices() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvn 0 0 1\nf 1/1/1 2/1/1 3/1/1\n";
        let mesh = read_obj(Cursor::new(source), "tri").unwrap();
        assert_eq!(mesh.faces(), [vec![0u32, 1, 2]]);
        assert_relative_eq!(mesh.normal(0), Pos::z());
    }

    #[test]
    fn unknown_extension() {
        let path = Path::new("model.ply");
        assert!(save_mesh(&unit_cube(), path).is_err());
        assert!(load_mesh(Path::new("model")).is_err());
    }
}
