//! End-to-end extraction over synthetic archives.

use std::fs;

use veles::prelude::*;
use veles_wad::{BoxError, ExtractContext, Extracted, Extractor, NodeKind};

// Archive construction helpers (first container generation).

fn v1_frame(tag: u16, size: u32, name: &str) -> Vec<u8> {
    let mut frame = vec![0u8; 32];
    frame[0..2].copy_from_slice(&tag.to_le_bytes());
    frame[4..8].copy_from_slice(&size.to_le_bytes());
    frame[8..8 + name.len()].copy_from_slice(name.as_bytes());
    frame
}

fn new_archive() -> Vec<u8> {
    // Header frame carrying the generation tag.
    v1_frame(0x378, 0, "")
}

fn push_data(archive: &mut Vec<u8>, name: &str, payload: &[u8]) {
    archive.extend(v1_frame(0x1E, payload.len() as u32, name));
    archive.extend(payload);
    let padded = (payload.len() + 15) & !15;
    archive.extend(vec![0u8; padded - payload.len()]);
}

fn push_link(archive: &mut Vec<u8>, name: &str) {
    archive.extend(v1_frame(0x1E, 0, name));
}

fn push_group_start(archive: &mut Vec<u8>) {
    archive.extend(v1_frame(0x28, 0, ""));
}

fn push_group_end(archive: &mut Vec<u8>) {
    archive.extend(v1_frame(0x32, 0, ""));
}

// Resource payload builders.

fn raster_payload(width: u32, height: u32, bpi: u32, data: &[u8]) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend(0xCu32.to_le_bytes());
    for field in [width, height, 0, bpi, 1] {
        payload.extend(field.to_le_bytes());
    }
    payload.extend_from_slice(data);
    payload
}

fn texture_payload(raster: &str, palette: &str) -> Vec<u8> {
    let mut payload = vec![0u8; 0x58];
    payload[0..4].copy_from_slice(&0x7u32.to_le_bytes());
    payload[4..4 + raster.len()].copy_from_slice(raster.as_bytes());
    payload[28..28 + palette.len()].copy_from_slice(palette.as_bytes());
    payload[84..86].copy_from_slice(&0u16.to_le_bytes());
    payload[86..88].copy_from_slice(&1u16.to_le_bytes());
    payload
}

fn material_payload(texture: &str) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend(0x8u32.to_le_bytes());
    for channel in [1.0f32, 1.0, 1.0, 1.0] {
        payload.extend(channel.to_le_bytes());
    }
    payload.extend(1u32.to_le_bytes());
    let mut layer = vec![0u8; 0x40];
    layer[8..8 + texture.len()].copy_from_slice(texture.as_bytes());
    payload.extend(layer);
    payload
}

/// One root joint, identity-free pose data, no inverse matrices.
fn skeleton_payload() -> Vec<u8> {
    let mut payload = vec![0u8; 0x54 + 0xC0];
    let put = |payload: &mut [u8], offset: usize, value: u32| {
        payload[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    };
    put(&mut payload, 0, 0x40001);
    put(&mut payload, 0x1C, 1); // joint count
    put(&mut payload, 0x28, 0x54); // pose-data offset
    for at in [0x30, 0x32, 0x34] {
        payload[at..at + 2].copy_from_slice(&0xFFFFu16.to_le_bytes());
    }
    payload[0x3C..0x40].copy_from_slice(b"root");

    put(&mut payload, 0x54, 1); // bind matrices
    put(&mut payload, 0x58, 0x70); // index rows
    put(&mut payload, 0x60, 0x80); // inverse matrices (count 0)
    put(&mut payload, 0x74, 0x80); // positions
    put(&mut payload, 0x78, 0x90);
    put(&mut payload, 0x7C, 0xA0);
    put(&mut payload, 0x80, 0xB0);
    payload
}

/// One part, one group, one geometry object, one triangle-strip packet.
fn mesh_payload() -> Vec<u8> {
    let part = 0x58;
    let group = 0x68;
    let object = 0x80;
    let packet = 0x100;

    let mut packet_data = Vec::new();
    // Position run: 16 bit x4 signed, three vertices.
    packet_data.extend([0u8, 0, 3, 0x6D]);
    for (x, y, z, flag) in [
        (4096i16, 0, 0, 0x80u8),
        (0, 4096, 0, 0x80),
        (0, 0, 4096, 0),
    ] {
        for value in [x, y, z] {
            packet_data.extend(value.to_le_bytes());
        }
        packet_data.extend([0, flag]);
    }
    // Microprogram call flushes the block.
    packet_data.extend([0u8, 0, 0, 0x14]);
    while packet_data.len() % 16 != 0 {
        packet_data.push(0);
    }

    let mut payload = vec![0u8; packet + packet_data.len()];
    let put = |payload: &mut [u8], offset: usize, value: u32| {
        payload[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    };
    put(&mut payload, 0, 0x1000F);
    put(&mut payload, 4, (packet + packet_data.len()) as u32);
    put(&mut payload, 8, 1);
    put(&mut payload, 0x50, part as u32);

    payload[part + 2..part + 4].copy_from_slice(&1u16.to_le_bytes());
    put(&mut payload, part + 4, (group - part) as u32);

    put(&mut payload, group + 4, 1);
    put(&mut payload, group + 0xC, (object - group) as u32);

    payload[object..object + 2].copy_from_slice(&0xEu16.to_le_bytes());
    payload[object + 8] = 0; // material id
    put(&mut payload, object + 0xC, 1);
    payload[object + 0x18] = 1;
    put(&mut payload, object + 0x20 + 4, (packet - object) as u32);

    payload[packet..].copy_from_slice(&packet_data);
    payload
}

#[test]
fn test_full_pipeline_extracts_textures_and_meshes() {
    let mut archive = new_archive();
    push_group_start(&mut archive);
    push_data(&mut archive, "hero", &[0u8; 4]);

    let indices: Vec<u8> = (0..256).map(|i| i as u8).collect();
    push_data(&mut archive, "hero_gfx", &raster_payload(16, 16, 8, &indices));

    let mut palette = Vec::new();
    for i in 0..=255u8 {
        palette.extend([i, i, i, 128]);
    }
    push_data(&mut archive, "hero_pal", &raster_payload(0x10, 0x10, 8, &palette));

    push_data(&mut archive, "hero_txr", &texture_payload("hero_gfx", "hero_pal"));
    push_data(&mut archive, "hero_mat", &material_payload("hero_txr"));
    push_data(&mut archive, "hero_mdl", &mesh_payload());
    push_data(&mut archive, "hero_skl", &skeleton_payload());
    push_group_end(&mut archive);

    let mut wad = Wad::parse(&archive, None).unwrap();
    assert_eq!(wad.generation(), Generation::V1);

    let out = tempfile::tempdir().unwrap();
    let registry = veles::default_registry();
    let driver = Driver::new(&registry, ExtractOptions::new(out.path()));
    let summary = driver.run(&mut wad);

    assert!(summary.failures.is_empty(), "failures: {:?}", summary.failures);
    assert_eq!(summary.extracted, 6);

    let group = wad.node(wad.roots()[0]);
    let skl = group
        .children
        .iter()
        .map(|&id| wad.node(id))
        .find(|n| n.name == "hero_skl")
        .unwrap();
    let skeleton = skl
        .data()
        .and_then(|d| d.cache.as_ref())
        .and_then(|c| c.downcast_ref::<Skeleton>())
        .unwrap();
    assert_eq!(skeleton.joints[0].name, "root");

    assert!(out.path().join("hero/hero_txr.png").is_file());
    let obj = fs::read_to_string(out.path().join("hero/hero_mdl.obj")).unwrap();
    assert!(obj.contains("mtllib hero_mdl.mtl"));
    assert!(obj.contains("v 1 0 0"));
    assert!(obj.contains("f 1 2 3"));
    let mtl = fs::read_to_string(out.path().join("hero/hero_mdl.mtl")).unwrap();
    assert!(mtl.contains("newmtl mat_0"));
    assert!(mtl.contains("map_Kd ../hero/hero_txr.png"));
}

#[test]
fn test_out_of_order_dependency_fails_the_root() {
    // Texture before its raster: archive order is supposed to carry the
    // dependency, so this root aborts instead of being reordered.
    let mut archive = new_archive();
    push_group_start(&mut archive);
    push_data(&mut archive, "hero", &[0u8; 4]);
    push_data(&mut archive, "hero_txr", &texture_payload("hero_gfx", "hero_pal"));
    push_data(&mut archive, "hero_gfx", &raster_payload(16, 16, 8, &[0; 256]));
    push_group_end(&mut archive);

    let mut wad = Wad::parse(&archive, None).unwrap();
    let out = tempfile::tempdir().unwrap();
    let registry = veles::default_registry();
    let summary = Driver::new(&registry, ExtractOptions::new(out.path())).run(&mut wad);

    assert_eq!(summary.failures.len(), 1);
    assert!(summary.failures[0].1.to_string().contains("hero_gfx"));
}

#[test]
fn test_unresolved_link_fails_parse() {
    let mut archive = new_archive();
    push_group_start(&mut archive);
    push_data(&mut archive, "grp", &[0u8; 4]);
    push_link(&mut archive, "missing");
    push_group_end(&mut archive);

    let err = Wad::parse(&archive, None).unwrap_err();
    assert!(err.to_string().contains("missing"));
}

#[test]
fn test_link_shares_the_target_payload() {
    let mut archive = new_archive();
    push_data(&mut archive, "shared_gfx", &raster_payload(2, 2, 8, &[0, 1, 2, 3]));
    push_link(&mut archive, "shared_gfx");

    let wad = Wad::parse(&archive, None).unwrap();
    let link = wad.node(wad.roots()[1]);
    let NodeKind::Link { target } = link.kind else {
        panic!("expected a link node");
    };
    assert_eq!(wad.node(target).name, "shared_gfx");
}

/// Minimal custom capability: caches nothing, writes one artifact.
struct StampExtractor;

impl Extractor for StampExtractor {
    fn extract(&self, ctx: &ExtractContext<'_, '_>) -> Result<Extracted, BoxError> {
        let path = ctx.out_path().with_extension("stamp");
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, ctx.payload()?)?;
        Ok(Extracted {
            cache: None,
            artifacts: vec![format!("{}.stamp", ctx.node().path)],
        })
    }
}

#[test]
fn test_registered_format_marks_node_extracted() {
    let mut archive = new_archive();
    push_data(&mut archive, "blob", &0xBEEFu32.to_le_bytes());

    let mut wad = Wad::parse(&archive, None).unwrap();
    let out = tempfile::tempdir().unwrap();

    let mut registry = veles_wad::ExtractorRegistry::new();
    registry.register(0xBEEF, Box::new(StampExtractor));
    let summary = Driver::new(&registry, ExtractOptions::new(out.path())).run(&mut wad);

    assert_eq!(summary.extracted, 1);
    let data = wad.node(wad.roots()[0]).data().unwrap();
    assert!(data.extracted);
    assert_eq!(data.artifacts, ["blob.stamp"]);
    assert!(out.path().join("blob.stamp").is_file());
}
