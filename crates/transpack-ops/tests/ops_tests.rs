use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tempfile::TempDir;
use transpack_core::{ProgressChannel, TranspackConfig};
use transpack_ops::{copy_tree, ArchiveBuilder, DEFAULT_COPY_BUFFER};

/// Read every file under `root` into a map of relative path to bytes.
fn snapshot_tree(root: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut files = BTreeMap::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let relative = path
                    .strip_prefix(root)
                    .unwrap()
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().to_string())
                    .collect::<Vec<_>>()
                    .join("/");
                files.insert(relative, fs::read(&path).unwrap());
            }
        }
    }
    files
}

fn round_trip(files: &[(&str, &[u8])]) {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    for (name, content) in files {
        let path = src.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    let names: Vec<&str> = files.iter().map(|(name, _)| *name).collect();
    let archive = out.path().join("package.zip");
    let builder = ArchiveBuilder::new();

    let result = builder
        .pack(src.path(), &names, &archive, &ProgressChannel::new())
        .unwrap();
    assert_eq!(result.packaged, files.len());

    let dest = out.path().join("extracted");
    let mut extracted = builder
        .unpack(&archive, &dest, &ProgressChannel::new())
        .unwrap();
    extracted.sort();

    let mut expected: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    expected.sort();
    assert_eq!(extracted, expected);
    assert_eq!(snapshot_tree(&dest), snapshot_tree(src.path()));
}

#[test]
fn test_round_trip_flat() {
    let files: [(&str, &[u8]); 3] = [("a.txt", b"alpha"), ("b.txt", b"beta"), ("empty.txt", b"")];
    round_trip(&files);
}

#[test]
fn test_round_trip_nested() {
    let files: [(&str, &[u8]); 5] = [
        ("root.ditamap", b"<map/>"),
        ("topics/intro.dita", b"<topic id=\"intro\"/>"),
        ("topics/deep/more/leaf.dita", b"leaf"),
        ("images/zero.png", b""),
        ("images/logo.png", &[0u8, 159, 146, 150, 255]),
    ];
    round_trip(&files);
}

#[test]
fn test_fragment_is_stripped() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    fs::create_dir_all(src.path().join("dir")).unwrap();
    fs::write(src.path().join("dir/file.dita"), "<topic/>").unwrap();

    let archive = out.path().join("package.zip");
    let builder = ArchiveBuilder::new();
    builder
        .pack(
            src.path(),
            &["dir/file.dita#topic1"],
            &archive,
            &ProgressChannel::new(),
        )
        .unwrap();

    let names: Vec<String> = builder
        .list(&archive)
        .unwrap()
        .into_iter()
        .map(|e| e.relative_path)
        .collect();
    assert_eq!(names, vec!["dir", "dir/file.dita"]);
    assert!(names.iter().all(|n| !n.contains('#')));
}

#[test]
fn test_configured_staging_name() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    fs::write(src.path().join("a.txt"), "a").unwrap();

    let config = TranspackConfig::builder()
        .staging_dir_name("_stage")
        .build()
        .unwrap();
    let builder = ArchiveBuilder::from_config(&config);
    assert_eq!(builder.staging_dir_name(), "_stage");

    builder
        .pack(
            src.path(),
            &["a.txt"],
            &out.path().join("p.zip"),
            &ProgressChannel::new(),
        )
        .unwrap();
    assert!(!src.path().join("_stage").exists());
}

#[test]
fn test_copy_tree_mirrors_extracted_archive() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    fs::create_dir_all(src.path().join("x/y")).unwrap();
    fs::write(src.path().join("x/y/z.txt"), "z").unwrap();
    fs::write(src.path().join("x/w.txt"), "w").unwrap();

    let mirror = out.path().join("mirror");
    let copied = copy_tree(src.path(), &mirror, DEFAULT_COPY_BUFFER, &ProgressChannel::new()).unwrap();

    assert_eq!(copied, 2);
    assert_eq!(snapshot_tree(&mirror), snapshot_tree(src.path()));
}

#[test]
fn test_builder_copy_tree_uses_configured_buffer() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    fs::create_dir_all(src.path().join("topics")).unwrap();
    fs::write(src.path().join("topics/long.dita"), "<p>text</p>".repeat(500)).unwrap();

    let config = TranspackConfig::builder()
        .copy_buffer_size(5usize)
        .build()
        .unwrap();
    let builder = ArchiveBuilder::from_config(&config);
    assert_eq!(builder.copy_buffer_size(), 5);
    assert_eq!(ArchiveBuilder::new().copy_buffer_size(), DEFAULT_COPY_BUFFER);

    let mirror = out.path().join("mirror");
    let copied = builder
        .copy_tree(src.path(), &mirror, &ProgressChannel::new())
        .unwrap();

    assert_eq!(copied, 1);
    assert_eq!(snapshot_tree(&mirror), snapshot_tree(src.path()));
}
