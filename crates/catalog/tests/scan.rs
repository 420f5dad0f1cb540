use std::fs;
use std::path::Path;

use catalog::{fingerprint, CatalogError, DirectoryCatalog, ItemSource};

fn touch(root: &Path, rel: &str, bytes: &[u8]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, bytes).unwrap();
}

fn image_tree() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    touch(root, "CT/m2/b.png", b"png");
    touch(root, "CT/m1/img2.PNG", b"png");
    touch(root, "CT/m1/img1.jpg", b"jpg");
    touch(root, "CT/m1/notes.txt", b"text");
    touch(root, "CT/m1/empty.png", b"");
    touch(root, "CT/readme.md", b"top-level file");
    touch(root, "MRI/m1/x.jpeg", b"jpeg");
    touch(root, "US/m1/scan.bmp", b"bmp");
    fs::create_dir_all(root.join("Empty/m1")).unwrap();
    dir
}

#[test]
fn lists_modalities_with_images_in_name_order() {
    let dir = image_tree();
    let catalog = DirectoryCatalog::new(dir.path(), false);
    assert_eq!(catalog.modalities().unwrap(), vec!["CT", "MRI"]);

    let extended = DirectoryCatalog::new(dir.path(), true);
    assert_eq!(extended.modalities().unwrap(), vec!["CT", "MRI", "US"]);
}

#[test]
fn lists_items_by_method_then_filename() {
    let dir = image_tree();
    let catalog = DirectoryCatalog::new(dir.path(), false);
    let items = catalog.list_items("CT").unwrap();

    let names: Vec<(&str, &str)> = items.iter().map(|i| (i.method.as_str(), i.filename.as_str())).collect();
    assert_eq!(names, vec![("m1", "img1.jpg"), ("m1", "img2.PNG"), ("m2", "b.png")]);
    assert!(items.iter().all(|i| i.modality == "CT"));
    assert_eq!(items[0].source_location, dir.path().join("CT/m1/img1.jpg"));
}

#[test]
fn listing_is_stable_across_scans() {
    let dir = image_tree();
    let catalog = DirectoryCatalog::new(dir.path(), false);
    let first = catalog.list_items("CT").unwrap();
    let second = catalog.list_items("CT").unwrap();
    assert_eq!(fingerprint(&first), fingerprint(&second));

    touch(dir.path(), "CT/m1/img3.png", b"png");
    let third = catalog.list_items("CT").unwrap();
    assert_eq!(third.len(), 4);
    assert_ne!(fingerprint(&first), fingerprint(&third));
}

#[test]
fn unknown_or_escaping_modality_is_rejected() {
    let dir = image_tree();
    let catalog = DirectoryCatalog::new(dir.path(), false);

    for name in ["PET", "../CT", "CT/m1", ""] {
        let err = catalog.list_items(name).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownModality(_)), "{name}: {err}");
    }
}

#[test]
fn missing_root_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = DirectoryCatalog::new(dir.path().join("nope"), false);
    assert!(matches!(catalog.modalities(), Err(CatalogError::RootMissing(_))));
}

#[test]
fn modality_without_images_lists_nothing() {
    let dir = image_tree();
    let catalog = DirectoryCatalog::new(dir.path(), false);
    assert!(catalog.list_items("Empty").unwrap().is_empty());
}
