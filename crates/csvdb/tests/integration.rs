use csvdb::{FileStorage, InMemoryStorage, Storage, StorageError};

#[test]
fn test_missing_file_reads_as_none() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::new(dir.path().join("CT_ratings.csv")).unwrap();

    assert!(storage.read_all().unwrap().is_none());
}

#[test]
fn test_write_replaces_whole_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut storage = FileStorage::new(dir.path().join("CT_ratings.csv")).unwrap();

    storage.write_all(b"a,b\n1,2\n").unwrap();
    storage.write_all(b"a,b\n").unwrap();

    assert_eq!(storage.read_all().unwrap(), Some(b"a,b\n".to_vec()));
}

#[test]
fn test_write_leaves_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut storage = FileStorage::new(dir.path().join("CT_ratings.csv")).unwrap();

    storage.write_all(b"name\n").unwrap();

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["CT_ratings.csv".to_string()]);
}

#[test]
fn test_creates_missing_parent_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("data").join("MR_ratings.csv");
    let mut storage = FileStorage::new(&path).unwrap();

    storage.write_all(b"x\n").unwrap();
    assert!(path.exists());
}

#[test]
fn test_preserve_corrupt_writes_sibling() {
    let dir = tempfile::tempdir().unwrap();
    let mut storage = FileStorage::new(dir.path().join("CT_ratings.csv")).unwrap();

    let location = storage.preserve_corrupt(b"\xff\xfe garbage").unwrap().unwrap();

    assert!(location.ends_with("CT_ratings.csv.corrupt"));
    assert_eq!(std::fs::read(storage.corrupt_path()).unwrap(), b"\xff\xfe garbage".to_vec());
}

#[test]
fn test_preserve_corrupt_keeps_earlier_copies() {
    let dir = tempfile::tempdir().unwrap();
    let mut storage = FileStorage::new(dir.path().join("CT_ratings.csv")).unwrap();

    let first = storage.preserve_corrupt(b"first").unwrap().unwrap();
    let second = storage.preserve_corrupt(b"second").unwrap().unwrap();
    let third = storage.preserve_corrupt(b"third").unwrap().unwrap();

    assert!(first.ends_with("CT_ratings.csv.corrupt"));
    assert!(second.ends_with("CT_ratings.csv.corrupt.1"));
    assert!(third.ends_with("CT_ratings.csv.corrupt.2"));
    assert_eq!(std::fs::read(&first).unwrap(), b"first".to_vec());
    assert_eq!(std::fs::read(&second).unwrap(), b"second".to_vec());
    assert_eq!(std::fs::read(&third).unwrap(), b"third".to_vec());
}

#[test]
fn test_lock_is_reacquirable_after_drop() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::new(dir.path().join("CT_ratings.csv")).unwrap();

    {
        let guard = storage.lock_exclusive().unwrap();
        assert!(guard.is_held());
    }
    let again = storage.lock_exclusive().unwrap();
    assert!(again.is_held());
}

#[test]
fn test_lock_excludes_second_writer_until_released() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("CT_ratings.csv");
    let first = FileStorage::new(&path).unwrap();
    let second = FileStorage::new(&path).unwrap();

    let guard = first.lock_exclusive().unwrap();
    let (tx, rx) = std::sync::mpsc::channel();
    let handle = std::thread::spawn(move || {
        let _g = second.lock_exclusive().unwrap();
        tx.send(()).unwrap();
    });

    assert!(rx.recv_timeout(std::time::Duration::from_millis(200)).is_err());
    drop(guard);
    rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap();
    handle.join().unwrap();
}

#[test]
fn test_in_memory_clones_share_data() {
    let observer = InMemoryStorage::new();
    let mut writer = observer.clone();

    writer.write_all(b"name\n").unwrap();

    assert_eq!(observer.snapshot(), Some(b"name\n".to_vec()));
    assert!(!writer.lock_exclusive().unwrap().is_held());
}

#[test]
fn test_in_memory_failed_write_keeps_previous_bytes() {
    let mut storage = InMemoryStorage::with_bytes("name\nAlice\n");
    storage.set_fail_writes(true);

    let err = storage.write_all(b"name\n").unwrap_err();
    assert!(matches!(err, StorageError::Unavailable(_)));
    assert_eq!(storage.read_all().unwrap(), Some(b"name\nAlice\n".to_vec()));
}
