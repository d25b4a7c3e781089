use gallery_images::{atomic_write, content_hash, ImageError, ImageStore};
use std::fs;
use tempfile::tempdir;

#[tokio::test]
async fn test_atomic_write_guarantee() {
    let dir = tempdir().unwrap();
    let dest_path = dir.path().join("nested").join("test_file.bin");
    let temp_folder = dir.path().join("tmp");

    atomic_write(&dest_path, b"first", &temp_folder).await.expect("Atomic write should succeed");
    assert_eq!(fs::read(&dest_path).unwrap(), b"first");

    atomic_write(&dest_path, b"second", &temp_folder)
        .await
        .expect("Atomic overwrite should succeed");
    assert_eq!(fs::read(&dest_path).unwrap(), b"second");

    // No temp files left behind
    assert_eq!(fs::read_dir(&temp_folder).unwrap().count(), 0);
}

#[tokio::test]
async fn test_put_get_and_dedup() {
    let dir = tempdir().unwrap();
    let store = ImageStore::new(dir.path().join("images"), dir.path().join("images/meta.sqlite"))
        .await
        .unwrap();

    let data = bytes::Bytes::from_static(b"\x89PNG fake image bytes");
    let meta = store.put(data.clone(), "image/png", "sunset.png").await.unwrap();
    assert_eq!(meta.hash, content_hash(&data));
    assert_eq!(meta.size, data.len() as u64);

    let (bytes, fetched) = store.get(&meta.hash).await.unwrap().expect("image should exist");
    assert_eq!(bytes, data);
    assert_eq!(fetched.filename, "sunset.png");

    // Same bytes under a different name keep the original record
    let again = store.put(data.clone(), "image/png", "copy.png").await.unwrap();
    assert_eq!(again.filename, "sunset.png");
}

#[tokio::test]
async fn test_checksum_verification() {
    let dir = tempdir().unwrap();
    let image_dir = dir.path().join("images");
    let store = ImageStore::new(image_dir.clone(), dir.path().join("meta.sqlite"))
        .await
        .unwrap();

    let meta = store
        .put(bytes::Bytes::from("integrity test data"), "image/jpeg", "a.jpg")
        .await
        .unwrap();

    let path = image_dir.join(&meta.hash[..2]).join(&meta.hash);
    fs::write(&path, "corrupted data").unwrap();

    match store.get(&meta.hash).await {
        Err(ImageError::ChecksumMismatch { hash, .. }) => assert_eq!(hash, meta.hash),
        other => panic!("expected checksum mismatch, got {:?}", other.map(|o| o.map(|(_, m)| m))),
    }
}

#[tokio::test]
async fn test_missing_and_invalid_hashes() {
    let dir = tempdir().unwrap();
    let store = ImageStore::new(dir.path().join("images"), dir.path().join("meta.sqlite"))
        .await
        .unwrap();

    let unknown = content_hash(b"never stored");
    assert!(store.get(&unknown).await.unwrap().is_none());
    assert!(!store.contains(&unknown).await.unwrap());

    assert!(matches!(
        store.get("../../etc/passwd").await,
        Err(ImageError::InvalidHash(_))
    ));
}

#[tokio::test]
async fn test_delete_removes_file_and_meta() {
    let dir = tempdir().unwrap();
    let store = ImageStore::new(dir.path().join("images"), dir.path().join("meta.sqlite"))
        .await
        .unwrap();

    let meta = store
        .put(bytes::Bytes::from("to be deleted"), "image/gif", "x.gif")
        .await
        .unwrap();
    store.delete(&meta.hash).await.unwrap();

    assert!(store.get(&meta.hash).await.unwrap().is_none());
    // Deleting again is fine
    store.delete(&meta.hash).await.unwrap();
}
