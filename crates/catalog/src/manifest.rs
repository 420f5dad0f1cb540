use ratings::Item;

pub type Hash32 = [u8; 32];

/// Fingerprint of an item listing:
/// - listing order is kept (it is the order raters see)
/// - hash bytes: "<method>\n<filename>\n" for each item
///
/// Sessions compare fingerprints to notice that the image tree changed
/// under them.
pub fn fingerprint(items: &[Item]) -> Hash32 {
    let mut hasher = blake3::Hasher::new();
    for item in items {
        hasher.update(item.method.as_bytes());
        hasher.update(b"\n");
        hasher.update(item.filename.as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize().into()
}

pub fn fingerprint_hex(items: &[Item]) -> String {
    hex::encode(fingerprint(items))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(method: &str, filename: &str) -> Item {
        Item {
            modality: "CT".into(),
            method: method.into(),
            filename: filename.into(),
            source_location: format!("/images/CT/{method}/{filename}").into(),
        }
    }

    #[test]
    fn test_fingerprint_ignores_source_location() {
        let a = vec![item("m1", "a.png")];
        let mut b = a.clone();
        b[0].source_location = "/elsewhere/a.png".into();
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_depends_on_order() {
        let a = vec![item("m1", "a.png"), item("m1", "b.png")];
        let b = vec![item("m1", "b.png"), item("m1", "a.png")];
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_separates_fields() {
        let a = vec![item("m1", "ab.png")];
        let b = vec![item("m1a", "b.png")];
        assert_ne!(fingerprint(&a), fingerprint(&b));
        assert_eq!(fingerprint_hex(&a).len(), 64);
    }
}
