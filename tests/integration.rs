//! Integration tests covering files on disk and the live registry seam.

use reg_file::*;
use std::path::PathBuf;

fn test_data_path(filename: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("test_data")
        .join(filename)
}

fn scratch_path(filename: &str) -> PathBuf {
    let dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("reg-file-tests");
    std::fs::create_dir_all(&dir).unwrap();
    dir.join(filename)
}

#[test]
fn test_open_sample_file() {
    let path = test_data_path("sample.reg");
    let result = RegistryFile::open(&path);

    assert!(result.is_ok(), "Failed to open sample.reg: {:?}", result.err());

    let file = result.unwrap();
    assert_eq!(file.source_path(), Some(path.as_path()));
    assert_eq!(file.encoding(), TextEncoding::Utf8);
    assert_eq!(file.version(), FileVersion::Regedit5);
    assert_eq!(file.keys().len(), 4);
}

#[test]
fn test_open_missing_file() {
    let result = RegistryFile::open(test_data_path("does-not-exist.reg"));
    assert!(matches!(result, Err(RegistryError::Io(_))));
}

#[test]
fn test_open_empty_file() {
    let path = scratch_path("empty.reg");
    std::fs::write(&path, b"").unwrap();
    assert!(matches!(
        RegistryFile::open(&path),
        Err(RegistryError::InvalidFileFormat { .. })
    ));
}

#[test]
fn test_save_as_utf16_and_reopen() {
    let mut file = RegistryFile::open(test_data_path("sample.reg")).unwrap();
    let key = file.find_key(r"HKCU\Software\Contoso").unwrap();
    file.tree_mut().add_value(key, "Added", "Ünïcode").unwrap();
    file.set_encoding(TextEncoding::Utf16Le);

    let path = scratch_path("utf16.reg");
    file.save_as(&path).unwrap();
    assert_eq!(file.source_path(), Some(path.as_path()));

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..2], &[0xFF, 0xFE]);

    let reopened = RegistryFile::open(&path).unwrap();
    assert_eq!(reopened.encoding(), TextEncoding::Utf16Le);
    let key = reopened.find_key(r"HKCU\Software\Contoso").unwrap();
    assert_eq!(
        reopened.tree().value(key, "Added").unwrap().as_string().unwrap(),
        "Ünïcode"
    );
    assert_eq!(reopened.to_reg_string(), file.to_reg_string());
}

#[test]
fn test_save_and_read_back() {
    let path = scratch_path("reread.reg");
    let mut file = RegistryFile::new();
    let key = file.tree_mut().create_path(r"HKCU\Software\Reread").unwrap();
    file.tree_mut().add_value(key, "Count", 1u32).unwrap();
    file.add_key(key, false).unwrap();
    file.save_as(&path).unwrap();

    file.tree_mut().set_value_data(key, "Count", 2u32).unwrap();
    file.save().unwrap();

    file.read_from_file().unwrap();
    let key = file.find_key(r"HKCU\Software\Reread").unwrap();
    assert_eq!(file.tree().value(key, "Count").unwrap().as_dword().unwrap(), 2);
}

#[test]
fn test_windows1252_file_keeps_encoding() {
    let path = scratch_path("ansi.reg");
    let mut bytes = b"REGEDIT4\r\n\r\n[HKEY_CURRENT_USER\\Caf".to_vec();
    bytes.push(0xE9);
    bytes.extend_from_slice(b"]\r\n\"Name\"=\"na\xEFve\"\r\n");
    std::fs::write(&path, &bytes).unwrap();

    let file = RegistryFile::open(&path).unwrap();
    assert_eq!(file.encoding(), TextEncoding::Windows1252);
    let key = file.find_key("HKCU\\Café").unwrap();
    assert_eq!(file.tree().value(key, "Name").unwrap().as_string().unwrap(), "naïve");

    let mut written = Vec::new();
    file.write_to(&mut written).unwrap();
    assert!(written.windows(4).any(|w| w == b"Caf\xE9"));
}

fn populated_registry() -> MemoryRegistry {
    let mut live = MemoryRegistry::new();
    live.create_key(r"HKCU\Software\Vendor\App\Settings").unwrap();
    live.create_key(r"HKCU\Software\Vendor\Other").unwrap();
    live.set_value(r"HKCU\Software\Vendor", "", ValueType::String, &ValueData::from("root").encode())
        .unwrap();
    live.set_value(r"HKCU\Software\Vendor\App", "Level", ValueType::Dword, &[3, 0, 0, 0])
        .unwrap();
    live.set_value(
        r"HKCU\Software\Vendor\App\Settings",
        "Theme",
        ValueType::String,
        &ValueData::from("dark").encode(),
    )
    .unwrap();
    live.set_value(r"HKCU\Software\Vendor\App", "Big", ValueType::Qword, &[0; 8])
        .unwrap();
    live
}

#[test]
fn test_read_from_registry_levels() {
    let live = populated_registry();
    let mut tree = RegistryTree::new();
    let vendor = tree.create_path(r"HKCU\Software\Vendor").unwrap();

    tree.read_from_registry(vendor, 0, &live).unwrap();
    assert!(tree.key(vendor).unwrap().is_populated());
    assert_eq!(tree.default_value(vendor).unwrap().as_string().unwrap(), "root");
    let app = tree.find_subkey(vendor, "App").unwrap();
    assert!(tree.key(app).unwrap().subkeys().is_empty());
    assert!(!tree.key(app).unwrap().is_populated());

    tree.read_from_registry(vendor, 2, &live).unwrap();
    let app = tree.find_subkey(vendor, "App").unwrap();
    let settings = tree.find_subkey(app, "Settings").unwrap();
    assert_eq!(tree.value(app, "Level").unwrap().as_dword().unwrap(), 3);
    assert!(tree.value(app, "Big").is_none());
    assert_eq!(tree.value(settings, "Theme").unwrap().as_string().unwrap(), "dark");
}

#[test]
fn test_read_from_registry_replaces_content() {
    let live = populated_registry();
    let mut tree = RegistryTree::new();
    let vendor = tree.create_path(r"HKCU\Software\Vendor").unwrap();
    let stale = tree.create_subkey(vendor, "Stale").unwrap();
    tree.add_value(vendor, "Stale", 1u32).unwrap();

    tree.read_from_registry(vendor, 0, &live).unwrap();
    assert!(!tree.contains(stale));
    assert!(tree.value(vendor, "Stale").is_none());
}

#[test]
fn test_access_denied_keeps_partial_read() {
    let mut live = populated_registry();
    live.deny(r"HKCU\Software\Vendor\App").unwrap();

    let mut tree = RegistryTree::new();
    let vendor = tree.create_path(r"HKCU\Software\Vendor").unwrap();
    tree.read_from_registry(vendor, 3, &live).unwrap();

    let app = tree.find_subkey(vendor, "App").unwrap();
    assert!(tree.key(app).unwrap().is_populated());
    assert!(tree.key(app).unwrap().values().is_empty());
    assert!(tree.find_subkey(vendor, "Other").is_some());
}

#[test]
fn test_import_writes_and_deletes() {
    let mut live = populated_registry();
    let text = "Windows Registry Editor Version 5.00\r\n\r\n\
                [HKEY_CURRENT_USER\\Software\\Vendor\\App]\r\n\
                \"Level\"=-\r\n\
                \"Missing\"=-\r\n\
                \"Name\"=\"imported\"\r\n\r\n\
                [-HKEY_CURRENT_USER\\Software\\Vendor\\Other]\r\n\r\n\
                [-HKEY_CURRENT_USER\\Software\\Vendor\\Never]\r\n\r\n\
                [HKEY_CURRENT_USER\\Software\\New\\Deep]\r\n\
                \"Flag\"=dword:00000001\r\n\r\n";
    let file = RegistryFile::parse(text).unwrap();
    for id in file.keys().ids() {
        file.tree().import(id, &mut live).unwrap();
    }

    let app = r"HKCU\Software\Vendor\App";
    let names = live.value_names(app).unwrap();
    assert!(!names.contains(&"Level".to_string()));
    assert_eq!(
        live.get_value(app, "Name").unwrap(),
        (ValueType::String, ValueData::from("imported").encode())
    );
    assert!(!live.key_exists(r"HKCU\Software\Vendor\Other"));
    assert!(live.key_exists(r"HKCU\Software\Vendor\App\Settings"));
    assert_eq!(
        live.get_value(r"HKCU\Software\New\Deep", "Flag").unwrap(),
        (ValueType::Dword, vec![1, 0, 0, 0])
    );
}

#[test]
fn test_import_access_denied_fails() {
    let mut live = populated_registry();
    live.deny(r"HKCU\Software\Vendor\App").unwrap();

    let mut tree = RegistryTree::new();
    let app = tree.create_path(r"HKCU\Software\Vendor\App").unwrap();
    tree.add_value(app, "x", 1u32).unwrap();
    assert!(matches!(
        tree.import(app, &mut live),
        Err(RegistryError::AccessDenied(_))
    ));
}

#[test]
fn test_remove_from_registry() {
    let mut live = populated_registry();
    let mut tree = RegistryTree::new();
    let app = tree.create_path(r"HKCU\Software\Vendor\App").unwrap();

    tree.remove_from_registry(app, &mut live).unwrap();
    assert!(!tree.contains(app));
    assert!(!live.key_exists(r"HKCU\Software\Vendor\App"));
    assert!(live.key_exists(r"HKCU\Software\Vendor"));
}

#[test]
fn test_open_live_links_subtree() {
    let live = populated_registry();
    let mut tree = RegistryTree::new();
    let vendor = tree.open_live(r"HKEY_CURRENT_USER\Software\Vendor", &live).unwrap();

    for id in tree.walk(vendor).unwrap() {
        let node = tree.key(id).unwrap();
        assert!(node.is_linked(), "{} not linked", tree.full_path(id).unwrap());
        assert!(node.is_populated());
    }
    let settings = tree.find_path(r"HKCU\Software\Vendor\App\Settings").unwrap();
    assert_eq!(tree.value(settings, "Theme").unwrap().as_string().unwrap(), "dark");

    tree.set_linked(vendor, false, &live).unwrap();
    assert!(!tree.key(settings).unwrap().is_linked());
}

#[test]
fn test_export_live_subtree_to_file() {
    let live = populated_registry();
    let mut file = RegistryFile::new();
    let vendor = file
        .tree_mut()
        .open_live(r"HKCU\Software\Vendor", &live)
        .unwrap();
    file.add_key(vendor, true).unwrap();

    let text = file.to_reg_string();
    let app = text.find("[HKEY_CURRENT_USER\\Software\\Vendor\\App]").unwrap();
    let settings = text
        .find("[HKEY_CURRENT_USER\\Software\\Vendor\\App\\Settings]")
        .unwrap();
    let other = text.find("[HKEY_CURRENT_USER\\Software\\Vendor\\Other]").unwrap();
    assert!(app < settings && settings < other);
    assert!(text.contains("\"Level\"=dword:00000003\r\n"));
}

#[cfg(feature = "serde")]
#[test]
fn test_snapshot_serializes_to_json() {
    let file = RegistryFile::open(test_data_path("sample.reg")).unwrap();
    let json = serde_json::to_value(file.snapshot()).unwrap();

    assert_eq!(json[0]["path"], r"HKEY_CURRENT_USER\Software\Contoso");
    assert_eq!(json[0]["values"][0]["name"], "");
    assert_eq!(json[0]["values"][0]["value_type"], "REG_SZ");
    assert_eq!(json[2]["marked_for_deletion"], true);
}
