//! Property tests: whatever is built in memory survives a write and re-read.

use proptest::prelude::*;
use reg_file::{RegistryFile, ValueData};

fn value_data() -> impl Strategy<Value = ValueData> {
    let text = "[^\\x00\\r\\n]{0,40}";
    prop_oneof![
        text.prop_map(ValueData::String),
        "%[A-Z]{1,8}%[^\\x00\\r\\n%]{0,20}".prop_map(ValueData::ExpandString),
        proptest::collection::vec(any::<u8>(), 0..200).prop_map(ValueData::Binary),
        any::<u32>().prop_map(ValueData::Dword),
        proptest::collection::vec("[^\\x00\\r\\n]{1,12}", 0..5).prop_map(ValueData::MultiString),
    ]
}

fn key_name() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_]{1,10}"
}

fn value_name() -> impl Strategy<Value = String> {
    "[^\\x00\\r\\n]{0,16}"
}

proptest! {
    #[test]
    fn values_survive_reg_text(
        path in proptest::collection::vec(key_name(), 1..4),
        values in proptest::collection::btree_map(value_name(), value_data(), 0..8),
    ) {
        let full = format!("HKEY_CURRENT_USER\\{}", path.join("\\"));
        let mut file = RegistryFile::new();
        let key = file.tree_mut().create_path(&full).unwrap();
        for (name, data) in &values {
            file.tree_mut().add_value(key, name, data.clone()).unwrap();
        }
        file.add_key(key, false).unwrap();

        let text = file.to_reg_string();
        let reparsed = RegistryFile::parse(&text).unwrap();
        let id = reparsed.find_key(&full).unwrap();

        prop_assert_eq!(reparsed.tree().full_path(id).unwrap(), full);
        prop_assert_eq!(reparsed.tree().key(id).unwrap().values().len(), values.len());
        for (name, data) in &values {
            let value = reparsed.tree().value(id, name).unwrap();
            prop_assert_eq!(value.value_type(), data.value_type());
            let encoded = data.encode();
            prop_assert_eq!(value.raw(), encoded.as_slice());
        }
        prop_assert_eq!(reparsed.to_reg_string(), text);
    }

    #[test]
    fn hex_lines_never_exceed_width(data in proptest::collection::vec(any::<u8>(), 0..400)) {
        let mut file = RegistryFile::new();
        let key = file.tree_mut().create_path("HKCU\\W").unwrap();
        file.tree_mut().add_value(key, "Data", data).unwrap();
        file.add_key(key, false).unwrap();

        for line in file.to_reg_string().split("\r\n") {
            let body = line.strip_suffix('\\').unwrap_or(line);
            prop_assert!(body.chars().count() <= 77);
        }
    }
}
