// Content-addressed symbol identity

use std::collections::HashSet;

use super::SymbolRecord;

/// Length of the hex id prefix taken from the digest
const ID_LEN: usize = 16;

/// Fingerprint of everything that makes a symbol "the same symbol":
/// body, signature, return type, and parameter list.
fn content_fingerprint(record: &SymbolRecord) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(record.raw_content.as_bytes());
    hasher.update(b"\0");
    if let Some(sig) = &record.signature {
        hasher.update(sig.as_bytes());
    }
    hasher.update(b"\0");
    if let Some(ret) = &record.return_type {
        hasher.update(ret.as_bytes());
    }
    hasher.update(b"\0");
    for param in &record.parameters {
        hasher.update(param.as_bytes());
        hasher.update(b"\x1f");
    }
    hasher.finalize()
}

/// Derive the base id for one record: location identity plus content
/// fingerprint, so an unchanged file re-parses to identical ids and any
/// edit to body/signature/returns/parameters produces a fresh id.
fn base_id(record: &SymbolRecord) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(record.file_path.as_bytes());
    hasher.update(b"\0");
    hasher.update(record.kind.as_str().as_bytes());
    hasher.update(b"\0");
    hasher.update(record.name.as_bytes());
    hasher.update(b"\0");
    hasher.update(record.start_line.to_string().as_bytes());
    hasher.update(b"\0");
    hasher.update(content_fingerprint(record).as_bytes());
    hasher.finalize().to_hex()[..ID_LEN].to_string()
}

/// Assign ids to a freshly parsed batch for one file.
///
/// Must run exactly once per (re-)index of a file, after parsing and before
/// any store write, so all strategies observe the same id for the same
/// symbol. In-batch hash collisions get an incrementing `-N` suffix.
pub fn assign_ids(records: &mut [SymbolRecord]) {
    let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
    for record in records.iter_mut() {
        let base = base_id(record);
        let mut id = base.clone();
        let mut suffix = 0;
        while !seen.insert(id.clone()) {
            suffix += 1;
            id = format!("{}-{}", base, suffix);
        }
        record.id = id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{Language, SymbolKind};
    use proptest::prelude::*;

    fn record(name: &str, start_line: usize, content: &str) -> SymbolRecord {
        SymbolRecord {
            id: String::new(),
            kind: SymbolKind::Function,
            name: name.to_string(),
            file_path: "/proj/a.py".to_string(),
            start_line,
            end_line: start_line + 1,
            raw_content: content.to_string(),
            language: Language::Python,
            docstring: None,
            signature: Some(format!("def {}()", name)),
            return_type: None,
            parameters: vec![],
            parent_name: None,
            imports: vec![],
            called_symbol_names: vec![],
        }
    }

    #[test]
    fn test_unchanged_batch_is_deterministic() {
        let mut a = vec![record("f", 0, "def f(): pass"), record("g", 4, "def g(): pass")];
        let mut b = a.clone();
        assign_ids(&mut a);
        assign_ids(&mut b);
        let ids_a: Vec<_> = a.iter().map(|r| r.id.clone()).collect();
        let ids_b: Vec<_> = b.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids_a, ids_b);
        assert_ne!(ids_a[0], ids_a[1]);
    }

    #[test]
    fn test_content_change_changes_id() {
        let mut before = vec![record("helper", 0, "def helper(): return 1")];
        let mut after = vec![record("helper", 0, "def helper(): return 2")];
        assign_ids(&mut before);
        assign_ids(&mut after);
        assert_ne!(before[0].id, after[0].id);
    }

    #[test]
    fn test_signature_and_parameters_affect_id() {
        let mut plain = vec![record("f", 0, "body")];
        let mut with_param = vec![record("f", 0, "body")];
        with_param[0].parameters = vec!["x".to_string()];
        assign_ids(&mut plain);
        assign_ids(&mut with_param);
        assert_ne!(plain[0].id, with_param[0].id);

        let mut retyped = vec![record("f", 0, "body")];
        retyped[0].return_type = Some("int".to_string());
        assign_ids(&mut retyped);
        assert_ne!(plain[0].id, retyped[0].id);
    }

    #[test]
    fn test_collision_gets_suffix() {
        // Two byte-identical records hash to the same base id
        let mut batch = vec![record("f", 0, "def f(): pass"), record("f", 0, "def f(): pass")];
        assign_ids(&mut batch);
        assert_ne!(batch[0].id, batch[1].id);
        assert!(batch[1].id.ends_with("-1"));
        assert!(batch[1].id.starts_with(&batch[0].id));
    }

    proptest! {
        #[test]
        fn prop_assignment_is_pure(name in "[a-z_][a-z0-9_]{0,12}", line in 0usize..5000, body in ".{0,200}") {
            let mut first = vec![record(&name, line, &body)];
            let mut second = vec![record(&name, line, &body)];
            assign_ids(&mut first);
            assign_ids(&mut second);
            prop_assert_eq!(&first[0].id, &second[0].id);
            prop_assert_eq!(first[0].id.len(), ID_LEN);
        }

        #[test]
        fn prop_ids_unique_within_batch(count in 1usize..20) {
            // Same symbol duplicated: worst case for collisions
            let mut batch: Vec<_> = (0..count).map(|_| record("dup", 7, "def dup(): pass")).collect();
            assign_ids(&mut batch);
            let unique: HashSet<_> = batch.iter().map(|r| r.id.clone()).collect();
            prop_assert_eq!(unique.len(), count);
        }
    }
}
