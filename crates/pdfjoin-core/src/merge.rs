//! PDF Merge algorithm
//!
//! Appends the pages of several documents into a fresh page tree.

use crate::error::PdfJoinError;
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guards against cyclic Parent chains
const MAX_TREE_DEPTH: usize = 64;

/// Merge documents in order into one.
///
/// The algorithm:
/// 1. Create an empty destination with its own catalog and page tree
/// 2. For each source document:
///    a. Copy inherited attributes onto each page, since the source page
///       tree is left behind
///    b. Import all objects with IDs shifted past the destination's
///    c. Re-parent the pages under the destination page tree
/// 3. Prune what no page references
///
/// Documents without pages contribute nothing.
pub fn merge_documents(documents: Vec<Document>) -> Result<Document, PdfJoinError> {
    let mut dest = Document::with_version("1.7");
    let pages_id = dest.new_object_id();
    let mut dest_page_refs: Vec<ObjectId> = Vec::new();

    for mut source in documents {
        let source_pages: Vec<ObjectId> = source.get_pages().values().copied().collect();
        if source_pages.is_empty() {
            continue;
        }
        for &page_id in &source_pages {
            inherit_page_attributes(&mut source, page_id);
        }

        let id_offset = dest.max_id;
        for (old_id, object) in source.objects.into_iter() {
            let new_id = (old_id.0 + id_offset, old_id.1);
            dest.objects.insert(new_id, remap_object_refs(object, id_offset));
        }

        for old_page_ref in source_pages {
            let new_page_ref = (old_page_ref.0 + id_offset, old_page_ref.1);
            if let Ok(page) = dest.get_dictionary_mut(new_page_ref) {
                page.set("Parent", Object::Reference(pages_id));
            }
            dest_page_refs.push(new_page_ref);
        }

        dest.max_id = source.max_id + id_offset;
    }

    let pages = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(dest_page_refs.len() as i64)),
        (
            "Kids",
            Object::Array(dest_page_refs.iter().map(|id| Object::Reference(*id)).collect()),
        ),
    ]);
    dest.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = dest.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    dest.trailer.set("Root", Object::Reference(catalog_id));

    // Old catalogs and page trees are now unreachable
    dest.prune_objects();
    dest.compress();

    debug!(pages = dest_page_refs.len(), "Merged documents");
    Ok(dest)
}

/// Serialize a merged document
pub fn merge_to_bytes(documents: Vec<Document>) -> Result<Vec<u8>, PdfJoinError> {
    let mut merged = merge_documents(documents)?;
    let mut buffer = Vec::new();
    merged
        .save_to(&mut buffer)
        .map_err(|e| PdfJoinError::OperationError(format!("Failed to save merged PDF: {}", e)))?;
    Ok(buffer)
}

fn inherit_page_attributes(doc: &mut Document, page_id: ObjectId) {
    let mut inherited: Vec<(&[u8], Object)> = Vec::new();

    if let Ok(page) = doc.get_dictionary(page_id) {
        for key in INHERITABLE {
            if page.has(key) {
                continue;
            }
            let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
            for _ in 0..MAX_TREE_DEPTH {
                let Some(node) = parent.and_then(|id| doc.get_dictionary(id).ok()) else {
                    break;
                };
                if let Ok(value) = node.get(key) {
                    inherited.push((key, value.clone()));
                    break;
                }
                parent = node.get(b"Parent").and_then(Object::as_reference).ok();
            }
        }
    }

    if let Ok(page) = doc.get_dictionary_mut(page_id) {
        for (key, value) in inherited {
            page.set(key, value);
        }
    }
}

/// Recursively shift object references by `offset`
fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            remap_dictionary(&mut dict, offset);
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            remap_dictionary(&mut stream.dict, offset);
            Object::Stream(stream)
        }
        other => other,
    }
}

fn remap_dictionary(dict: &mut Dictionary, offset: u32) {
    for (_, value) in dict.iter_mut() {
        let original = std::mem::replace(value, Object::Null);
        *value = remap_object_refs(original, offset);
    }
}
