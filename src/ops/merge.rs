//! Merge several PDFs into one, preserving page objects.
//!
//! Works at the object level: every input is renumbered into a shared id
//! space, page objects are re-parented under a single Pages tree, and one
//! catalog survives. Text is never extracted or re-rendered, so fonts,
//! images, and annotations ride along untouched.

use super::{MutationReport, OperationKind, WritePolicy, WrittenFile};
use crate::error::PdfOpsError;
use crate::guard::IntegrityGuard;
use crate::input::{self, SourceDocument};
use lopdf::{Document, Object, ObjectId};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

/// Consumed by [`merge`].
#[derive(Debug, Clone)]
pub struct MergeRequest {
    /// At least two inputs, concatenated in the given order.
    pub inputs: Vec<PathBuf>,
    pub target: PathBuf,
    pub policy: WritePolicy,
}

/// Concatenate `request.inputs` into `request.target`.
///
/// Any input that cannot be opened aborts the whole merge before anything is
/// written; there is no "merge what you can" mode.
pub async fn merge(
    request: MergeRequest,
    guard: &IntegrityGuard,
) -> Result<MutationReport, PdfOpsError> {
    // Step 1: validate the input set.
    if request.inputs.len() < 2 {
        return Err(PdfOpsError::TooFewMergeInputs {
            got: request.inputs.len(),
        });
    }
    let mut sources = Vec::with_capacity(request.inputs.len());
    for path in &request.inputs {
        sources.push(input::resolve_document(path).await?);
    }

    // Step 2: assemble the merged document in memory.
    let source_paths: Vec<PathBuf> = sources.iter().map(|s| s.path.clone()).collect();
    let (bytes, page_total) = tokio::task::spawn_blocking(move || merge_documents(&sources))
        .await
        .map_err(|e| PdfOpsError::Internal(format!("merge task panicked: {e}")))??;

    // Step 3: one guarded write for the single output.
    let record = guard
        .guarded_write(
            &request.target,
            &bytes,
            request.policy.overwrite,
            request.policy.force,
        )
        .await?;

    info!(
        inputs = source_paths.len(),
        pages = page_total,
        target = %record.path.display(),
        "merge complete"
    );
    Ok(MutationReport {
        operation: OperationKind::Merge,
        sources: source_paths,
        written: vec![WrittenFile {
            path: record.path,
            bytes: bytes.len(),
            hash: record.hash,
            backup: record.backup,
            pages: page_total,
        }],
    })
}

/// True when `object` is a dictionary whose `Type` entry names `type_name`.
fn has_type(object: &Object, type_name: &[u8]) -> bool {
    object
        .as_dict()
        .ok()
        .and_then(|dict| dict.get(b"Type").ok())
        .and_then(|value| value.as_name().ok())
        .is_some_and(|name| name == type_name)
}

fn merge_documents(sources: &[SourceDocument]) -> Result<(Vec<u8>, u32), PdfOpsError> {
    let mut max_id = 1;
    let mut documents_pages: BTreeMap<ObjectId, Object> = BTreeMap::new();
    let mut documents_objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for source in sources {
        let mut doc =
            Document::load_mem(&source.bytes).map_err(|e| PdfOpsError::DocumentUnreadable {
                path: source.path.clone(),
                tried: 1,
                detail: format!("cannot merge unreadable input: {e}"),
            })?;

        // Shift this document's ids past everything collected so far; page
        // order then follows input order because ids stay ascending.
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        for (_, object_id) in doc.get_pages() {
            if let Ok(object) = doc.get_object(object_id) {
                documents_pages.insert(object_id, object.clone());
            }
        }
        documents_objects.extend(doc.objects);
    }

    let mut document = Document::with_version("1.5");
    let mut catalog_object: Option<(ObjectId, Object)> = None;
    let mut pages_object: Option<(ObjectId, Object)> = None;

    for (object_id, object) in documents_objects {
        if has_type(&object, b"Catalog") {
            // First catalog wins; later ones are redundant roots.
            catalog_object.get_or_insert((object_id, object));
        } else if has_type(&object, b"Pages") {
            if let Ok(dict) = object.as_dict() {
                let mut dict = dict.clone();
                if let Some((_, ref existing)) = pages_object {
                    if let Ok(existing_dict) = existing.as_dict() {
                        dict.extend(existing_dict);
                    }
                }
                let id = pages_object.as_ref().map(|(id, _)| *id).unwrap_or(object_id);
                pages_object = Some((id, Object::Dictionary(dict)));
            }
        } else if has_type(&object, b"Page") {
            // Collected via documents_pages; re-parented below.
        } else if has_type(&object, b"Outlines") || has_type(&object, b"Outline") {
            // Bookmark trees reference pre-renumber ids; dropped.
        } else {
            document.objects.insert(object_id, object);
        }
    }

    let (pages_id, pages_root) = pages_object.ok_or_else(|| PdfOpsError::MutationFailed {
        path: sources[0].path.clone(),
        detail: "no Pages tree found in any input".to_string(),
    })?;
    let (catalog_id, catalog_root) = catalog_object.ok_or_else(|| PdfOpsError::MutationFailed {
        path: sources[0].path.clone(),
        detail: "no document catalog found in any input".to_string(),
    })?;

    for (object_id, object) in &documents_pages {
        if let Ok(dict) = object.as_dict() {
            let mut dict = dict.clone();
            dict.set("Parent", pages_id);
            document
                .objects
                .insert(*object_id, Object::Dictionary(dict));
        }
    }

    if let Ok(dict) = pages_root.as_dict() {
        let mut dict = dict.clone();
        dict.set("Count", documents_pages.len() as u32);
        let kids: Vec<Object> = documents_pages
            .keys()
            .map(|id| Object::Reference(*id))
            .collect();
        dict.set("Kids", kids);
        document.objects.insert(pages_id, Object::Dictionary(dict));
    }

    if let Ok(dict) = catalog_root.as_dict() {
        let mut dict = dict.clone();
        dict.set("Pages", pages_id);
        dict.remove(b"Outlines");
        document
            .objects
            .insert(catalog_id, Object::Dictionary(dict));
    }

    document.trailer.set("Root", catalog_id);
    document.max_id = document.objects.len() as u32;
    document.renumber_objects();
    document.compress();

    let mut buf = Vec::new();
    document
        .save_to(&mut buf)
        .map_err(|e| PdfOpsError::MutationFailed {
            path: sources[0].path.clone(),
            detail: format!("serialising merged document: {e}"),
        })?;
    Ok((buf, documents_pages.len() as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fixtures::pdf_with_pages;

    async fn write_fixture(dir: &tempfile::TempDir, name: &str, pages: &[&str]) -> PathBuf {
        let path = dir.path().join(name);
        tokio::fs::write(&path, pdf_with_pages(pages)).await.unwrap();
        path
    }

    #[tokio::test]
    async fn merges_inputs_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_fixture(&dir, "a.pdf", &["alpha one", "alpha two"]).await;
        let second = write_fixture(&dir, "b.pdf", &["beta one"]).await;
        let target = dir.path().join("merged.pdf");
        let guard = IntegrityGuard::new();

        let report = merge(
            MergeRequest {
                inputs: vec![first, second],
                target: target.clone(),
                policy: WritePolicy::default(),
            },
            &guard,
        )
        .await
        .unwrap();

        assert_eq!(report.written[0].pages, 3);
        let merged = lopdf::Document::load(&target).unwrap();
        assert_eq!(merged.get_pages().len(), 3);
        assert!(merged.extract_text(&[1]).unwrap().contains("alpha one"));
        assert!(merged.extract_text(&[3]).unwrap().contains("beta one"));
    }

    #[tokio::test]
    async fn one_input_is_too_few() {
        let dir = tempfile::tempdir().unwrap();
        let only = write_fixture(&dir, "only.pdf", &["lonely page"]).await;
        let err = merge(
            MergeRequest {
                inputs: vec![only],
                target: dir.path().join("out.pdf"),
                policy: WritePolicy::default(),
            },
            &IntegrityGuard::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PdfOpsError::TooFewMergeInputs { got: 1 }));
    }

    #[tokio::test]
    async fn unreadable_input_aborts_the_whole_merge() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_fixture(&dir, "good.pdf", &["fine"]).await;
        let broken = dir.path().join("broken.pdf");
        tokio::fs::write(&broken, b"%PDF-1.5 then nothing useful")
            .await
            .unwrap();
        let target = dir.path().join("merged.pdf");

        let err = merge(
            MergeRequest {
                inputs: vec![good, broken],
                target: target.clone(),
                policy: WritePolicy::default(),
            },
            &IntegrityGuard::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PdfOpsError::DocumentUnreadable { .. }));
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn existing_destination_is_refused_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_fixture(&dir, "a.pdf", &["one"]).await;
        let second = write_fixture(&dir, "b.pdf", &["two"]).await;
        let target = dir.path().join("merged.pdf");
        tokio::fs::write(&target, b"precious existing file").await.unwrap();

        let err = merge(
            MergeRequest {
                inputs: vec![first, second],
                target: target.clone(),
                policy: WritePolicy::default(),
            },
            &IntegrityGuard::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PdfOpsError::DestinationExists { .. }));
        assert_eq!(
            tokio::fs::read(&target).await.unwrap(),
            b"precious existing file"
        );
    }
}
