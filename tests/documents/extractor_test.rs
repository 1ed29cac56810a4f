//! Document directory scanning and extraction tests.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use parley::documents::{
    Corpus, DocumentExtractor, DocumentSource, ExtractedDocument, ExtractionError,
    PdfExtractor, PlainTextExtractor, TextExtractor, EMPTY_CORPUS_NOTICE,
};

use crate::pdf::write_pdf;

/// Treats `.pdf` files as `|`-separated page texts.
struct PagedStub;

impl TextExtractor for PagedStub {
    fn extensions(&self) -> &[&str] {
        &["pdf"]
    }

    fn extract(&self, reader: &mut dyn Read) -> Result<Vec<String>, ExtractionError> {
        let mut raw = String::new();
        reader.read_to_string(&mut raw)?;
        Ok(raw.split('|').map(str::to_owned).collect())
    }
}

fn write(dir: &Path, name: &str, contents: &[u8]) {
    std::fs::write(dir.join(name), contents).expect("should write fixture");
}

fn collect(corpus: Corpus) -> Vec<ExtractedDocument> {
    match corpus {
        Corpus::Documents(docs) => docs.collect(),
        Corpus::Empty => panic!("expected a non-empty corpus"),
    }
}

#[test]
fn missing_directory_is_empty_corpus() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let corpus = DocumentExtractor::with_defaults().scan(&tmp.path().join("nope"));
    assert!(matches!(corpus, Corpus::Empty));
    assert_eq!(corpus.notice(), Some(EMPTY_CORPUS_NOTICE));
}

#[test]
fn directory_without_supported_files_is_empty_corpus() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    write(tmp.path(), "image.png", b"\x89PNG");
    write(tmp.path(), "archive.zip", b"PK");
    std::fs::create_dir(tmp.path().join("nested.pdf")).expect("should create dir");

    let corpus = DocumentExtractor::with_defaults().scan(tmp.path());
    assert!(matches!(corpus, Corpus::Empty));
}

#[test]
fn documents_are_yielded_in_filename_order() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    write(tmp.path(), "c.txt", b"third");
    write(tmp.path(), "a.md", b"first");
    write(tmp.path(), "b.txt", b"second");
    write(tmp.path(), "skip.csv", b"x,y");

    let docs = collect(DocumentExtractor::with_defaults().scan(tmp.path()));
    let names: Vec<&str> = docs.iter().map(|d| d.filename.as_str()).collect();
    assert_eq!(names, vec!["a.md", "b.txt", "c.txt"]);
    assert_eq!(docs[0].text, "first\n");
}

#[test]
fn non_empty_pages_are_joined_with_newlines() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    write(tmp.path(), "plan.pdf", b"Page one||Page three");

    let mut registry = DocumentExtractor::new();
    registry.register(Arc::new(PagedStub));

    let docs = collect(registry.scan(tmp.path()));
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].text, "Page one\nPage three\n");
}

#[test]
fn pdf_pages_are_extracted_in_order() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let path = tmp.path().join("plan.pdf");
    write_pdf(&path, &["Hello page one", "Second page"]);

    let mut file = std::fs::File::open(&path).expect("should open fixture");
    let pages = PdfExtractor.extract(&mut file).expect("should extract");
    assert_eq!(pages, vec!["Hello page one", "Second page"]);
}

#[test]
fn real_pdf_pages_are_joined_with_single_newlines() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    write_pdf(&tmp.path().join("plan.pdf"), &["Hello page one", "Second page"]);

    let docs = collect(DocumentExtractor::with_defaults().scan(tmp.path()));
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].filename, "plan.pdf");
    assert_eq!(docs[0].text, "Hello page one\nSecond page\n");
}

#[test]
fn extension_match_is_case_insensitive() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    write(tmp.path(), "UPPER.PDF", b"shouting");

    let mut registry = DocumentExtractor::new();
    registry.register(Arc::new(PagedStub));

    assert!(registry.supports(&tmp.path().join("UPPER.PDF")));
    let docs = collect(registry.scan(tmp.path()));
    assert_eq!(docs[0].filename, "UPPER.PDF");
}

#[test]
fn corrupt_pdf_contributes_empty_text() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    write(tmp.path(), "broken.pdf", b"this is not a pdf at all");
    write(tmp.path(), "notes.txt", b"still here");

    let docs = collect(DocumentExtractor::with_defaults().scan(tmp.path()));
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].filename, "broken.pdf");
    assert!(docs[0].text.is_empty());
    assert_eq!(docs[1].text, "still here\n");
}

#[test]
fn invalid_utf8_text_file_contributes_empty_text() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    write(tmp.path(), "latin1.txt", &[0x66, 0x6f, 0xf6]);

    let docs = collect(DocumentExtractor::with_defaults().scan(tmp.path()));
    assert_eq!(docs.len(), 1);
    assert!(docs[0].text.is_empty());
}

#[test]
fn later_registration_replaces_extension() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    write(tmp.path(), "doc.pdf", b"raw|pages");

    let mut registry = DocumentExtractor::with_defaults();
    registry.register(Arc::new(PagedStub));

    let docs = collect(registry.scan(tmp.path()));
    assert_eq!(docs[0].text, "raw\npages\n");
}

#[test]
fn plain_text_extractor_returns_single_section() {
    let mut reader: &[u8] = b"line one\nline two";
    let pages = PlainTextExtractor
        .extract(&mut reader)
        .expect("should extract");
    assert_eq!(pages, vec!["line one\nline two".to_owned()]);
}

#[test]
fn extraction_is_lazy() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    write(tmp.path(), "a.txt", b"alpha");
    write(tmp.path(), "b.txt", b"beta");

    let corpus = DocumentExtractor::with_defaults().scan(tmp.path());
    // Removing a file after the scan surfaces as an empty document, not a
    // scan failure.
    std::fs::remove_file(tmp.path().join("b.txt")).expect("should remove");

    let docs = collect(corpus);
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].text, "alpha\n");
    assert!(docs[1].text.is_empty());
}
