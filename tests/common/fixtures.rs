//! Manifest and EPUB fixtures

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;

const CONTAINER_XML: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

/// `n` space-separated words
pub fn words(n: usize) -> String {
    (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
}

/// One manifest line in the catalog scraper's format
pub fn manifest_line(page_id: &str, epub: &str, txt: &str, num_words: Option<u64>) -> String {
    let mut record = serde_json::json!({
        "page": format!("https://www.smashwords.com/books/view/{page_id}"),
        "epub": epub,
        "txt": txt,
        "title": format!("Book {page_id}"),
        "author": "Test Author",
        "genres": ["Fiction\tGeneral"],
        "publish": "January 1, 2012",
    });
    if let Some(n) = num_words {
        record["num_words"] = serde_json::json!(n);
    }
    record.to_string()
}

/// Write `lines` as a manifest file inside `dir`
pub fn write_manifest(dir: &Path, lines: &[String]) -> PathBuf {
    let path = dir.join("url_list.jsonl");
    std::fs::write(&path, lines.join("\n") + "\n").expect("write manifest");
    path
}

/// A minimal EPUB 2 container with one XHTML document per chapter
pub fn epub_bytes(chapters: &[&str]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let stored = FileOptions::default().compression_method(zip::CompressionMethod::Stored);

    zip.start_file("mimetype", stored).expect("mimetype");
    zip.write_all(b"application/epub+zip").expect("mimetype");
    zip.start_file("META-INF/container.xml", stored).expect("container");
    zip.write_all(CONTAINER_XML.as_bytes()).expect("container");

    let manifest: String = (0..chapters.len())
        .map(|i| {
            format!(r#"<item id="ch{i}" href="ch{i}.xhtml" media-type="application/xhtml+xml"/>"#)
        })
        .collect();
    let spine: String = (0..chapters.len())
        .map(|i| format!(r#"<itemref idref="ch{i}"/>"#))
        .collect();
    let opf = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="bookid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="bookid">fixture</dc:identifier>
    <dc:title>Fixture</dc:title>
    <dc:language>en</dc:language>
  </metadata>
  <manifest>{manifest}</manifest>
  <spine>{spine}</spine>
</package>"#
    );
    zip.start_file("OEBPS/content.opf", stored).expect("opf");
    zip.write_all(opf.as_bytes()).expect("opf");

    for (i, body) in chapters.iter().enumerate() {
        let xhtml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"><head></head><body><p>{body}</p></body></html>"#
        );
        zip.start_file(format!("OEBPS/ch{i}.xhtml"), stored).expect("chapter");
        zip.write_all(xhtml.as_bytes()).expect("chapter");
    }

    zip.finish().expect("finish epub").into_inner()
}
