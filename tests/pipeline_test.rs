//! End-to-end conversion of single documents through the pipeline.

mod common;

use std::fs::File;
use std::io::Read;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::Event;
use tempfile::TempDir;
use zip::{CompressionMethod, ZipArchive};

use common::{FakeRasterizer, scratch_dirs, write_corrupt, write_doc};
use pdfxl::{ConversionJob, Dpi, ErrorKind, JobOptions, Reporter, StatusMessage, convert};

fn options(dpi: u32) -> JobOptions {
    JobOptions {
        dpi: Dpi::new(dpi).unwrap(),
        ..Default::default()
    }
}

fn open_archive(path: &Path) -> ZipArchive<File> {
    ZipArchive::new(File::open(path).unwrap()).unwrap()
}

fn read_text(archive: &mut ZipArchive<File>, name: &str) -> String {
    let mut text = String::new();
    archive
        .by_name(name)
        .unwrap()
        .read_to_string(&mut text)
        .unwrap();
    text
}

fn read_bytes(archive: &mut ZipArchive<File>, name: &str) -> Vec<u8> {
    let mut bytes = Vec::new();
    archive.by_name(name).unwrap().read_to_end(&mut bytes).unwrap();
    bytes
}

/// Values of `attr` on every `tag` element, in document order.
fn attribute_values(xml: &str, tag: &str, attr: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    let mut values = Vec::new();
    loop {
        match reader.read_event().unwrap() {
            Event::Empty(e) | Event::Start(e) if e.name().as_ref() == tag.as_bytes() => {
                if let Some(a) = e.try_get_attribute(attr).unwrap() {
                    values.push(String::from_utf8_lossy(&a.value).into_owned());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    values
}

fn assert_well_formed(name: &str, xml: &str) {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => panic!("{name} is not well-formed: {e}"),
        }
    }
}

fn run(job: &ConversionJob) -> (pdfxl::Result<std::path::PathBuf>, Vec<StatusMessage>) {
    let (reporter, receiver) = Reporter::channel();
    let result = convert(job, &FakeRasterizer, &reporter);
    (result, receiver.drain().collect())
}

#[test]
fn test_three_page_document() {
    let dir = TempDir::new().unwrap();
    let input = write_doc(dir.path(), "field_notes.pdf", &[(612.0, 792.0); 3]);
    let job = ConversionJob::new(&input, &options(150)).unwrap();

    let (result, messages) = run(&job);
    let output = result.unwrap();
    assert_eq!(output, dir.path().join("field_notes.epub"));

    let mut archive = open_archive(&output);
    {
        let first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), CompressionMethod::Stored);
    }
    assert_eq!(read_text(&mut archive, "mimetype"), "application/epub+zip");

    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "META-INF/container.xml",
            "OEBPS/content.opf",
            "OEBPS/css/styles.css",
            "OEBPS/images/page-1.png",
            "OEBPS/images/page-2.png",
            "OEBPS/images/page-3.png",
            "OEBPS/nav.xhtml",
            "OEBPS/xhtml/page1.xhtml",
            "OEBPS/xhtml/page2.xhtml",
            "OEBPS/xhtml/page3.xhtml",
            "mimetype",
        ]
    );

    let opf = read_text(&mut archive, "OEBPS/content.opf");
    assert!(opf.contains("<dc:title>field notes</dc:title>"));
    assert_eq!(
        attribute_values(&opf, "item", "id"),
        vec!["nav", "css", "page1", "img1", "page2", "img2", "page3", "img3"]
    );
    assert_eq!(
        attribute_values(&opf, "itemref", "idref"),
        vec!["page1", "page2", "page3"]
    );

    let nav = read_text(&mut archive, "OEBPS/nav.xhtml");
    assert_eq!(
        attribute_values(&nav, "a", "href"),
        vec![
            "xhtml/page1.xhtml",
            "xhtml/page2.xhtml",
            "xhtml/page3.xhtml",
            "xhtml/page1.xhtml",
            "xhtml/page2.xhtml",
            "xhtml/page3.xhtml",
        ]
    );

    assert!(matches!(
        messages.last(),
        Some(StatusMessage::JobSucceeded { output: o }) if *o == output
    ));
    assert!(messages.contains(&StatusMessage::Progress(
        "Processing field_notes.pdf: 3 pages...".to_string()
    )));
    assert!(scratch_dirs(dir.path()).is_empty());
}

#[test]
fn test_documents_are_well_formed() {
    let dir = TempDir::new().unwrap();
    let input = write_doc(dir.path(), "Tom_&_Jerry.pdf", &[(300.0, 400.0), (400.0, 300.0)]);
    let job = ConversionJob::new(&input, &options(72)).unwrap();
    let output = run(&job).0.unwrap();

    let mut archive = open_archive(&output);
    for name in [
        "META-INF/container.xml",
        "OEBPS/content.opf",
        "OEBPS/nav.xhtml",
        "OEBPS/xhtml/page1.xhtml",
        "OEBPS/xhtml/page2.xhtml",
    ] {
        let xml = read_text(&mut archive, name);
        assert_well_formed(name, &xml);
    }
    let opf = read_text(&mut archive, "OEBPS/content.opf");
    assert!(opf.contains("<dc:title>Tom &amp; Jerry</dc:title>"));
}

#[test]
fn test_resolution_scales_images_not_viewport() {
    let dir = TempDir::new().unwrap();
    let input = write_doc(dir.path(), "scan.pdf", &[(612.0, 792.0)]);

    let mut pages = Vec::new();
    let mut images = Vec::new();
    for dpi in [72, 144] {
        let out_dir = dir.path().join(format!("dpi{dpi}"));
        std::fs::create_dir(&out_dir).unwrap();
        let job = ConversionJob::new(
            &input,
            &JobOptions {
                output_dir: Some(out_dir),
                ..options(dpi)
            },
        )
        .unwrap();
        let output = run(&job).0.unwrap();

        let mut archive = open_archive(&output);
        pages.push(read_text(&mut archive, "OEBPS/xhtml/page1.xhtml"));
        let png = read_bytes(&mut archive, "OEBPS/images/page-1.png");
        images.push(image::load_from_memory(&png).unwrap().to_rgb8().dimensions());
    }

    assert_eq!(images, vec![(612, 792), (1224, 1584)]);
    assert_eq!(pages[0], pages[1]);
    assert!(pages[0].contains(r#"content="width=612, height=792""#));
    assert!(pages[0].contains(r#"viewBox="0 0 612 792""#));
    assert!(pages[0].contains(r#"xlink:href="../images/page-1.png""#));
}

#[test]
fn test_fractional_page_size_is_truncated() {
    let dir = TempDir::new().unwrap();
    let input = write_doc(dir.path(), "odd.pdf", &[(595.3, 841.9)]);
    let job = ConversionJob::new(&input, &options(72)).unwrap();
    let output = run(&job).0.unwrap();

    let page = read_text(&mut open_archive(&output), "OEBPS/xhtml/page1.xhtml");
    assert!(page.contains(r#"content="width=595, height=841""#));
}

#[test]
fn test_empty_document() {
    let dir = TempDir::new().unwrap();
    let input = write_doc(dir.path(), "blank.pdf", &[]);
    let job = ConversionJob::new(&input, &options(150)).unwrap();

    let (result, messages) = run(&job);
    assert_eq!(result.unwrap_err().kind(), ErrorKind::EmptyDocument);
    assert!(!job.output().exists());
    assert!(scratch_dirs(dir.path()).is_empty());
    assert!(matches!(
        messages.last(),
        Some(StatusMessage::JobFailed { kind: ErrorKind::EmptyDocument, .. })
    ));
}

#[test]
fn test_corrupt_document() {
    let dir = TempDir::new().unwrap();
    let input = write_corrupt(dir.path(), "broken.pdf");
    let job = ConversionJob::new(&input, &options(150)).unwrap();

    let (result, messages) = run(&job);
    assert_eq!(result.unwrap_err().kind(), ErrorKind::OpenFailure);
    assert!(!job.output().exists());
    assert!(scratch_dirs(dir.path()).is_empty());

    let Some(StatusMessage::JobFailed { message, trace, .. }) = messages.last() else {
        panic!("expected a failure sentinel, got {:?}", messages.last());
    };
    assert!(message.contains("missing header"));
    assert!(trace.contains("broken.pdf"));
    assert!(messages.iter().any(|m| matches!(
        m,
        StatusMessage::Progress(t) if t == "ERROR converting broken.pdf:"
    )));
}

#[test]
fn test_render_failure_leaves_no_archive() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("half.pdf");
    std::fs::write(&input, "%FAKEPDF\n100 100\nfail\n100 100\n").unwrap();
    let job = ConversionJob::new(&input, &options(72)).unwrap();

    let (result, messages) = run(&job);
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RenderFailure);
    assert!(err.to_string().contains("page 2"));
    assert!(!job.output().exists());
    assert!(scratch_dirs(dir.path()).is_empty());
    assert_eq!(messages.iter().filter(|m| m.is_sentinel()).count(), 1);
}

#[test]
fn test_rerun_replaces_archive_with_new_identifier() {
    let dir = TempDir::new().unwrap();
    let input = write_doc(dir.path(), "again.pdf", &[(200.0, 200.0); 2]);
    let job = ConversionJob::new(&input, &options(72)).unwrap();

    let first = run(&job).0.unwrap();
    let first_opf = read_text(&mut open_archive(&first), "OEBPS/content.opf");
    let second = run(&job).0.unwrap();
    let second_opf = read_text(&mut open_archive(&second), "OEBPS/content.opf");

    assert_eq!(first, second);
    let first_id = attribute_values(&first_opf, "item", "id");
    assert_eq!(first_id, attribute_values(&second_opf, "item", "id"));

    let identifier = |opf: &str| {
        let start = opf.find("urn:uuid:").unwrap();
        opf[start..start + "urn:uuid:".len() + 36].to_string()
    };
    assert_ne!(identifier(&first_opf), identifier(&second_opf));
}

#[test]
fn test_failed_rerun_keeps_previous_archive() {
    let dir = TempDir::new().unwrap();
    let input = write_doc(dir.path(), "keep.pdf", &[(100.0, 100.0)]);
    let job = ConversionJob::new(&input, &options(72)).unwrap();
    let output = run(&job).0.unwrap();
    let before = std::fs::read(&output).unwrap();

    std::fs::write(&input, "not a document").unwrap();
    assert!(run(&job).0.is_err());
    assert_eq!(std::fs::read(&output).unwrap(), before);
}

/// Replaces the scratch root next to the input with a regular file, then
/// reports an empty document.
struct ScratchSaboteur;

impl pdfxl::Rasterizer for ScratchSaboteur {
    fn rasterize(
        &self,
        path: &Path,
        _scale: f32,
        sink: &mut dyn pdfxl::render::PageSink,
    ) -> pdfxl::Result<()> {
        let parent = path.parent().unwrap();
        for name in scratch_dirs(parent) {
            let root = parent.join(name);
            std::fs::remove_dir_all(&root).unwrap();
            std::fs::write(&root, b"in the way").unwrap();
        }
        sink.begin(0)
    }
}

#[test]
fn test_cleanup_failure_is_reported_not_escalated() {
    let dir = TempDir::new().unwrap();
    let input = write_doc(dir.path(), "stuck.pdf", &[]);
    let job = ConversionJob::new(&input, &options(72)).unwrap();

    let (reporter, receiver) = Reporter::channel();
    let err = convert(&job, &ScratchSaboteur, &reporter).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyDocument);

    let messages: Vec<StatusMessage> = receiver.drain().collect();
    let warning = messages
        .iter()
        .position(|m| {
            matches!(m, StatusMessage::Progress(t) if t.starts_with("warning: CleanupFailure:"))
        })
        .expect("cleanup failure must be reported");
    assert_eq!(messages.iter().filter(|m| m.is_sentinel()).count(), 1);
    assert_eq!(warning + 1, messages.len() - 1);
    assert!(matches!(
        messages.last(),
        Some(StatusMessage::JobFailed { kind: ErrorKind::EmptyDocument, .. })
    ));
    assert!(!job.output().exists());
}
