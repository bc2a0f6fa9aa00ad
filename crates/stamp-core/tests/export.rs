//! End-to-end export tests against in-memory PDFs

mod common;

use common::{create_test_pdf, letter_images, page_operators, page_resources, signature_data_uri};
use lopdf::{Document, Object};
use pretty_assertions::assert_eq;
use stamp_core::stamp::{Point, Size};
use stamp_core::{
    export_pdf, CheckmarkVariant, ExportOptions, Stamp, StampCollection, StampError, StampKind,
};

fn stamp(kind: StampKind, content: &str, page_index: usize) -> Stamp {
    Stamp::create(
        kind,
        Point::new(100.0, 50.0),
        page_index,
        content,
        Size::new(150.0, 50.0),
    )
}

#[test]
fn test_zero_stamps_returns_original_bytes() {
    let pdf = create_test_pdf(2);
    let output = export_pdf(
        &pdf,
        &StampCollection::new(),
        &letter_images(2),
        &ExportOptions::default(),
    )
    .unwrap();

    assert_eq!(output.bytes, pdf);
    assert_eq!(output.metrics.page_count, 2);
    assert_eq!(output.metrics.stamps_drawn, 0);
}

#[test]
fn test_invalid_pdf_fails_even_without_stamps() {
    let result = export_pdf(
        b"%PDF-1.7 broken",
        &StampCollection::new(),
        &[],
        &ExportOptions::default(),
    );
    assert!(matches!(result, Err(StampError::ParseError(_))));
}

#[test]
fn test_out_of_range_stamp_is_skipped() {
    let pdf = create_test_pdf(1);
    let stamps: StampCollection = vec![
        stamp(StampKind::Text, "kept", 0),
        stamp(StampKind::Text, "orphan", 5),
    ]
    .into_iter()
    .collect();

    let output = export_pdf(&pdf, &stamps, &letter_images(1), &ExportOptions::default()).unwrap();
    assert_eq!(output.metrics.stamps_drawn, 1);
    assert_eq!(output.metrics.stamps_skipped, 1);
    assert!(Document::load_mem(&output.bytes).is_ok());
}

#[test]
fn test_signature_is_embedded_as_image() {
    let pdf = create_test_pdf(1);
    let signature = stamp(StampKind::Signature, &signature_data_uri(4, 2), 0);
    let stamps = StampCollection::new().with_added(signature);

    let output = export_pdf(&pdf, &stamps, &letter_images(1), &ExportOptions::default()).unwrap();
    let operators = page_operators(&output.bytes, 1);
    assert!(operators.contains(&"Do".to_string()));
    assert!(operators.contains(&"cm".to_string()));

    let doc = Document::load_mem(&output.bytes).unwrap();
    let resources = page_resources(&doc, 1);
    let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
    let image_id = xobjects.get(b"StmpImg1").unwrap().as_reference().unwrap();
    let image = doc.get_object(image_id).unwrap().as_stream().unwrap();

    assert_eq!(image.dict.get(b"Width").unwrap().as_i64().unwrap(), 4);
    assert_eq!(image.dict.get(b"Height").unwrap().as_i64().unwrap(), 2);
    assert!(image.dict.get(b"SMask").is_ok());
}

#[test]
fn test_bad_signature_aborts_export() {
    let pdf = create_test_pdf(1);
    let stamps: StampCollection = vec![
        stamp(StampKind::Text, "fine", 0),
        stamp(StampKind::Signature, "data:image/png;base64,bm90IGEgcG5n", 0),
    ]
    .into_iter()
    .collect();

    let result = export_pdf(&pdf, &stamps, &letter_images(1), &ExportOptions::default());
    assert!(matches!(result, Err(StampError::ImageDecode(_))));
}

#[test]
fn test_first_failing_stamp_in_collection_order_aborts() {
    let pdf = create_test_pdf(2);
    // The later page comes first in the collection
    let stamps: StampCollection = vec![
        stamp(StampKind::Signature, "data:image/png;base64,bm90IGEgcG5n", 1),
        stamp(StampKind::Signature, "not a data uri", 0),
    ]
    .into_iter()
    .collect();

    let result = export_pdf(&pdf, &stamps, &letter_images(2), &ExportOptions::default());
    assert!(matches!(result, Err(StampError::ImageDecode(_))));
}

#[test]
fn test_checkmark_variants() {
    let pdf = create_test_pdf(1);

    let square = StampCollection::new().with_added(stamp(
        StampKind::Checkmark,
        CheckmarkVariant::Square.glyph(),
        0,
    ));
    let output = export_pdf(&pdf, &square, &letter_images(1), &ExportOptions::default()).unwrap();
    let operators = page_operators(&output.bytes, 1);
    assert_eq!(operators.iter().filter(|op| *op == "re").count(), 1);
    assert_eq!(operators.iter().filter(|op| *op == "f").count(), 1);

    let check = StampCollection::new().with_added(stamp(
        StampKind::Checkmark,
        CheckmarkVariant::Check.glyph(),
        0,
    ));
    let output = export_pdf(&pdf, &check, &letter_images(1), &ExportOptions::default()).unwrap();
    let operators = page_operators(&output.bytes, 1);
    assert_eq!(operators.iter().filter(|op| *op == "S").count(), 2);
}

#[test]
fn test_text_and_date_use_one_shared_font() {
    let pdf = create_test_pdf(2);
    let stamps: StampCollection = vec![
        stamp(StampKind::Text, "Jane Doe", 0),
        stamp(StampKind::Date, "01/02/2025", 0),
        stamp(StampKind::Text, "Page two", 1),
    ]
    .into_iter()
    .collect();

    let output = export_pdf(&pdf, &stamps, &letter_images(2), &ExportOptions::default()).unwrap();
    assert_eq!(output.metrics.stamps_drawn, 3);

    let doc = Document::load_mem(&output.bytes).unwrap();
    let font_ids: Vec<_> = [1, 2]
        .into_iter()
        .map(|page_number| {
            let resources = page_resources(&doc, page_number);
            let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
            // Body font is kept alongside the stamp font
            assert!(fonts.get(b"F1").is_ok());
            fonts.get(b"StmpHelv1").unwrap().as_reference().unwrap()
        })
        .collect();
    assert_eq!(font_ids[0], font_ids[1]);

    let font = doc.get_object(font_ids[0]).unwrap().as_dict().unwrap();
    assert_eq!(
        font.get(b"BaseFont").unwrap(),
        &Object::Name(b"Helvetica".to_vec())
    );
}

#[test]
fn test_reexport_avoids_resource_name_clash() {
    let pdf = create_test_pdf(1);
    let stamps = StampCollection::new().with_added(stamp(StampKind::Text, "first", 0));
    let once = export_pdf(&pdf, &stamps, &letter_images(1), &ExportOptions::default()).unwrap();

    let again = StampCollection::new().with_added(stamp(StampKind::Text, "second", 0));
    let twice = export_pdf(&once.bytes, &again, &letter_images(1), &ExportOptions::default())
        .unwrap();

    let doc = Document::load_mem(&twice.bytes).unwrap();
    let resources = page_resources(&doc, 1);
    let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
    assert!(fonts.get(b"StmpHelv1").is_ok());
    assert!(fonts.get(b"StmpHelv2").is_ok());
}
