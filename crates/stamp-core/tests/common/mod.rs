//! Shared fixtures for integration tests

#![allow(dead_code)]

use base64::{engine::general_purpose::STANDARD, Engine};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use stamp_core::PageImage;

/// A PDF with `num_pages` US Letter pages, each with a line of body text
pub fn create_test_pdf(num_pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for i in 0..num_pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
                Operation::new("Td", vec![Object::Integer(72), Object::Integer(720)]),
                Operation::new(
                    "Tj",
                    vec![Object::String(
                        format!("Page {}", i + 1).into_bytes(),
                        lopdf::StringFormat::Literal,
                    )],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => num_pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Page images for `num_pages` Letter pages rendered at 1.5x
pub fn letter_images(num_pages: usize) -> Vec<PageImage> {
    (0..num_pages)
        .map(|i| PageImage {
            source: format!("page-{}", i + 1),
            width: 918,
            height: 1188,
        })
        .collect()
}

/// Half-transparent black RGBA PNG as a data URI
pub fn signature_data_uri(width: u32, height: u32) -> String {
    let pixels: Vec<u8> = (0..width * height)
        .flat_map(|i| [0, 0, 0, if i % 2 == 0 { 255 } else { 0 }])
        .collect();

    let mut png_bytes = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut png_bytes, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(&pixels).unwrap();
    }

    format!("data:image/png;base64,{}", STANDARD.encode(png_bytes))
}

/// Operators of a page's content streams, in drawing order
pub fn page_operators(pdf: &[u8], page_number: u32) -> Vec<String> {
    let doc = Document::load_mem(pdf).unwrap();
    let page_id = doc.get_pages()[&page_number];
    let content = doc.get_page_content(page_id).unwrap();
    Content::decode(&content)
        .unwrap()
        .operations
        .into_iter()
        .map(|op| op.operator)
        .collect()
}

/// Inline resource dictionary of a page, as written by the export engine
pub fn page_resources(doc: &Document, page_number: u32) -> Dictionary {
    let page_id = doc.get_pages()[&page_number];
    doc.get_object(page_id)
        .unwrap()
        .as_dict()
        .unwrap()
        .get(b"Resources")
        .unwrap()
        .as_dict()
        .unwrap()
        .clone()
}
