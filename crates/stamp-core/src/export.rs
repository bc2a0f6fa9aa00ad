//! Export engine: burn stamps into page content

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::coords::{detect_scale_drift, raster_to_pdf, ImageSize};
use crate::draw::{plan_stamp, FontCache, PageCanvas};
use crate::error::StampError;
use crate::page_info::{inherited_attribute, page_object_ids, resolve, PageGeometry};
use crate::raster::{PageImage, DEFAULT_RENDER_SCALE};
use crate::stamp::StampCollection;

/// What to do when a page image does not look like a uniform rendering of
/// its page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftPolicy {
    /// Transform as-is without checking
    Ignore,
    /// Log and transform as-is
    #[default]
    Warn,
    /// Fail the export with [`StampError::ScaleMismatch`]
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportOptions {
    /// Render scale the page images were produced at, if known
    pub render_scale: Option<f64>,
    pub drift_policy: DriftPolicy,
    /// Relative tolerance for drift detection
    pub drift_tolerance: f64,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            render_scale: Some(DEFAULT_RENDER_SCALE),
            drift_policy: DriftPolicy::default(),
            drift_tolerance: 0.01,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportMetrics {
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    pub page_count: usize,
    pub stamps_drawn: usize,
    pub stamps_skipped: usize,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ExportOutput {
    pub bytes: Vec<u8>,
    pub metrics: ExportMetrics,
}

/// Produce a new PDF with every stamp drawn into its page.
///
/// `page_images[i]` is the rendering of page `i` the stamps were placed on.
/// Stamps whose page or page image does not exist are skipped. Any other
/// failure aborts the export and no bytes are produced.
#[instrument(skip_all, fields(input_size = pdf_bytes.len(), stamps = stamps.len()))]
pub fn export_pdf(
    pdf_bytes: &[u8],
    stamps: &StampCollection,
    page_images: &[PageImage],
    options: &ExportOptions,
) -> Result<ExportOutput, StampError> {
    let started = Instant::now();

    let mut doc =
        Document::load_mem(pdf_bytes).map_err(|e| StampError::ParseError(e.to_string()))?;
    let page_ids = page_object_ids(&doc);
    let page_count = page_ids.len();

    if stamps.is_empty() {
        info!(page_count, "No stamps to export, returning original document");
        return Ok(ExportOutput {
            bytes: pdf_bytes.to_vec(),
            metrics: ExportMetrics {
                input_size_bytes: pdf_bytes.len(),
                output_size_bytes: pdf_bytes.len(),
                page_count,
                stamps_drawn: 0,
                stamps_skipped: 0,
                processing_time_ms: started.elapsed().as_millis() as u64,
            },
        });
    }

    let mut fonts = FontCache::default();
    let mut pages: BTreeMap<usize, PageTarget> = BTreeMap::new();
    let mut stamps_drawn = 0;
    let mut stamps_skipped = 0;

    // Stamps are drawn in collection order, so the first failing stamp is
    // the one that aborts the export
    for stamp in stamps.iter() {
        let page_index = stamp.page_index;
        let Some(&page_id) = page_ids.get(page_index) else {
            warn!(
                stamp_id = %stamp.id,
                page_index,
                page_count,
                "Page out of range, skipping stamp"
            );
            stamps_skipped += 1;
            continue;
        };
        let Some(page_image) = page_images.get(page_index) else {
            warn!(stamp_id = %stamp.id, page_index, "No page image, skipping stamp");
            stamps_skipped += 1;
            continue;
        };

        let target = match pages.entry(page_index) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(PageTarget::prepare(
                &doc, page_id, page_index, page_image, options,
            )?),
        };

        let rect = raster_to_pdf(&stamp.rect(), target.image_size, target.page.size())
            .translated(target.page.origin_x, target.page.origin_y);
        for command in plan_stamp(stamp, rect) {
            target.canvas.draw(&mut doc, &mut fonts, &command)?;
        }
        debug!(stamp_id = %stamp.id, kind = ?stamp.kind, page_index, ?rect, "Stamp drawn");
        stamps_drawn += 1;
    }

    for target in pages.into_values() {
        install_canvas(&mut doc, target.page_id, target.canvas)?;
    }

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| StampError::OperationError(format!("Save failed: {}", e)))?;

    let metrics = ExportMetrics {
        input_size_bytes: pdf_bytes.len(),
        output_size_bytes: bytes.len(),
        page_count,
        stamps_drawn,
        stamps_skipped,
        processing_time_ms: started.elapsed().as_millis() as u64,
    };
    info!(
        stamps_drawn,
        stamps_skipped,
        output_size = bytes.len(),
        "Export complete"
    );

    Ok(ExportOutput { bytes, metrics })
}

/// A page receiving stamps, with its geometry checked once up front
struct PageTarget {
    page_id: ObjectId,
    page: PageGeometry,
    image_size: ImageSize,
    canvas: PageCanvas,
}

impl PageTarget {
    fn prepare(
        doc: &Document,
        page_id: ObjectId,
        page_index: usize,
        page_image: &PageImage,
        options: &ExportOptions,
    ) -> Result<Self, StampError> {
        let page = PageGeometry::from_page_object(doc, page_id, page_index)?;
        let image_size = page_image.size(page_index)?;

        if page.is_rotated() {
            warn!(
                page_index,
                rotation = page.rotation,
                "Page is rotated, stamp positions assume an unrotated rendering"
            );
        }

        if options.drift_policy != DriftPolicy::Ignore {
            if let Some(drift) = detect_scale_drift(
                image_size,
                page.size(),
                options.render_scale,
                options.drift_tolerance,
            ) {
                if options.drift_policy == DriftPolicy::Reject {
                    return Err(StampError::ScaleMismatch {
                        page_index,
                        scale_x: drift.render_scale_x,
                        scale_y: drift.render_scale_y,
                    });
                }
                warn!(
                    page_index,
                    scale_x = drift.render_scale_x,
                    scale_y = drift.render_scale_y,
                    expected = ?drift.expected,
                    "Page image scale does not match the page, stamp positions may be off"
                );
            }
        }

        Ok(Self {
            page_id,
            page,
            image_size,
            canvas: PageCanvas::new(existing_resource_names(doc, page_id)),
        })
    }
}

/// The page's effective resource dictionary, resolved into an owned copy
fn page_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    doc.get_object(page_id)
        .and_then(Object::as_dict)
        .ok()
        .and_then(|page| inherited_attribute(doc, page, b"Resources"))
        .and_then(|resources| resources.as_dict().ok())
        .cloned()
        .unwrap_or_default()
}

/// Resource sub-dictionary such as `/Font`, resolved into an owned copy
fn resource_category(doc: &Document, resources: &Dictionary, key: &[u8]) -> Dictionary {
    resources
        .get(key)
        .ok()
        .map(|entry| resolve(doc, entry))
        .and_then(|entry| entry.as_dict().ok())
        .cloned()
        .unwrap_or_default()
}

fn existing_resource_names(doc: &Document, page_id: ObjectId) -> HashSet<String> {
    let resources = page_resources(doc, page_id);
    [b"Font".as_slice(), b"XObject".as_slice()]
        .into_iter()
        .flat_map(|key| {
            resource_category(doc, &resources, key)
                .iter()
                .map(|(name, _)| String::from_utf8_lossy(name).into_owned())
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Append the canvas to the page: the original content is wrapped in q/Q,
/// the stamps follow in their own stream, and the referenced resources are
/// merged into the page's resource dictionary.
fn install_canvas(
    doc: &mut Document,
    page_id: ObjectId,
    canvas: PageCanvas,
) -> Result<(), StampError> {
    if canvas.is_empty() {
        return Ok(());
    }

    let mut resources = page_resources(doc, page_id);
    let categories = [
        (b"Font".as_slice(), canvas.fonts()),
        (b"XObject".as_slice(), canvas.xobjects()),
    ];
    for (key, entries) in categories {
        if entries.is_empty() {
            continue;
        }
        let mut category = resource_category(doc, &resources, key);
        for (name, id) in entries {
            category.set(name.as_str(), Object::Reference(*id));
        }
        resources.set(key, Object::Dictionary(category));
    }

    let existing_contents = {
        let page = doc
            .get_object(page_id)
            .and_then(Object::as_dict)
            .map_err(|e| StampError::OperationError(format!("Page dictionary: {}", e)))?;
        match page.get(b"Contents") {
            Ok(Object::Array(items)) => items.clone(),
            Ok(Object::Reference(id)) => match doc.get_object(*id) {
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            _ => Vec::new(),
        }
    };

    let mut contents = Vec::with_capacity(existing_contents.len() + 2);
    let mut operations = canvas.into_operations();
    if !existing_contents.is_empty() {
        let save = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        contents.push(Object::Reference(save));
        contents.extend(existing_contents);
        operations.insert(0, Operation::new("Q", vec![]));
    }

    // Leading newline keeps the first operator apart from the previous stream's last token
    let mut encoded = b"\n".to_vec();
    encoded.extend(
        Content { operations }
            .encode()
            .map_err(|e| StampError::OperationError(format!("Content encoding failed: {}", e)))?,
    );
    let stamp_stream = doc.add_object(Stream::new(Dictionary::new(), encoded));
    contents.push(Object::Reference(stamp_stream));

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| StampError::OperationError(format!("Page dictionary: {}", e)))?;
    page.set("Contents", Object::Array(contents));
    page.set("Resources", Object::Dictionary(resources));

    Ok(())
}
