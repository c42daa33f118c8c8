//! Document Renderer - Laid-Out Page to PDF Bytes
//!
//! Serializes the element list from [`crate::layout`] into a single-page
//! PDF via `lopdf`. Text uses the built-in Type1 Helvetica pair (no font
//! file is shipped, so the generic fallback is the only branch), images are
//! embedded as baseline-JPEG XObjects, and every text operand is Latin-1
//! encoded after sanitization.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use image::codecs::jpeg::JpegEncoder;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use thiserror::Error;
use tracing::{debug, warn};

use crate::layout::{lay_out_page, AssetAvailability, Element, LayoutConfig, PageLayout};
use crate::sanitize::latin1_bytes;
use crate::templates::{logo_brand_key, TemplateRecord};

const PT_PER_MM: f64 = 72.0 / 25.4;
const JPEG_QUALITY: u8 = 90;
/// Divider stroke width, millimetres.
const RULE_WIDTH_MM: f64 = 0.2;

const LOGO_RESOURCE: &str = "Im0";
const SIGNATURE_RESOURCE: &str = "Im1";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to serialize document: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("failed to write document stream: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolve the effective date: an explicit string wins, otherwise today
/// formatted `DD.MM.YYYY`.
pub fn effective_date(date: Option<&str>) -> String {
    match date {
        Some(d) => d.to_string(),
        None => Local::now().format("%d.%m.%Y").to_string(),
    }
}

/// Locates brand logos and the shared signature image. Every lookup is
/// optional: a missing or undecodable file renders as nothing.
pub struct AssetLibrary {
    logo_dir: PathBuf,
    signature_path: PathBuf,
}

impl AssetLibrary {
    /// `logo_dir` holds one `{brand}.png` per brand plus the shared
    /// `signature.png`.
    pub fn new(logo_dir: impl Into<PathBuf>) -> Self {
        let logo_dir = logo_dir.into();
        let signature_path = logo_dir.join("signature.png");
        Self {
            logo_dir,
            signature_path,
        }
    }

    pub fn with_signature_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.signature_path = path.into();
        self
    }

    fn logo_for(&self, brand: &str) -> Option<EmbeddedImage> {
        let key = logo_brand_key(brand);
        if key.is_empty() {
            return None;
        }
        load_image(&self.logo_dir.join(format!("{key}.png")))
    }

    fn signature(&self) -> Option<EmbeddedImage> {
        load_image(&self.signature_path)
    }
}

/// Decoded image ready for embedding: baseline JPEG plus pixel dimensions
/// for aspect-correct placement.
struct EmbeddedImage {
    jpeg: Vec<u8>,
    width_px: u32,
    height_px: u32,
}

impl EmbeddedImage {
    fn width_for_height(&self, height_mm: f64) -> f64 {
        height_mm * self.width_px as f64 / self.height_px as f64
    }
}

fn load_image(path: &Path) -> Option<EmbeddedImage> {
    let bytes = fs::read(path).ok()?;
    let decoded = match image::load_from_memory(&bytes) {
        Ok(img) => img,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "image undecodable, skipping");
            return None;
        }
    };
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return None;
    }

    // Flatten alpha over white; DCTDecode carries no transparency.
    let mut rgb = image::RgbImage::new(width, height);
    for (x, y, px) in rgba.enumerate_pixels() {
        let alpha = px[3] as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha)) / 255) as u8;
        rgb.put_pixel(x, y, image::Rgb([blend(px[0]), blend(px[1]), blend(px[2])]));
    }

    let mut jpeg = Vec::new();
    if let Err(e) = JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY).encode(
        rgb.as_raw(),
        width,
        height,
        image::ColorType::Rgb8,
    ) {
        warn!(path = %path.display(), error = %e, "image re-encoding failed, skipping");
        return None;
    }
    Some(EmbeddedImage {
        jpeg,
        width_px: width,
        height_px: height,
    })
}

/// Renders single-page CoC documents from template records.
pub struct DocumentRenderer {
    config: LayoutConfig,
    assets: AssetLibrary,
}

impl DocumentRenderer {
    pub fn new(assets: AssetLibrary) -> Self {
        Self {
            config: LayoutConfig::default(),
            assets,
        }
    }

    pub fn with_config(assets: AssetLibrary, config: LayoutConfig) -> Self {
        Self { config, assets }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Render one document for `vin`. `date` defaults to today; pass it
    /// explicitly for reproducible output.
    pub fn render(
        &self,
        vin: &str,
        template: &TemplateRecord,
        date: Option<&str>,
    ) -> Result<Vec<u8>, RenderError> {
        let date = effective_date(date);
        let logo = self.assets.logo_for(template.identity.brand());
        let signature = self.assets.signature();
        let page = lay_out_page(
            vin,
            template,
            &date,
            AssetAvailability {
                logo: logo.is_some(),
                signature: signature.is_some(),
            },
            &self.config,
        );
        debug!(vin, elements = page.elements.len(), "page laid out");
        write_pdf(&page, &self.config, logo.as_ref(), signature.as_ref())
    }
}

fn mm_x(x: f64) -> Object {
    ((x * PT_PER_MM) as f32).into()
}

fn mm_y(y: f64, page_height_mm: f64) -> Object {
    (((page_height_mm - y) * PT_PER_MM) as f32).into()
}

fn write_pdf(
    page: &PageLayout,
    config: &LayoutConfig,
    logo: Option<&EmbeddedImage>,
    signature: Option<&EmbeddedImage>,
) -> Result<Vec<u8>, RenderError> {
    let page_width_pt = (config.page_width * PT_PER_MM) as f32;
    let page_height_pt = (config.page_height * PT_PER_MM) as f32;
    let page_height_mm = config.page_height;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_regular = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let font_bold = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });

    let mut xobjects = Dictionary::new();
    if let Some(img) = logo {
        xobjects.set(LOGO_RESOURCE, doc.add_object(image_stream(img)));
    }
    if let Some(img) = signature {
        xobjects.set(SIGNATURE_RESOURCE, doc.add_object(image_stream(img)));
    }

    let mut resources = dictionary! {
        "Font" => dictionary! {
            "F1" => font_regular,
            "F2" => font_bold,
        },
    };
    if !xobjects.is_empty() {
        resources.set("XObject", xobjects);
    }
    let resources_id = doc.add_object(resources);

    let mut ops: Vec<Operation> = Vec::new();
    for element in &page.elements {
        match element {
            Element::Text {
                x,
                y,
                size,
                bold,
                text,
            } => {
                let font = if *bold { "F2" } else { "F1" };
                ops.push(Operation::new("BT", vec![]));
                ops.push(Operation::new("Tf", vec![font.into(), (*size as f32).into()]));
                ops.push(Operation::new("Td", vec![mm_x(*x), mm_y(*y, page_height_mm)]));
                ops.push(Operation::new(
                    "Tj",
                    vec![Object::string_literal(latin1_bytes(text))],
                ));
                ops.push(Operation::new("ET", vec![]));
            }
            Element::Logo { x, y, height } => {
                if let Some(img) = logo {
                    push_image_ops(&mut ops, img, LOGO_RESOURCE, *x, *y, *height, page_height_mm);
                }
            }
            Element::Signature { x, y, height } => {
                if let Some(img) = signature {
                    push_image_ops(
                        &mut ops,
                        img,
                        SIGNATURE_RESOURCE,
                        *x,
                        *y,
                        *height,
                        page_height_mm,
                    );
                }
            }
            Element::Rule { x, top, bottom } => {
                ops.push(Operation::new(
                    "w",
                    vec![((RULE_WIDTH_MM * PT_PER_MM) as f32).into()],
                ));
                ops.push(Operation::new("m", vec![mm_x(*x), mm_y(*top, page_height_mm)]));
                ops.push(Operation::new("l", vec![mm_x(*x), mm_y(*bottom, page_height_mm)]));
                ops.push(Operation::new("S", vec![]));
            }
        }
    }

    let content = Content { operations: ops };
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode()?));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0f32.into(), 0f32.into(), page_width_pt.into(), page_height_pt.into()],
    });

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

fn image_stream(img: &EmbeddedImage) -> Stream {
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => img.width_px as i64,
            "Height" => img.height_px as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        img.jpeg.clone(),
    )
}

fn push_image_ops(
    ops: &mut Vec<Operation>,
    img: &EmbeddedImage,
    resource: &str,
    x_mm: f64,
    y_mm: f64,
    height_mm: f64,
    page_height_mm: f64,
) {
    let width_pt = (img.width_for_height(height_mm) * PT_PER_MM) as f32;
    let height_pt = (height_mm * PT_PER_MM) as f32;
    let x_pt = (x_mm * PT_PER_MM) as f32;
    // image space maps the unit square from its bottom-left corner
    let y_pt = ((page_height_mm - y_mm - height_mm) * PT_PER_MM) as f32;

    ops.push(Operation::new("q", vec![]));
    ops.push(Operation::new(
        "cm",
        vec![
            width_pt.into(),
            0.into(),
            0.into(),
            height_pt.into(),
            x_pt.into(),
            y_pt.into(),
        ],
    ));
    ops.push(Operation::new("Do", vec![resource.into()]));
    ops.push(Operation::new("Q", vec![]));
}
