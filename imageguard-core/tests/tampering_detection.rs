//! End-to-end tests for ingest, fingerprint robustness, and tampering detection.
//!
//! Fixtures are synthetic images with gradients and a checkerboard overlay so
//! that the perceptual hash has real low-frequency structure to work with.

use image::{DynamicImage, GenericImageView, ImageBuffer, ImageFormat, Rgb, RgbImage};
use imageguard_core::{
    hamming, CompareRequest, ContentHasher, EngineConfig, EvidenceEngine, ImageNormalizer,
    IngestRequest, IntegrityError, PerceptualHasher, TamperStatus, TamperingThreshold,
};
use std::io::Cursor;

/// Maximum Hamming distance tolerated after a harmless transformation.
const SIMILARITY_THRESHOLD: u32 = 10;

/// Create a test image with recognizable patterns.
fn create_test_image(width: u32, height: u32) -> RgbImage {
    let mut img = ImageBuffer::new(width, height);

    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let r = ((x as f32 / width as f32) * 255.0) as u8;
        let g = ((y as f32 / height as f32) * 255.0) as u8;
        let b = (((x + y) as f32 / (width + height) as f32) * 200.0) as u8;

        let pattern = if (x / 20 + y / 20) % 2 == 0 { 30 } else { 0 };
        *pixel = Rgb([r.saturating_add(pattern), g, b]);
    }

    img
}

/// Paint a solid rectangle over part of the image.
fn overpaint(img: &RgbImage, x0: u32, y0: u32, w: u32, h: u32, colour: [u8; 3]) -> RgbImage {
    let mut altered = img.clone();
    for y in y0..(y0 + h).min(img.height()) {
        for x in x0..(x0 + w).min(img.width()) {
            altered.put_pixel(x, y, Rgb(colour));
        }
    }
    altered
}

fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, format).expect("encoding failed");
    buffer.into_inner()
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
    img.write_with_encoder(encoder).expect("JPEG encoding failed");
    buffer.into_inner()
}

fn png(img: &RgbImage) -> Vec<u8> {
    encode(&DynamicImage::ImageRgb8(img.clone()), ImageFormat::Png)
}

fn fingerprint_of(raw: &[u8]) -> imageguard_core::Fingerprint {
    let canonical = ImageNormalizer::new().normalize(raw).unwrap();
    PerceptualHasher::new().fingerprint(&canonical).unwrap()
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn test_pipeline_is_reproducible() {
    let raw = png(&create_test_image(200, 150));
    let normalizer = ImageNormalizer::new();

    let first = normalizer.normalize(&raw).unwrap();
    let second = normalizer.normalize(&raw).unwrap();
    assert_eq!(first, second);

    let hasher = ContentHasher::default();
    let digest = hasher.hash(&first).unwrap();
    assert_eq!(digest, hasher.hash(&second).unwrap());
    assert_eq!(digest.as_str().len(), 64);
    assert!(digest
        .as_str()
        .chars()
        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));

    let fp = PerceptualHasher::new().fingerprint(&first).unwrap();
    assert_eq!(fp, PerceptualHasher::new().fingerprint(&second).unwrap());
    assert_eq!(hamming(&fp, &fp), 0);
}

#[test]
fn test_streamed_digest_matches_across_chunk_sizes() {
    let canonical = ImageNormalizer::new()
        .normalize(&png(&create_test_image(120, 90)))
        .unwrap();

    let whole = ContentHasher::new(canonical.len()).hash(&canonical).unwrap();
    for chunk in [1, 7, 1024, 65536] {
        assert_eq!(ContentHasher::new(chunk).hash(&canonical).unwrap(), whole);
    }
}

// ============================================================================
// Fingerprint Robustness
// ============================================================================

#[test]
fn test_fingerprint_survives_recompression() {
    let img = DynamicImage::ImageRgb8(create_test_image(256, 256));
    let original = fingerprint_of(&encode(&img, ImageFormat::Png));
    let recompressed = fingerprint_of(&encode_jpeg(&img, 90));

    let distance = hamming(&original, &recompressed);
    assert!(
        distance <= SIMILARITY_THRESHOLD,
        "JPEG q90 distance {} exceeds {}",
        distance,
        SIMILARITY_THRESHOLD
    );
}

#[test]
fn test_fingerprint_survives_resize() {
    let img = DynamicImage::ImageRgb8(create_test_image(256, 256));
    let (width, height) = img.dimensions();
    let half = img.resize_exact(width / 2, height / 2, image::imageops::FilterType::Lanczos3);

    let distance = hamming(
        &fingerprint_of(&encode(&img, ImageFormat::Png)),
        &fingerprint_of(&encode(&half, ImageFormat::Png)),
    );
    assert!(
        distance <= SIMILARITY_THRESHOLD,
        "50% resize distance {} exceeds {}",
        distance,
        SIMILARITY_THRESHOLD
    );
}

#[test]
fn test_different_image_drifts_away() {
    let img = DynamicImage::ImageRgb8(create_test_image(256, 256));
    let rotated = img.rotate180();

    let distance = hamming(
        &fingerprint_of(&encode(&img, ImageFormat::Png)),
        &fingerprint_of(&encode(&rotated, ImageFormat::Png)),
    );
    assert!(distance > SIMILARITY_THRESHOLD, "distance was {}", distance);
}

// ============================================================================
// Tampering Detection
// ============================================================================

#[test]
fn test_end_to_end_unmodified_copy() {
    let engine = EvidenceEngine::in_memory(EngineConfig::default()).unwrap();
    let raw = png(&create_test_image(160, 120));

    let record = engine
        .ingest(IngestRequest::new("case-001", &raw).with_filename("scene.png"))
        .unwrap()
        .record;

    assert_eq!(record.content_hash.as_str().len(), 64);
    assert_eq!(record.perceptual_hash.to_string().len(), 16);
    assert!(!record.signature.is_empty());
    assert!(!record.public_key.is_empty());
    assert!(record.verify_signature());

    let report = engine
        .compare(
            CompareRequest::new(record.id, &raw, "scene.png")
                .with_threshold(TamperingThreshold::new(5).unwrap()),
        )
        .unwrap();

    assert_eq!(report.result.similarity_percent, 100.0);
    assert_eq!(report.result.status, TamperStatus::Original);
    assert!(!report.result.tampered);
    assert!(report.result.difference_bbox.is_none());
}

#[test]
fn test_end_to_end_overpainted_copy() {
    let engine = EvidenceEngine::in_memory(EngineConfig::default()).unwrap();
    let original = create_test_image(160, 120);
    let record = engine
        .ingest(IngestRequest::new("case-001", &png(&original)))
        .unwrap()
        .record;

    let altered = overpaint(&original, 0, 0, 80, 60, [255, 255, 255]);
    let report = engine
        .compare(CompareRequest::new(record.id, &png(&altered), "altered.png"))
        .unwrap();

    assert!(report.result.tampered);
    assert_eq!(report.result.status, TamperStatus::Tampered);
    assert!(report.result.hamming_distance > 0);

    let bbox = report.result.difference_bbox.expect("difference expected");
    assert!(bbox.width() > 0 && bbox.height() > 0);
    assert!(bbox.left < 80 && bbox.top < 60);
}

#[test]
fn test_jpeg_challenge_of_png_evidence_is_compared_at_stored_size() {
    let engine = EvidenceEngine::in_memory(EngineConfig::default()).unwrap();
    let original = create_test_image(160, 120);
    let record = engine
        .ingest(IngestRequest::new("case-001", &png(&original)))
        .unwrap()
        .record;

    let larger = DynamicImage::ImageRgb8(create_test_image(320, 240));
    let report = engine
        .compare(CompareRequest::new(record.id, &encode_jpeg(&larger, 95), "large.jpg"))
        .unwrap();

    assert_eq!(report.difference.image().dimensions(), (160, 120));
    assert!(report.result.hamming_distance <= 64);
    assert!((0.0..=100.0).contains(&report.result.similarity_percent));
}

#[test]
fn test_difference_image_exports_as_png() {
    let engine = EvidenceEngine::in_memory(EngineConfig::default()).unwrap();
    let original = create_test_image(64, 64);
    let record = engine
        .ingest(IngestRequest::new("case-001", &png(&original)))
        .unwrap()
        .record;

    let altered = overpaint(&original, 10, 10, 20, 20, [0, 0, 0]);
    let report = engine
        .compare(CompareRequest::new(record.id, &png(&altered), "altered.png"))
        .unwrap();

    let exported = report.difference.to_png().unwrap();
    let decoded = image::load_from_memory(&exported).unwrap();
    assert_eq!(decoded.dimensions(), (64, 64));
}

#[test]
fn test_undecodable_challenge_is_an_error_not_a_verdict() {
    let engine = EvidenceEngine::in_memory(EngineConfig::default()).unwrap();
    let record = engine
        .ingest(IngestRequest::new("case-001", &png(&create_test_image(32, 32))))
        .unwrap()
        .record;

    let err = engine
        .compare(CompareRequest::new(record.id, b"\x89PNG truncated", "broken.png"))
        .unwrap_err();
    assert!(matches!(err, IntegrityError::ImageProcessing { .. }));
}
