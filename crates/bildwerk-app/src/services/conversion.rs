// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Conversion service: one request from staged uploads to a delivered PDF.
//
// The service owns the temp areas and the janitor. CPU-heavy work (decoding,
// re-encoding, composing) runs on the blocking pool; one request is processed
// sequentially so page order always follows upload order. Cloning the service
// is cheap and every clone shares the same temp root.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use bildwerk_core::config::AppConfig;
use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::human_errors::{StatusClass, humanize_error};
use bildwerk_core::types::{ConversionOptions, ConversionResponse, GeneratedDocument, RawUpload};
use bildwerk_document::{ArchiveExtractor, BatchProcessor, DocumentComposer};
use bildwerk_storage::{Janitor, TempArea, TempResourceManager};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

pub const NO_FILES_MESSAGE: &str = "No files were uploaded";
pub const NO_IMAGES_MESSAGE: &str = "No valid images found in the uploaded files";

#[derive(Clone)]
pub struct ConversionService {
    config: Arc<AppConfig>,
    temp: Arc<TempResourceManager>,
    janitor: Arc<tokio::sync::Mutex<Janitor>>,
    /// Deferred releases scheduled by `deliver`, awaited on shutdown.
    pending_releases: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl ConversionService {
    /// Prepare the temp areas and start the janitor. Call once at startup,
    /// from within a tokio runtime.
    pub fn init(config: AppConfig) -> Result<Self> {
        let temp = Arc::new(TempResourceManager::from_config(&config));
        temp.ensure_layout()?;

        let mut janitor = Janitor::new(Arc::clone(&temp), config.sweep_interval());
        janitor.start();

        info!(root = %temp.root().display(), "conversion service initialised");

        Ok(Self {
            config: Arc::new(config),
            temp,
            janitor: Arc::new(tokio::sync::Mutex::new(janitor)),
            pending_releases: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn temp(&self) -> &Arc<TempResourceManager> {
        &self.temp
    }

    // -- Intake ---------------------------------------------------------------

    /// Write one uploaded blob into the uploads area and wrap it as a
    /// file-backed [`RawUpload`].
    pub async fn stage_upload(
        &self,
        filename: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<RawUpload> {
        let path = self.temp.unique_path(TempArea::Uploads, "upload", "bin");
        let size = bytes.len() as u64;
        tokio::fs::write(&path, bytes).await?;
        debug!(filename, size, path = %path.display(), "upload staged");
        Ok(RawUpload::from_file(filename, content_type, path, size))
    }

    fn check_limits(&self, uploads: &[RawUpload]) -> Result<()> {
        if uploads.is_empty() {
            return Err(BildwerkError::EmptyBatch(NO_FILES_MESSAGE.into()));
        }
        if uploads.len() > self.config.max_uploads {
            return Err(BildwerkError::TooManyUploads {
                count: uploads.len(),
                max: self.config.max_uploads,
            });
        }
        if let Some(upload) = uploads
            .iter()
            .find(|upload| upload.size() > self.config.max_upload_bytes)
        {
            return Err(BildwerkError::UploadTooLarge {
                name: upload.filename().to_owned(),
                size: upload.size(),
                max: self.config.max_upload_bytes,
            });
        }
        Ok(())
    }

    fn options_from(&self, form: &HashMap<String, String>) -> ConversionOptions {
        ConversionOptions {
            quality: self.config.default_quality,
            show_filenames: false,
            page_size: self.config.default_page_size,
        }
        .with_form(form)
    }

    // -- Conversion -----------------------------------------------------------

    /// Turn `uploads` into one PDF in the output area.
    ///
    /// Every upload is released before this returns, whatever the outcome.
    #[instrument(skip_all, fields(uploads = uploads.len()))]
    pub async fn convert(
        &self,
        mut uploads: Vec<RawUpload>,
        form: &HashMap<String, String>,
    ) -> Result<GeneratedDocument> {
        if let Err(err) = self.check_limits(&uploads) {
            for upload in &mut uploads {
                upload.release();
            }
            return Err(err);
        }

        let options = self.options_from(form);
        let extractor = ArchiveExtractor::new(self.temp.area(TempArea::Extraction))
            .with_max_entry_bytes(self.config.max_archive_entry_bytes);
        let destination = self.temp.unique_path(TempArea::Output, "converted", "pdf");

        let document = tokio::task::spawn_blocking(move || {
            let summary = BatchProcessor::new(extractor).process_batch(uploads, &options);
            if summary.is_empty() {
                return Err(BildwerkError::EmptyBatch(NO_IMAGES_MESSAGE.into()));
            }
            DocumentComposer::from_options(&options).compose(&summary.images, &destination)
        })
        .await
        .map_err(|e| BildwerkError::Task(format!("conversion task: {e}")))??;

        info!(
            pages = document.page_count,
            path = %document.path.display(),
            "conversion finished"
        );
        Ok(document)
    }

    // -- Delivery -------------------------------------------------------------

    /// Stream `document` into `writer` and flush it.
    ///
    /// The file is released `release_delay` after streaming ends, whether or
    /// not streaming succeeded.
    #[instrument(skip_all, fields(path = %document.path.display()))]
    pub async fn deliver<W>(&self, document: &GeneratedDocument, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let streamed = stream_file(document, writer).await;
        self.schedule_release(document.path.clone());

        match &streamed {
            Ok(bytes) => info!(bytes, "document delivered"),
            Err(e) => warn!(error = %e, "document delivery failed"),
        }
        streamed
    }

    /// Write `document` to a new file at `destination`. The document is
    /// released even when `destination` cannot be created.
    pub async fn deliver_to_path(
        &self,
        document: &GeneratedDocument,
        destination: &Path,
    ) -> Result<u64> {
        let mut file = match tokio::fs::File::create(destination).await {
            Ok(file) => file,
            Err(e) => {
                warn!(
                    destination = %destination.display(),
                    error = %e,
                    "cannot create output file"
                );
                self.schedule_release(document.path.clone());
                return Err(e.into());
            }
        };
        self.deliver(document, &mut file).await
    }

    fn schedule_release(&self, path: PathBuf) {
        let handle = self.temp.release_after(path, self.config.release_delay());
        let mut pending = self
            .pending_releases
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        pending.retain(|handle| !handle.is_finished());
        pending.push(handle);
    }

    // -- Failure reporting ----------------------------------------------------

    /// Map a request failure to the caller-facing response and its status.
    pub fn respond(&self, err: &BildwerkError) -> (ConversionResponse, StatusClass) {
        let human = humanize_error(err);
        match human.status {
            StatusClass::Client => warn!(error = %err, "conversion refused"),
            StatusClass::Server => error!(error = %err, "conversion failed"),
        }
        let status = human.status;
        (human.into_response(), status)
    }

    // -- Lifecycle ------------------------------------------------------------

    /// Stop the janitor and wait for outstanding deferred releases.
    pub async fn shutdown(&self) -> Result<()> {
        self.janitor.lock().await.stop().await?;

        let pending = std::mem::take(
            &mut *self
                .pending_releases
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for handle in pending {
            if let Err(e) = handle.await {
                warn!(error = %e, "deferred release task failed");
            }
        }

        info!("conversion service stopped");
        Ok(())
    }
}

async fn stream_file<W>(document: &GeneratedDocument, writer: &mut W) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut file = tokio::fs::File::open(&document.path).await?;
    let bytes = tokio::io::copy(&mut file, writer).await?;
    writer.flush().await?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bildwerk_core::types::PageSize;
    use bildwerk_document::PdfInspector;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    fn image_bytes(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([20, 120, 220])));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), format)
            .expect("encode fixture");
        buffer
    }

    fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, data) in entries {
            writer.start_file(*name, options).expect("start file");
            writer.write_all(data).expect("write entry");
        }
        writer.finish().expect("finish zip").into_inner()
    }

    fn test_config(root: &Path) -> AppConfig {
        AppConfig {
            temp_root: root.to_path_buf(),
            release_delay_ms: 20,
            ..AppConfig::default()
        }
    }

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn area_entries(service: &ConversionService, area: TempArea) -> usize {
        std::fs::read_dir(service.temp().area(area))
            .expect("read area")
            .count()
    }

    fn assert_areas_empty(service: &ConversionService) {
        for area in TempArea::ALL {
            assert_eq!(area_entries(service, area), 0, "{:?} not empty", area);
        }
    }

    async fn stage(
        service: &ConversionService,
        files: Vec<(&str, &str, Vec<u8>)>,
    ) -> Vec<RawUpload> {
        let mut uploads = Vec::new();
        for (name, content_type, bytes) in files {
            uploads.push(
                service
                    .stage_upload(name, content_type, bytes)
                    .await
                    .expect("stage"),
            );
        }
        uploads
    }

    fn captions(document: &GeneratedDocument) -> Vec<String> {
        let inspector = PdfInspector::open(&document.path).expect("open pdf");
        (1..=inspector.page_count() as u32)
            .map(|page| inspector.page_text(page).expect("page text"))
            .collect()
    }

    #[tokio::test]
    async fn single_jpeg_becomes_a_captioned_a4_page() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = ConversionService::init(test_config(dir.path())).expect("init");
        let uploads = stage(
            &service,
            vec![("photo.jpg", "image/jpeg", image_bytes(800, 600, ImageFormat::Jpeg))],
        )
        .await;

        let document = service
            .convert(
                uploads,
                &form(&[
                    ("imageQuality", "high"),
                    ("pageSize", "a4"),
                    ("showFilenames", "true"),
                ]),
            )
            .await
            .expect("convert");

        assert_eq!(document.page_count, 1);
        let inspector = PdfInspector::open(&document.path).expect("open pdf");
        let (w, h) = inspector.page_size_pt(1).expect("media box");
        assert!((w - 595.28).abs() < 1.0 && (h - 841.89).abs() < 1.0, "{w}x{h}");
        assert!(inspector.page_text(1).expect("text").contains("photo.jpg"));

        let mut delivered = Vec::new();
        let bytes = service
            .deliver(&document, &mut delivered)
            .await
            .expect("deliver");
        assert_eq!(bytes as usize, delivered.len());
        assert!(delivered.starts_with(b"%PDF"));

        service.shutdown().await.expect("shutdown");
        assert!(!document.path.exists());
        assert_areas_empty(&service);
    }

    #[tokio::test]
    async fn archive_with_a_corrupt_entry_keeps_the_good_ones_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = ConversionService::init(test_config(dir.path())).expect("init");
        let png = image_bytes(30, 20, ImageFormat::Png);
        let jpg = image_bytes(20, 30, ImageFormat::Jpeg);
        let archive = zip_bytes(&[
            ("first.png", &png),
            ("second.jpg", &jpg),
            ("broken.jpg", b"this is not a jpeg"),
            ("third.png", &png),
        ]);
        let uploads = stage(&service, vec![("album.zip", "application/zip", archive)]).await;

        let document = service
            .convert(uploads, &form(&[("showFilenames", "true")]))
            .await
            .expect("convert");

        assert_eq!(document.page_count, 3);
        let pages = captions(&document);
        assert!(pages[0].contains("first.png"));
        assert!(pages[1].contains("second.jpg"));
        assert!(pages[2].contains("third.png"));

        service.shutdown().await.expect("shutdown");
        assert_eq!(area_entries(&service, TempArea::Uploads), 0);
        assert_eq!(area_entries(&service, TempArea::Extraction), 0);
    }

    #[tokio::test]
    async fn archive_without_images_is_a_client_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = ConversionService::init(test_config(dir.path())).expect("init");
        let archive = zip_bytes(&[("readme.txt", b"hello"), ("notes.md", b"# notes")]);
        let uploads = stage(&service, vec![("docs.zip", "application/zip", archive)]).await;

        let err = service
            .convert(uploads, &HashMap::new())
            .await
            .expect_err("no images");
        assert!(matches!(&err, BildwerkError::EmptyBatch(msg) if msg == NO_IMAGES_MESSAGE));

        let (response, status) = service.respond(&err);
        assert!(!response.success);
        assert_eq!(response.message, NO_IMAGES_MESSAGE);
        assert_eq!(status, StatusClass::Client);

        service.shutdown().await.expect("shutdown");
        assert_areas_empty(&service);
    }

    #[tokio::test]
    async fn loose_images_and_archive_follow_upload_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = ConversionService::init(test_config(dir.path())).expect("init");
        let png = image_bytes(16, 16, ImageFormat::Png);
        let archive = zip_bytes(&[("zip-image1.png", &png), ("zip-image2.png", &png)]);
        let uploads = stage(
            &service,
            vec![
                ("image1.jpg", "image/jpeg", image_bytes(40, 30, ImageFormat::Jpeg)),
                ("image2.png", "image/png", image_bytes(30, 40, ImageFormat::Png)),
                ("bundle.zip", "application/zip", archive),
            ],
        )
        .await;

        let document = service
            .convert(uploads, &form(&[("showFilenames", "on")]))
            .await
            .expect("convert");

        assert_eq!(document.page_count, 4);
        let pages = captions(&document);
        for (page, expected) in pages
            .iter()
            .zip(["image1.jpg", "image2.png", "zip-image1.png", "zip-image2.png"])
        {
            assert!(page.contains(expected), "expected {expected} in {page:?}");
        }

        service.shutdown().await.expect("shutdown");
    }

    #[tokio::test]
    async fn request_without_uploads_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = ConversionService::init(test_config(dir.path())).expect("init");

        let err = service
            .convert(Vec::new(), &HashMap::new())
            .await
            .expect_err("no uploads");
        assert!(matches!(&err, BildwerkError::EmptyBatch(msg) if msg == NO_FILES_MESSAGE));

        service.shutdown().await.expect("shutdown");
    }

    #[tokio::test]
    async fn too_many_uploads_are_all_released() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = ConversionService::init(test_config(dir.path())).expect("init");
        let files = (0..11)
            .map(|_| ("tiny.png", "image/png", image_bytes(2, 2, ImageFormat::Png)))
            .collect();
        let uploads = stage(&service, files).await;
        assert_eq!(area_entries(&service, TempArea::Uploads), 11);

        let err = service
            .convert(uploads, &HashMap::new())
            .await
            .expect_err("limit");
        assert!(matches!(err, BildwerkError::TooManyUploads { count: 11, max: 10 }));
        assert_eq!(area_entries(&service, TempArea::Uploads), 0);

        service.shutdown().await.expect("shutdown");
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = AppConfig {
            max_upload_bytes: 64,
            ..test_config(dir.path())
        };
        let service = ConversionService::init(config).expect("init");
        let uploads = stage(
            &service,
            vec![("big.bmp", "image/bmp", image_bytes(32, 32, ImageFormat::Bmp))],
        )
        .await;

        let err = service
            .convert(uploads, &HashMap::new())
            .await
            .expect_err("too large");
        assert!(matches!(&err, BildwerkError::UploadTooLarge { name, .. } if name == "big.bmp"));
        assert_eq!(service.respond(&err).1, StatusClass::Client);
        assert_eq!(area_entries(&service, TempArea::Uploads), 0);

        service.shutdown().await.expect("shutdown");
    }

    #[tokio::test]
    async fn configured_page_size_applies_when_the_form_is_silent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = AppConfig {
            default_page_size: PageSize::Letter,
            ..test_config(dir.path())
        };
        let service = ConversionService::init(config).expect("init");
        let uploads = stage(
            &service,
            vec![("a.bmp", "image/bmp", image_bytes(10, 10, ImageFormat::Bmp))],
        )
        .await;

        let document = service
            .convert(uploads, &HashMap::new())
            .await
            .expect("convert");
        let (w, h) = PdfInspector::open(&document.path)
            .expect("open pdf")
            .page_size_pt(1)
            .expect("media box");
        assert!((w - 612.0).abs() < 1.0 && (h - 792.0).abs() < 1.0, "{w}x{h}");

        service.shutdown().await.expect("shutdown");
    }

    #[tokio::test]
    async fn failed_delivery_still_releases_the_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = ConversionService::init(test_config(dir.path())).expect("init");
        let uploads = stage(
            &service,
            vec![("x.png", "image/png", image_bytes(8, 8, ImageFormat::Png))],
        )
        .await;
        let document = service
            .convert(uploads, &HashMap::new())
            .await
            .expect("convert");

        let (mut writer, reader) = tokio::io::duplex(16);
        drop(reader);
        assert!(service.deliver(&document, &mut writer).await.is_err());

        service.shutdown().await.expect("shutdown");
        assert!(!document.path.exists());
        assert_areas_empty(&service);
    }

    #[tokio::test]
    async fn uncreatable_destination_still_releases_the_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = ConversionService::init(test_config(dir.path())).expect("init");
        let uploads = stage(
            &service,
            vec![("x.png", "image/png", image_bytes(8, 8, ImageFormat::Png))],
        )
        .await;
        let document = service
            .convert(uploads, &HashMap::new())
            .await
            .expect("convert");

        let destination = dir.path().join("no").join("such").join("out.pdf");
        assert!(service.deliver_to_path(&document, &destination).await.is_err());

        service.shutdown().await.expect("shutdown");
        assert!(!destination.exists());
        assert!(!document.path.exists());
        assert_areas_empty(&service);
    }

    #[tokio::test]
    async fn delivered_file_matches_the_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = ConversionService::init(test_config(dir.path())).expect("init");
        let uploads = stage(
            &service,
            vec![("x.png", "image/png", image_bytes(8, 8, ImageFormat::Png))],
        )
        .await;
        let document = service
            .convert(uploads, &HashMap::new())
            .await
            .expect("convert");
        let expected = std::fs::read(&document.path).expect("read document");

        let destination = dir.path().join("out.pdf");
        let written = service
            .deliver_to_path(&document, &destination)
            .await
            .expect("deliver");

        assert_eq!(written, expected.len() as u64);
        assert_eq!(std::fs::read(&destination).expect("read copy"), expected);
        service.shutdown().await.expect("shutdown");
        assert!(!document.path.exists());
    }

    #[tokio::test]
    async fn concurrent_requests_get_distinct_documents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = ConversionService::init(test_config(dir.path())).expect("init");
        let first = stage(
            &service,
            vec![("a.png", "image/png", image_bytes(8, 8, ImageFormat::Png))],
        )
        .await;
        let second = stage(
            &service,
            vec![("b.png", "image/png", image_bytes(8, 8, ImageFormat::Png))],
        )
        .await;

        let empty = HashMap::new();
        let (a, b) = tokio::join!(
            service.convert(first, &empty),
            service.convert(second, &empty)
        );
        let (a, b) = (a.expect("first"), b.expect("second"));
        assert_ne!(a.path, b.path);
        assert_eq!(area_entries(&service, TempArea::Output), 2);

        service.shutdown().await.expect("shutdown");
    }
}
