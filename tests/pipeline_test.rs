use async_trait::async_trait;
use batch_image_analyzer::error::{AppError, GenerationError, PipelineError, UploadError};
use batch_image_analyzer::orchestrator::{BatchAnalyzer, UploadCoordinator};
use batch_image_analyzer::services::{Preprocessor, ResponseParser, RetryPolicy, NO_EXPLANATION_PLACEHOLDER};
use batch_image_analyzer::{
    BatchGenerator, Classification, ImageId, ImageUploader, PipelineController, RunOutcome,
    UploadedHandle,
};
use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_test::assert_ok;

/// 文件名以 `fail_prefix` 开头的图片永远上传失败
#[derive(Default)]
struct FakeUploader {
    calls: AtomicUsize,
    fail_prefix: Option<String>,
}

#[async_trait]
impl ImageUploader for FakeUploader {
    async fn upload(&self, path: &Path, mime_type: &str) -> Result<String, UploadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        if let Some(prefix) = &self.fail_prefix {
            if name.starts_with(prefix.as_str()) {
                return Err(UploadError::BadResponse {
                    endpoint: "fake".into(),
                    status: 503,
                    message: "unavailable".into(),
                });
            }
        }
        Ok(format!("fake://{}/{}", mime_type, name))
    }
}

/// 记录收到的句柄，返回固定文本
struct FakeGenerator {
    reply: Result<String, String>,
    received: Mutex<Vec<Vec<UploadedHandle>>>,
}

impl FakeGenerator {
    fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            received: Mutex::new(Vec::new()),
        }
    }

    fn failing(model: &str) -> Self {
        Self {
            reply: Err(model.to_string()),
            received: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

#[async_trait]
impl BatchGenerator for FakeGenerator {
    async fn generate(
        &self,
        handles: &[UploadedHandle],
        _prompt: &str,
    ) -> Result<String, GenerationError> {
        self.received.lock().unwrap().push(handles.to_vec());
        self.reply
            .clone()
            .map_err(|model| GenerationError::EmptyContent { model })
    }
}

fn controller(
    uploader: Arc<FakeUploader>,
    generator: Arc<FakeGenerator>,
    max_images: usize,
) -> PipelineController {
    PipelineController::from_parts(
        UploadCoordinator::new(uploader, Preprocessor::new(10), RetryPolicy::immediate(3), 150),
        BatchAnalyzer::new(generator),
        ResponseParser::new(),
        max_images,
    )
}

fn write_jpegs(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|name| {
            let path = dir.join(name);
            RgbImage::from_fn(24, 16, |x, y| Rgb([x as u8 * 10, y as u8 * 10, 128]))
                .save(&path)
                .unwrap();
            path
        })
        .collect()
}

fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).map(|mut d| d.next().is_none()).unwrap_or(true)
}

#[tokio::test]
async fn test_three_images_all_succeed() {
    let images = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let sources = write_jpegs(images.path(), &["a.jpg", "b.jpg", "c.jpeg"]);
    let uploader = Arc::new(FakeUploader::default());
    let generator = Arc::new(FakeGenerator::replying(
        "**Image 1:** yes - Holding a phone.\n**Image 2:** no - Reading a paper.\n**Image 3:** Yes - Texting.",
    ));

    let report = assert_ok!(
        controller(uploader.clone(), generator.clone(), 100)
            .run(images.path(), work.path(), None)
            .await
    );

    assert_eq!(report.outcome, RunOutcome::Complete);
    assert_eq!(report.results.len(), 3);
    let expected = [Classification::Yes, Classification::No, Classification::Yes];
    for (n, classification) in expected.iter().enumerate() {
        let verdict = report.results.get(ImageId(n as u32 + 1)).unwrap();
        assert_eq!(verdict.classification, *classification);
        assert!(!verdict.explanation.is_empty());
        assert_eq!(verdict.source_path.as_ref(), Some(&sources[n]));
    }
    assert_eq!(report.results.get(ImageId(2)).unwrap().explanation, "Reading a paper.");
    assert_eq!(uploader.calls.load(Ordering::SeqCst), 3);
    assert_eq!(generator.calls(), 1);
    assert!(dir_is_empty(work.path()));
}

#[tokio::test]
async fn test_one_upload_fails_permanently() {
    let images = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let sources = write_jpegs(images.path(), &["bad.jpg", "good.jpg"]);
    let uploader = Arc::new(FakeUploader {
        fail_prefix: Some("bad".to_string()),
        ..Default::default()
    });
    let generator = Arc::new(FakeGenerator::replying("Image 1: no - Nobody in frame."));

    let report = controller(uploader.clone(), generator.clone(), 100)
        .run(images.path(), work.path(), None)
        .await
        .unwrap();

    // 失败的一张尝试 3 次，成功的一张 1 次
    assert_eq!(uploader.calls.load(Ordering::SeqCst), 4);
    let received = generator.received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].len(), 1);
    assert_eq!(received[0][0].source_path, sources[1]);

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.outcome, RunOutcome::Partial);
    assert_eq!(report.failed_uploads.len(), 1);
    assert_eq!(report.failed_uploads[0].source_path, sources[0]);
    assert_eq!(report.failed_uploads[0].attempts, 3);
    assert_eq!(
        report.results.get(ImageId(1)).unwrap().source_path.as_ref(),
        Some(&sources[1])
    );
    assert!(dir_is_empty(work.path()));
}

#[tokio::test]
async fn test_empty_folder_makes_no_calls() {
    let images = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    std::fs::write(images.path().join("notes.txt"), b"not an image").unwrap();
    let uploader = Arc::new(FakeUploader::default());
    let generator = Arc::new(FakeGenerator::replying("Image 1: yes - x"));

    let report = controller(uploader.clone(), generator.clone(), 100)
        .run(images.path(), work.path(), None)
        .await
        .unwrap();

    assert!(report.results.is_empty());
    assert_eq!(report.outcome, RunOutcome::NoImages);
    assert_eq!(uploader.calls.load(Ordering::SeqCst), 0);
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_missing_explanation_gets_placeholder() {
    let images = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    write_jpegs(images.path(), &["1.jpg", "2.jpg", "3.jpg"]);
    let generator = Arc::new(FakeGenerator::replying(
        "Image 1: yes - Phone at ear.\nImage 2: no\nImage 3: no - Empty desk.",
    ));

    let results = controller(Arc::new(FakeUploader::default()), generator, 100)
        .analyze(images.path(), work.path(), None)
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    let v2 = results.get(ImageId(2)).unwrap();
    assert_eq!(v2.classification, Classification::No);
    assert_eq!(v2.explanation, NO_EXPLANATION_PLACEHOLDER);
}

#[tokio::test]
async fn test_all_uploads_fail_skips_analysis() {
    let images = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    write_jpegs(images.path(), &["cam_1.jpg", "cam_2.jpg"]);
    let uploader = Arc::new(FakeUploader {
        fail_prefix: Some("cam".to_string()),
        ..Default::default()
    });
    let generator = Arc::new(FakeGenerator::replying("Image 1: yes - x"));

    let report = controller(uploader, generator.clone(), 100)
        .run(images.path(), work.path(), None)
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::NoUploads);
    assert!(report.results.is_empty());
    assert_eq!(report.failed_uploads.len(), 2);
    assert_eq!(generator.calls(), 0);
    assert!(dir_is_empty(work.path()));
}

#[tokio::test]
async fn test_generation_failure_returns_empty_results() {
    let images = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    write_jpegs(images.path(), &["a.jpg"]);
    let generator = Arc::new(FakeGenerator::failing("vision-model"));

    let report = controller(Arc::new(FakeUploader::default()), generator, 100)
        .run(images.path(), work.path(), None)
        .await
        .unwrap();

    assert!(report.results.is_empty());
    assert!(matches!(report.outcome, RunOutcome::GenerationFailed(ref msg) if msg.contains("vision-model")));
    assert_eq!(report.uploaded, 1);
}

#[tokio::test]
async fn test_batch_is_capped_at_max_images() {
    let images = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    write_jpegs(images.path(), &["a.jpg", "b.jpg", "c.jpg", "d.jpg", "e.png"]);
    let uploader = Arc::new(FakeUploader::default());
    let generator = Arc::new(FakeGenerator::replying("Image 1: yes - a\nImage 2: no - b"));

    let report = controller(uploader.clone(), generator.clone(), 100)
        .run(images.path(), work.path(), Some(2))
        .await
        .unwrap();

    assert_eq!(report.images_found, 5);
    assert_eq!(report.images_selected, 2);
    assert_eq!(uploader.calls.load(Ordering::SeqCst), 2);
    assert_eq!(generator.received.lock().unwrap()[0].len(), 2);
    assert_eq!(report.outcome, RunOutcome::Complete);
}

#[tokio::test]
async fn test_short_response_is_flagged_partial() {
    let images = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    write_jpegs(images.path(), &["a.jpg", "b.jpg", "c.jpg"]);
    let generator = Arc::new(FakeGenerator::replying("Image 1: yes - a\nImage 3: no - c"));

    let report = controller(Arc::new(FakeUploader::default()), generator, 100)
        .run(images.path(), work.path(), None)
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Partial);
    assert_eq!(report.results.len(), 2);
    let validation = report.validation.unwrap();
    assert_eq!(validation.missing, vec![ImageId(2)]);
}

#[tokio::test]
async fn test_ids_beyond_upload_count_are_dropped() {
    let images = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    write_jpegs(images.path(), &["a.jpg", "b.jpg", "c.jpg"]);
    let generator = Arc::new(FakeGenerator::replying(
        "Image 1: yes - a\nImage 2: no - b\nImage 3: no - c\nImage 5: yes - hallucinated",
    ));

    let report = controller(Arc::new(FakeUploader::default()), generator, 100)
        .run(images.path(), work.path(), None)
        .await
        .unwrap();

    assert_eq!(report.results.len(), 3);
    assert!(!report.results.contains(ImageId(5)));
    assert!(report.results.iter().all(|v| v.source_path.is_some()));
    assert_eq!(report.outcome, RunOutcome::Partial);
    assert_eq!(report.validation.unwrap().unexpected, vec![ImageId(5)]);
}

#[tokio::test]
async fn test_malformed_block_keeps_real_verdicts() {
    let images = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    write_jpegs(images.path(), &["a.jpg", "b.jpg", "c.jpg"]);
    let generator = Arc::new(FakeGenerator::replying(
        "Image 1: yes - phone in hand\nImage 2?: no - blurry\nImage 2: no - empty room",
    ));

    let report = controller(Arc::new(FakeUploader::default()), generator, 100)
        .run(images.path(), work.path(), None)
        .await
        .unwrap();

    assert_eq!(report.results.len(), 3);
    assert_eq!(report.results.get(ImageId(2)).unwrap().explanation, "empty room");
    assert_eq!(
        report.results.get(ImageId(3)).unwrap().classification,
        Classification::Unknown
    );
}

#[tokio::test]
async fn test_missing_image_folder_is_an_error() {
    let root = tempfile::tempdir().unwrap();
    let generator = Arc::new(FakeGenerator::replying(""));

    let err = controller(Arc::new(FakeUploader::default()), generator, 100)
        .run(&root.path().join("missing"), root.path(), None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::Pipeline(PipelineError::ImageFolderNotFound { .. })
    ));
}

#[tokio::test]
async fn test_unusable_work_folder_is_an_error() {
    let images = tempfile::tempdir().unwrap();
    write_jpegs(images.path(), &["a.jpg"]);
    let blocker = images.path().join("blocker");
    std::fs::write(&blocker, b"file, not a directory").unwrap();
    let uploader = Arc::new(FakeUploader::default());

    let err = controller(uploader.clone(), Arc::new(FakeGenerator::replying("")), 100)
        .run(images.path(), &blocker.join("work"), None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::Pipeline(PipelineError::WorkFolderNotWritable { .. })
    ));
    assert_eq!(uploader.calls.load(Ordering::SeqCst), 0);
}
