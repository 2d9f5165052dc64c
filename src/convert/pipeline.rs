//! Conversion orchestrator
//!
//! Drives one upload through the linear state machine:
//! license check -> unpack -> filter -> assemble -> deliver -> log.
//! The credit is charged before processing (primary flow); once charged,
//! downstream failures are surfaced but never auto-refunded. Delivery
//! failures trigger a best-effort removal of any partially stored
//! artifact.

use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::convert::{assembler, inspector, qualifier};
use crate::db::ProvenanceStore;
use crate::db::schemas::ConversionRecord;
use crate::delivery::DeliverySink;
use crate::license::{CreditOutcome, LicenseGate};
use crate::types::{ConvertError, Result};

/// One conversion request, exclusively owned by its pipeline run.
pub struct ConversionRequest {
    /// Opaque license key forwarded to the gate
    pub license_key: String,
    /// Upload filename as received (must end in .brushset)
    pub original_filename: String,
    /// Raw container bytes
    pub data: Vec<u8>,
}

/// Terminal success of a pipeline run.
#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    pub download_url: String,
    pub original_filename: String,
    pub stamp_count: usize,
    pub credits_remaining: Option<i64>,
}

/// Pipeline with its collaborators injected at startup.
pub struct ConversionPipeline {
    gate: Arc<dyn LicenseGate>,
    sink: Arc<dyn DeliverySink>,
    provenance: Option<ProvenanceStore>,
    brand_prefix: String,
    min_stamp_px: u32,
    max_unpacked_bytes: u64,
}

impl ConversionPipeline {
    pub fn new(
        gate: Arc<dyn LicenseGate>,
        sink: Arc<dyn DeliverySink>,
        provenance: Option<ProvenanceStore>,
        brand_prefix: &str,
        min_stamp_px: u32,
        max_unpacked_bytes: u64,
    ) -> Self {
        Self {
            gate,
            sink,
            provenance,
            brand_prefix: brand_prefix.to_string(),
            min_stamp_px,
            max_unpacked_bytes,
        }
    }

    /// Run one conversion end to end.
    pub async fn run(&self, request: ConversionRequest) -> Result<ConversionOutcome> {
        // Input validation carries no side effect, so it happens before the
        // charge.
        let base_name = brushset_stem(&request.original_filename)?;

        // Received -> LicenseChecked. Called exactly once; ambiguous
        // failures are not retried (the gate's decrement is atomic remotely,
        // a retry here could double-charge).
        let credits_remaining = match self.gate.use_credit(&request.license_key).await? {
            CreditOutcome::Granted { remaining } => remaining,
            CreditOutcome::Denied { message } => {
                info!(key = %request.license_key, "license denied");
                return Err(ConvertError::LicenseDenied(message));
            }
        };

        // Unpacked -> Filtered -> Assembled. Zip and image-header work is
        // CPU-bound, so it runs off the request task.
        let brand = self.brand_prefix.clone();
        let min_px = self.min_stamp_px;
        let unpack_budget = self.max_unpacked_bytes;
        let data = request.data;
        let base = base_name;
        let pack = tokio::task::spawn_blocking(move || {
            let candidates = inspector::inspect_archive(&data, unpack_budget)?;

            let qualified: Vec<_> = candidates
                .into_iter()
                .filter_map(|entry| qualifier::qualify(entry, min_px).ok())
                .collect();

            assembler::assemble_pack(&qualified, &base, &brand, min_px)
        })
        .await
        .map_err(|e| ConvertError::Internal(format!("processing task failed: {}", e)))??;

        info!(
            stamps = pack.stamp_count,
            pack = %pack.file_name,
            "pack assembled"
        );

        // Assembled -> Delivered.
        let storage_path = format!("{}/{}", Uuid::new_v4().simple(), pack.file_name);
        let download_url = match self.sink.store(&storage_path, &pack.bytes).await {
            Ok(url) => url,
            Err(e) => {
                // Credit is already spent; clean up what we can and leave
                // the refund to operator reconciliation.
                self.sink.remove(&storage_path).await;
                warn!(
                    key = %request.license_key,
                    path = %storage_path,
                    "delivery failed after credit charge; needs reconciliation"
                );
                return Err(e);
            }
        };

        // Delivered -> Logged. The download URL is already valid, so a log
        // failure must not fail the request.
        if let Some(ref provenance) = self.provenance {
            let record = ConversionRecord::new(
                &request.license_key,
                &request.original_filename,
                &download_url,
                &storage_path,
            );
            if let Err(e) = provenance.insert(record).await {
                error!(
                    key = %request.license_key,
                    url = %download_url,
                    error = %e,
                    "provenance insert failed (conversion already delivered)"
                );
            }
        }

        Ok(ConversionOutcome {
            download_url,
            original_filename: request.original_filename,
            stamp_count: pack.stamp_count,
            credits_remaining,
        })
    }
}

/// Strip the `.brushset` extension, rejecting any other upload type.
fn brushset_stem(filename: &str) -> Result<String> {
    let lower = filename.to_lowercase();
    if !lower.ends_with(".brushset") {
        return Err(ConvertError::InvalidInput(
            "Invalid file type. Only .brushset files are allowed.".to_string(),
        ));
    }
    Ok(filename[..filename.len() - ".brushset".len()].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::qualifier::test_images::png_bytes;
    use crate::license::LicenseStatus;
    use async_trait::async_trait;
    use std::io::{Cursor, Write};
    use std::sync::Mutex;
    use zip::write::SimpleFileOptions;

    /// Gate that records calls and answers from a script.
    struct MockGate {
        outcome: CreditOutcome,
        calls: Mutex<u32>,
    }

    impl MockGate {
        fn granting() -> Self {
            Self {
                outcome: CreditOutcome::Granted { remaining: Some(4) },
                calls: Mutex::new(0),
            }
        }

        fn denying(message: &str) -> Self {
            Self {
                outcome: CreditOutcome::Denied {
                    message: message.to_string(),
                },
                calls: Mutex::new(0),
            }
        }

        fn call_count(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl LicenseGate for MockGate {
        async fn use_credit(&self, _key: &str) -> Result<CreditOutcome> {
            *self.calls.lock().unwrap() += 1;
            Ok(self.outcome.clone())
        }

        async fn status(&self, _key: &str) -> Result<Option<LicenseStatus>> {
            Ok(None)
        }
    }

    /// Sink that keeps stored packs in memory; optionally fails every store.
    #[derive(Default)]
    struct MockSink {
        stored: Mutex<Vec<(String, Vec<u8>)>>,
        removed: Mutex<Vec<String>>,
        fail_store: bool,
    }

    #[async_trait]
    impl DeliverySink for MockSink {
        async fn store(&self, path: &str, bytes: &[u8]) -> Result<String> {
            if self.fail_store {
                return Err(ConvertError::DeliveryFailed("mock store failure".into()));
            }
            self.stored
                .lock()
                .unwrap()
                .push((path.to_string(), bytes.to_vec()));
            Ok(format!("http://test/downloads/{}", path))
        }

        async fn remove(&self, path: &str) {
            self.removed.lock().unwrap().push(path.to_string());
        }
    }

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            for (name, data) in entries {
                writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                writer.write_all(data).unwrap();
            }
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    fn pipeline(gate: Arc<MockGate>, sink: Arc<MockSink>) -> ConversionPipeline {
        ConversionPipeline::new(gate, sink, None, "ArtyPacks", 1024, 64 * 1024 * 1024)
    }

    fn request(data: Vec<u8>) -> ConversionRequest {
        ConversionRequest {
            license_key: "KEY-1".to_string(),
            original_filename: "My Inks.brushset".to_string(),
            data,
        }
    }

    #[tokio::test]
    async fn scenario_a_mixed_archive() {
        // a.png (2000x2000) and z.jpg (1024x1024) qualify; the cover
        // thumbnail is excluded despite its size.
        let jpeg = crate::convert::qualifier::test_images::jpeg_bytes(1024, 1024);
        let zip = build_zip(&[
            ("a.png", &png_bytes(2000, 2000)),
            ("cover/artwork.png", &png_bytes(3000, 3000)),
            ("z.jpg", &jpeg),
        ]);

        let gate = Arc::new(MockGate::granting());
        let sink = Arc::new(MockSink::default());
        let outcome = pipeline(gate.clone(), sink.clone())
            .run(request(zip))
            .await
            .unwrap();

        assert_eq!(outcome.stamp_count, 2);
        assert_eq!(outcome.original_filename, "My Inks.brushset");
        assert_eq!(outcome.credits_remaining, Some(4));
        assert_eq!(gate.call_count(), 1);

        let stored = sink.stored.lock().unwrap();
        assert_eq!(stored.len(), 1);
        let mut archive = zip::ZipArchive::new(Cursor::new(&stored[0].1)).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "ArtyPacks_My_Inks/My_Inks_1.png",
                "ArtyPacks_My_Inks/My_Inks_2.jpg",
            ]
        );
    }

    #[tokio::test]
    async fn scenario_b_no_qualifying_images() {
        let zip = build_zip(&[("small.png", &png_bytes(500, 500))]);

        let gate = Arc::new(MockGate::granting());
        let sink = Arc::new(MockSink::default());
        let err = pipeline(gate.clone(), sink.clone())
            .run(request(zip))
            .await
            .unwrap_err();

        assert!(matches!(err, ConvertError::EmptyResult(1024)));
        // Charge-before-processing: the single gate call already happened,
        // but nothing was delivered or logged.
        assert_eq!(gate.call_count(), 1);
        assert!(sink.stored.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn scenario_c_denied_license_skips_processing() {
        let gate = Arc::new(MockGate::denying("No credits remaining."));
        let sink = Arc::new(MockSink::default());
        // Data is garbage; it must never be touched when the gate says no.
        let err = pipeline(gate.clone(), sink.clone())
            .run(request(b"garbage".to_vec()))
            .await
            .unwrap_err();

        assert!(matches!(err, ConvertError::LicenseDenied(_)));
        assert!(sink.stored.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn scenario_d_non_zip_upload() {
        let gate = Arc::new(MockGate::granting());
        let sink = Arc::new(MockSink::default());
        let err = pipeline(gate, sink)
            .run(request(b"not a zip at all".to_vec()))
            .await
            .unwrap_err();

        assert!(matches!(err, ConvertError::CorruptArchive));
    }

    #[tokio::test]
    async fn wrong_extension_fails_before_charging() {
        let gate = Arc::new(MockGate::granting());
        let sink = Arc::new(MockSink::default());
        let err = pipeline(gate.clone(), sink)
            .run(ConversionRequest {
                license_key: "KEY-1".to_string(),
                original_filename: "pack.zip".to_string(),
                data: Vec::new(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ConvertError::InvalidInput(_)));
        assert_eq!(gate.call_count(), 0);
    }

    #[tokio::test]
    async fn delivery_failure_attempts_compensating_removal() {
        let zip = build_zip(&[("a.png", &png_bytes(1100, 1100))]);

        let gate = Arc::new(MockGate::granting());
        let sink = Arc::new(MockSink {
            fail_store: true,
            ..Default::default()
        });
        let err = pipeline(gate, sink.clone()).run(request(zip)).await.unwrap_err();

        assert!(matches!(err, ConvertError::DeliveryFailed(_)));
        assert_eq!(sink.removed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn identical_input_is_deterministic() {
        let zip = build_zip(&[
            ("z.png", &png_bytes(1100, 1100)),
            ("a.png", &png_bytes(1200, 1200)),
        ]);

        let mut listings = Vec::new();
        for _ in 0..2 {
            let gate = Arc::new(MockGate::granting());
            let sink = Arc::new(MockSink::default());
            pipeline(gate, sink.clone()).run(request(zip.clone())).await.unwrap();

            let stored = sink.stored.lock().unwrap();
            let mut archive = zip::ZipArchive::new(Cursor::new(&stored[0].1)).unwrap();
            let names: Vec<String> = (0..archive.len())
                .map(|i| archive.by_index(i).unwrap().name().to_string())
                .collect();
            listings.push(names);
        }

        assert_eq!(listings[0], listings[1]);
        // Sorted by source path: a.png before z.png.
        assert_eq!(
            listings[0],
            vec![
                "ArtyPacks_My_Inks/My_Inks_1.png",
                "ArtyPacks_My_Inks/My_Inks_2.png",
            ]
        );
    }
}
