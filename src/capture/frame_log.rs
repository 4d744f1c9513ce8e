//! Frame log capture
//!
//! A portable capture backend that records frame timestamps instead of
//! pixels. Used for headless playback runs where no screen is available;
//! the resulting artifact is a CSV log of the captured frame times.

use super::traits::{CaptureError, CaptureResult, CaptureService, RecordingArtifact, RecordingHandle};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Default capture rate
pub const DEFAULT_FPS: u32 = 30;

/// Highest rate with a non-zero frame interval at millisecond resolution
pub const MAX_FPS: u32 = 1000;

struct ActiveCapture {
    handle: RecordingHandle,
    is_recording: Arc<AtomicBool>,
    frames: Arc<Mutex<String>>,
    task: JoinHandle<u64>,
}

/// Capture backend that logs one line per frame tick
pub struct FrameLogCapture {
    fps: u32,
    active: Mutex<Option<ActiveCapture>>,
}

impl FrameLogCapture {
    pub fn new(fps: u32) -> Self {
        Self {
            fps: fps.clamp(1, MAX_FPS),
            active: Mutex::new(None),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .map(|a| a.is_recording.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}

impl Default for FrameLogCapture {
    fn default() -> Self {
        Self::new(DEFAULT_FPS)
    }
}

#[async_trait]
impl CaptureService for FrameLogCapture {
    fn name(&self) -> &str {
        "frame-log"
    }

    async fn start(&self) -> CaptureResult<RecordingHandle> {
        let mut active = self.active.lock();
        if active.is_some() {
            return Err(CaptureError::AlreadyRecording);
        }

        let handle = RecordingHandle::new();
        let is_recording = Arc::new(AtomicBool::new(true));
        let frames = Arc::new(Mutex::new(String::from("frame,index,elapsed_ms\n")));

        let task = {
            let is_recording = is_recording.clone();
            let frames = frames.clone();
            let frame_interval = Duration::from_millis(1000 / self.fps as u64);

            tokio::spawn(async move {
                let start_time = tokio::time::Instant::now();
                let mut frame_count = 0u64;

                while is_recording.load(Ordering::SeqCst) {
                    let timestamp = start_time.elapsed().as_millis();
                    let _ = writeln!(frames.lock(), "frame,{},{}", frame_count, timestamp);

                    frame_count += 1;
                    tokio::time::sleep(frame_interval).await;
                }

                tracing::info!("Frame log capture stopped. Captured {} frames", frame_count);
                frame_count
            })
        };

        *active = Some(ActiveCapture {
            handle: handle.clone(),
            is_recording,
            frames,
            task,
        });

        tracing::info!("Frame log capture started at {} fps", self.fps);
        Ok(handle)
    }

    async fn stop(&self, handle: &RecordingHandle) -> CaptureResult<Option<RecordingArtifact>> {
        let capture = {
            let mut active = self.active.lock();
            match active.as_ref() {
                Some(a) if a.handle.id == handle.id => active.take(),
                _ => None,
            }
        };

        let Some(capture) = capture else {
            return Err(CaptureError::NotRecording);
        };

        capture.is_recording.store(false, Ordering::SeqCst);
        let frame_count = capture.task.await.unwrap_or(0);

        let log = std::mem::take(&mut *capture.frames.lock());
        tracing::debug!("Frame log holds {} frames", frame_count);

        Ok(Some(RecordingArtifact::new(
            handle.id,
            "text/csv",
            log.into_bytes(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_capture_logs_frames() {
        let capture = FrameLogCapture::new(10);
        let handle = capture.start().await.unwrap();
        assert!(capture.is_recording());

        tokio::time::sleep(Duration::from_millis(1050)).await;

        let artifact = capture.stop(&handle).await.unwrap().unwrap();
        assert!(!capture.is_recording());

        let log = String::from_utf8(artifact.data().to_vec()).unwrap();
        let frames = log.lines().skip(1).count();
        assert!(frames >= 10, "expected at least 10 frames, got {frames}");
        assert_eq!(artifact.extension(), "csv");
    }

    #[tokio::test(start_paused = true)]
    async fn test_frame_rate_is_clamped() {
        assert_eq!(FrameLogCapture::new(0).fps, 1);
        assert_eq!(FrameLogCapture::new(5000).fps, MAX_FPS);

        let capture = FrameLogCapture::new(u32::MAX);
        let handle = capture.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let artifact = capture.stop(&handle).await.unwrap().unwrap();
        let frames = String::from_utf8(artifact.data().to_vec())
            .unwrap()
            .lines()
            .skip(1)
            .count();
        assert!(frames <= 102, "frame log ran away: {frames} frames");
    }

    #[tokio::test]
    async fn test_single_recording_at_a_time() {
        let capture = FrameLogCapture::default();
        let handle = capture.start().await.unwrap();
        assert!(matches!(capture.start().await, Err(CaptureError::AlreadyRecording)));

        capture.stop(&handle).await.unwrap();
        assert!(matches!(capture.stop(&handle).await, Err(CaptureError::NotRecording)));
    }
}
