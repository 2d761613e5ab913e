//! Pipeline diagnostics: timing, progress events, and per-stage metrics.
//!
//! [`process_with_diagnostics`] runs the same stages as
//! [`process`](crate::process), timing each one and emitting a
//! [`StageEvent`] to a [`StageObserver`] as soon as the stage finishes.
//! Observers only ever see events by shared reference, so a UI or a
//! logger can follow progress without being able to change the numeric
//! result or the stage order.
//!
//! Time is abstracted behind [`Clock`] so the crate stays sans-IO:
//! native callers use `std::time::Instant`, the web worker uses
//! `web_time::Instant`, and tests use a fake clock.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::{Pipeline, PipelineStage};
use crate::types::{PipelineConfig, PipelineError, ProcessResult};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of monotonic timestamps.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// Current timestamp.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Emitted once after each of the five processing stages completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEvent {
    /// Stage name (`"decode"`, `"convolve"`, `"merge"`, `"mirror"`,
    /// `"encode"`).
    pub stage: String,
    /// Stage index (1 through 5).
    pub index: usize,
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub elapsed: Duration,
}

/// Receives [`StageEvent`]s while the pipeline runs.
pub trait StageObserver {
    /// Called after a stage finishes, before the next one starts.
    fn stage_completed(&mut self, event: &StageEvent);
}

impl<F: FnMut(&StageEvent)> StageObserver for F {
    fn stage_completed(&mut self, event: &StageEvent) {
        self(event);
    }
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl StageObserver for NoopObserver {
    fn stage_completed(&mut self, _event: &StageEvent) {}
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 1: buffer decoding.
    pub decode: StageDiagnostics,
    /// Stage 2: both Prewitt convolutions (fork-join).
    pub convolve: StageDiagnostics,
    /// Stage 3: gradient magnitude merge.
    pub merge: StageDiagnostics,
    /// Stage 4: in-place mirror.
    pub mirror: StageDiagnostics,
    /// Stage 5: clamping and encoding.
    pub encode: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Source buffer before decoding.
    Source {
        /// Size of the input buffer in bytes.
        input_bytes: usize,
    },
    /// Buffer decoding metrics.
    Decode {
        /// Size of the input buffer in bytes.
        input_bytes: usize,
        /// Grid width in pixels.
        width: u32,
        /// Grid height in pixels.
        height: u32,
        /// Total pixel count (`width * height`).
        pixel_count: u64,
    },
    /// Convolution metrics.
    Convolve {
        /// Kernel side length.
        kernel_size: usize,
        /// Schedule used for the two convolutions.
        schedule: String,
        /// Largest absolute channel value in the horizontal gradient.
        horizontal_peak: f64,
        /// Largest absolute channel value in the vertical gradient.
        vertical_peak: f64,
    },
    /// Gradient merge metrics.
    Merge {
        /// Largest channel magnitude before clamping.
        peak_magnitude: f64,
        /// Channels above 255 that the encoder will saturate.
        saturated_channels: u64,
    },
    /// Mirror metrics.
    Mirror {
        /// Number of pixel swaps performed.
        swapped_pairs: usize,
    },
    /// Encoding metrics.
    Encode {
        /// Size of the output buffer in bytes.
        output_bytes: usize,
    },
}

/// High-level summary for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Image width in pixels.
    pub image_width: u32,
    /// Image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Convolution schedule used.
    pub schedule: String,
}

/// Run the full pipeline, collecting diagnostics and reporting progress.
///
/// Produces exactly the same [`ProcessResult`] as
/// [`process`](crate::process). After each of the five processing
/// stages `observer` receives one [`StageEvent`]; if a stage fails no
/// further events are emitted and the error is returned.
///
/// # Errors
///
/// Returns the first [`PipelineError`] raised by any stage.
pub fn process_with_diagnostics<C: Clock, O: StageObserver + ?Sized>(
    rgba: &[u8],
    config: &PipelineConfig,
    clock: &C,
    observer: &mut O,
) -> Result<(ProcessResult, PipelineDiagnostics), PipelineError> {
    let total_start = clock.now();
    let pending = Pipeline::new(rgba.to_vec(), config.clone());

    let start = clock.now();
    let decoded = pending.decode()?;
    let decode = record(&decoded, clock, &start, observer);

    let start = clock.now();
    let convolved = decoded.convolve();
    let convolve = record(&convolved, clock, &start, observer);

    let start = clock.now();
    let merged = convolved.merge()?;
    let merge = record(&merged, clock, &start, observer);

    let start = clock.now();
    let mirrored = merged.mirror();
    let mirror = record(&mirrored, clock, &start, observer);

    let start = clock.now();
    let encoded = mirrored.encode();
    let encode = record(&encoded, clock, &start, observer);

    let total_duration = clock.elapsed(&total_start);
    let dimensions = encoded.dimensions();
    let diagnostics = PipelineDiagnostics {
        decode,
        convolve,
        merge,
        mirror,
        encode,
        total_duration,
        summary: PipelineSummary {
            image_width: dimensions.width,
            image_height: dimensions.height,
            pixel_count: u64::from(dimensions.width) * u64::from(dimensions.height),
            schedule: config.schedule.to_string(),
        },
    };
    Ok((encoded.into_result(), diagnostics))
}

/// Time a finished stage, notify the observer, and collect its metrics.
fn record<S: PipelineStage, C: Clock, O: StageObserver + ?Sized>(
    stage: &S,
    clock: &C,
    start: &C::Instant,
    observer: &mut O,
) -> StageDiagnostics {
    let duration = clock.elapsed(start);
    log::debug!(
        "stage {} ({}) completed in {:.3}ms",
        S::INDEX,
        S::NAME,
        duration_ms(duration)
    );
    observer.stage_completed(&StageEvent {
        stage: S::NAME.to_string(),
        index: S::INDEX,
        elapsed: duration,
    });
    StageDiagnostics {
        duration,
        metrics: stage.metrics(),
    }
}

impl PipelineDiagnostics {
    /// Per-stage diagnostics in execution order, with display names.
    #[must_use]
    pub fn stages(&self) -> [(&'static str, &StageDiagnostics); 5] {
        [
            ("Decode", &self.decode),
            ("Convolve", &self.convolve),
            ("Merge", &self.merge),
            ("Mirror", &self.mirror),
            ("Encode", &self.encode),
        ]
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels), schedule: {}",
            self.summary.image_width,
            self.summary.image_height,
            self.summary.pixel_count,
            self.summary.schedule,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
#[must_use]
pub fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Source { input_bytes } => format!("{input_bytes} bytes"),
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            ..
        } => format!("{input_bytes} bytes -> {width}x{height}"),
        StageMetrics::Convolve {
            kernel_size,
            schedule,
            horizontal_peak,
            vertical_peak,
        } => format!(
            "{kernel_size}x{kernel_size} Prewitt, {schedule}, peak |gx|={horizontal_peak:.1} |gy|={vertical_peak:.1}",
        ),
        StageMetrics::Merge {
            peak_magnitude,
            saturated_channels,
        } => format!("peak={peak_magnitude:.1} saturated={saturated_channels}"),
        StageMetrics::Mirror { swapped_pairs } => format!("{swapped_pairs} swaps"),
        StageMetrics::Encode { output_bytes } => format!("{output_bytes} bytes"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::types::Dimensions;

    /// Clock that advances one millisecond per `now()` call.
    struct TickClock {
        ticks: Cell<u64>,
    }

    impl TickClock {
        const fn new() -> Self {
            Self {
                ticks: Cell::new(0),
            }
        }
    }

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.ticks.get();
            self.ticks.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.ticks.get() - since)
        }
    }

    fn gradient_buffer(dimensions: Dimensions) -> Vec<u8> {
        let len = dimensions.buffer_len().unwrap();
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        let ms = duration_ms(d);
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn observer_sees_five_events_in_order() {
        let config = PipelineConfig::with_dimensions(5, 3);
        let buffer = gradient_buffer(config.dimensions);
        let mut events = Vec::new();
        let mut observer = |e: &StageEvent| events.push(e.clone());

        let (result, _) =
            process_with_diagnostics(&buffer, &config, &TickClock::new(), &mut observer).unwrap();

        let names: Vec<&str> = events.iter().map(|e| e.stage.as_str()).collect();
        assert_eq!(names, ["decode", "convolve", "merge", "mirror", "encode"]);
        let indices: Vec<usize> = events.iter().map(|e| e.index).collect();
        assert_eq!(indices, [1, 2, 3, 4, 5]);
        assert_eq!(result, crate::process(&buffer, &config).unwrap());
    }

    #[test]
    fn failed_decode_emits_no_events() {
        let config = PipelineConfig::with_dimensions(5, 3);
        let mut count = 0;
        let mut observer = |_: &StageEvent| count += 1;
        let result = process_with_diagnostics(&[1, 2, 3], &config, &TickClock::new(), &mut observer);
        assert!(matches!(
            result,
            Err(PipelineError::MalformedBuffer { .. })
        ));
        assert_eq!(count, 0);
    }

    #[test]
    fn diagnostics_capture_durations_and_metrics() {
        let config = PipelineConfig::with_dimensions(4, 4);
        let buffer = gradient_buffer(config.dimensions);
        let (_, diag) =
            process_with_diagnostics(&buffer, &config, &TickClock::new(), &mut NoopObserver)
                .unwrap();

        // Each stage spans exactly one tick of the fake clock.
        for (name, stage) in diag.stages() {
            assert_eq!(stage.duration, Duration::from_millis(1), "{name}");
        }
        assert!(diag.total_duration >= Duration::from_millis(5));
        assert!(matches!(
            diag.decode.metrics,
            StageMetrics::Decode {
                input_bytes: 64,
                pixel_count: 16,
                ..
            }
        ));
        assert!(matches!(
            diag.mirror.metrics,
            StageMetrics::Mirror { swapped_pairs: 8 }
        ));
        assert_eq!(diag.summary.image_width, 4);
        assert_eq!(diag.summary.schedule, "Parallel");
    }

    #[test]
    fn report_lists_every_stage() {
        let config = PipelineConfig::with_dimensions(3, 3);
        let buffer = gradient_buffer(config.dimensions);
        let (_, diag) =
            process_with_diagnostics(&buffer, &config, &TickClock::new(), &mut NoopObserver)
                .unwrap();

        let report = diag.report();
        assert!(report.contains("Pipeline Diagnostics Report"));
        for name in ["Decode", "Convolve", "Merge", "Mirror", "Encode"] {
            assert!(report.contains(name), "missing {name} in report");
        }
        assert!(report.contains("3x3 Prewitt"));
    }

    #[test]
    fn diagnostics_serialize_durations_as_seconds() {
        let config = PipelineConfig::with_dimensions(2, 2);
        let buffer = gradient_buffer(config.dimensions);
        let (_, diag) =
            process_with_diagnostics(&buffer, &config, &TickClock::new(), &mut NoopObserver)
                .unwrap();
        let json = serde_json::to_value(&diag).unwrap();
        let secs = json["decode"]["duration"].as_f64().unwrap();
        assert!((secs - 0.001).abs() < 1e-9);

        let back: PipelineDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back.mirror.metrics, diag.mirror.metrics);
    }

    #[test]
    fn stage_event_serializes_elapsed_seconds() {
        let event = StageEvent {
            stage: "merge".to_string(),
            index: 3,
            elapsed: Duration::from_millis(250),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"stage":"merge","index":3,"elapsed":0.25}"#);
    }
}
