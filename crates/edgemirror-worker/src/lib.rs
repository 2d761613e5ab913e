//! Web worker entry point for edgemirror pipeline processing.
//!
//! This crate compiles to a standalone WASM module that runs inside a
//! `Worker`. It receives an RGBA buffer and its dimensions via
//! `postMessage`, runs [`edgemirror_pipeline::process_with_diagnostics`],
//! posts one progress message per completed stage, and finally posts
//! the output buffer back.
//!
//! Pixel data travels as raw typed arrays. Diagnostics and errors are
//! sent as small JSON strings.
//!
//! Running the pipeline in a worker keeps the browser's main thread
//! free for UI updates while the convolutions run.

use std::time::Duration;

use edgemirror_pipeline::diagnostics::duration_ms;
use edgemirror_pipeline::{
    Clock, ConvolutionSchedule, PipelineConfig, PipelineDiagnostics, PipelineError,
    ProcessResult, StageEvent, StageObserver,
};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

/// Message protocol: the main thread sends a JS object with:
/// - `pixels`: `Uint8Array` or `Uint8ClampedArray` of RGBA bytes
/// - `width`, `height`: `f64` buffer dimensions
/// - `generation`: `f64` generation counter (passed through to every
///   response)
///
/// After each stage the worker posts:
/// - `generation`, `kind: "progress"`, `stage`, `index`, `elapsedMs`
///
/// On success the worker responds with:
/// - `generation`, `kind: "done"`, `ok: true`
/// - `width`, `height`: `f64`
/// - `pixels`: `Uint8ClampedArray` ready for `new ImageData(...)`
/// - `diagnosticsJson`: `String` containing JSON-serialized
///   `PipelineDiagnostics`
///
/// On error the worker responds with:
/// - `generation`, `kind: "done"`, `ok: false`
/// - `errorJson`: `String` containing JSON-serialized `PipelineError`
///
/// # Worker entry point
///
/// Called automatically when the WASM module is instantiated in the
/// worker context.
#[wasm_bindgen(start)]
pub fn worker_main() {
    console_error_panic_hook::set_once();

    let global = worker_scope();

    let onmessage =
        Closure::<dyn FnMut(web_sys::MessageEvent)>::new(move |event: web_sys::MessageEvent| {
            handle_message(&event);
        });
    global.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
    onmessage.forget(); // leak: lives for the worker lifetime
}

/// A decoded request from the main thread.
struct Request {
    pixels: Vec<u8>,
    config: PipelineConfig,
}

/// [`Clock`] backed by `performance.now()` through [`web_time`].
struct WebClock;

impl Clock for WebClock {
    type Instant = web_time::Instant;

    fn now(&self) -> Self::Instant {
        web_time::Instant::now()
    }

    fn elapsed(&self, since: &Self::Instant) -> Duration {
        since.elapsed()
    }
}

/// Posts a progress message for every completed stage.
struct ProgressPoster {
    generation: f64,
    global: web_sys::DedicatedWorkerGlobalScope,
}

impl StageObserver for ProgressPoster {
    #[allow(clippy::cast_precision_loss)]
    fn stage_completed(&mut self, event: &StageEvent) {
        let message = Message::new(self.generation, "progress");
        message.set("stage", &JsValue::from_str(&event.stage));
        message.set("index", &JsValue::from_f64(event.index as f64));
        message.set("elapsedMs", &JsValue::from_f64(duration_ms(event.elapsed)));
        post(&self.global, &message.0);
    }
}

/// Outgoing message object tagged with a generation and kind.
struct Message(js_sys::Object);

impl Message {
    fn new(generation: f64, kind: &str) -> Self {
        let message = Self(js_sys::Object::new());
        message.set("generation", &JsValue::from_f64(generation));
        message.set("kind", &JsValue::from_str(kind));
        message
    }

    fn set(&self, key: &str, value: &JsValue) {
        // Setting a plain property on a fresh object cannot fail.
        let _ = js_sys::Reflect::set(&self.0, &JsValue::from_str(key), value);
    }
}

fn worker_scope() -> web_sys::DedicatedWorkerGlobalScope {
    js_sys::global()
        .dyn_into()
        .expect_throw("not running in a DedicatedWorkerGlobalScope")
}

fn post(global: &web_sys::DedicatedWorkerGlobalScope, message: &js_sys::Object) {
    if let Err(e) = global.post_message(message) {
        web_sys::console::warn_2(&JsValue::from_str("edgemirror-worker: postMessage failed"), &e);
    }
}

/// Handle an incoming message from the main thread.
///
/// Parses the request, runs the pipeline with a progress observer, and
/// posts the result back.
fn handle_message(event: &web_sys::MessageEvent) {
    let data = event.data();
    let global = worker_scope();

    let generation = field(&data, "generation")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0);

    let request = match parse_request(&data) {
        Ok(request) => request,
        Err(e) => {
            post_error(&global, generation, &e);
            return;
        }
    };

    let mut progress = ProgressPoster {
        generation,
        global: global.clone(),
    };

    // Synchronous: blocks this worker thread only.
    let outcome = edgemirror_pipeline::process_with_diagnostics(
        &request.pixels,
        &request.config,
        &WebClock,
        &mut progress,
    );

    match outcome {
        Ok((result, diagnostics)) => post_success(&global, generation, &result, &diagnostics),
        Err(e) => post_error(&global, generation, &e),
    }
}

fn field(data: &JsValue, key: &str) -> Option<JsValue> {
    js_sys::Reflect::get(data, &JsValue::from_str(key))
        .ok()
        .filter(|v| !v.is_undefined())
}

/// Extract the pixel buffer and dimensions from a request object.
fn parse_request(data: &JsValue) -> Result<Request, PipelineError> {
    let pixels = field(data, "pixels")
        .and_then(|v| {
            v.dyn_ref::<js_sys::Uint8Array>()
                .map(js_sys::Uint8Array::to_vec)
                .or_else(|| {
                    v.dyn_ref::<js_sys::Uint8ClampedArray>()
                        .map(js_sys::Uint8ClampedArray::to_vec)
                })
        })
        .ok_or_else(|| {
            PipelineError::InvalidConfig(
                "pixels must be a Uint8Array or Uint8ClampedArray".to_string(),
            )
        })?;

    let width = dimension(field(data, "width").and_then(|v| v.as_f64()), "width")?;
    let height = dimension(field(data, "height").and_then(|v| v.as_f64()), "height")?;

    // Rayon has no thread pool inside a plain worker, so the two
    // convolutions run back to back.
    let config = PipelineConfig {
        schedule: ConvolutionSchedule::Sequential,
        ..PipelineConfig::with_dimensions(width, height)
    };
    Ok(Request { pixels, config })
}

/// Convert a JS number into a pixel extent.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn dimension(value: Option<f64>, name: &str) -> Result<u32, PipelineError> {
    match value {
        Some(v) if v.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&v) => Ok(v as u32),
        Some(v) => Err(PipelineError::InvalidConfig(format!(
            "{name} must be a non-negative integer, got {v}"
        ))),
        None => Err(PipelineError::InvalidConfig(format!(
            "missing numeric {name} field"
        ))),
    }
}

/// Post a successful pipeline result back to the main thread.
fn post_success(
    global: &web_sys::DedicatedWorkerGlobalScope,
    generation: f64,
    result: &ProcessResult,
    diagnostics: &PipelineDiagnostics,
) {
    let diagnostics_json = match serde_json::to_string(diagnostics) {
        Ok(json) => json,
        Err(e) => {
            let error =
                PipelineError::InvalidConfig(format!("failed to serialize diagnostics: {e}"));
            post_error(global, generation, &error);
            return;
        }
    };

    let message = Message::new(generation, "done");
    message.set("ok", &JsValue::from_bool(true));
    message.set("width", &JsValue::from_f64(f64::from(result.dimensions.width)));
    message.set(
        "height",
        &JsValue::from_f64(f64::from(result.dimensions.height)),
    );
    message.set(
        "pixels",
        &js_sys::Uint8ClampedArray::from(result.pixels.as_slice()),
    );
    message.set("diagnosticsJson", &JsValue::from_str(&diagnostics_json));
    post(global, &message.0);
}

/// Post an error response back to the main thread.
fn post_error(global: &web_sys::DedicatedWorkerGlobalScope, generation: f64, error: &PipelineError) {
    let error_json = error_json(error);
    let message = Message::new(generation, "done");
    message.set("ok", &JsValue::from_bool(false));
    message.set("errorJson", &JsValue::from_str(&error_json));
    post(global, &message.0);
}

fn error_json(error: &PipelineError) -> String {
    serde_json::to_string(error)
        .unwrap_or_else(|ser_err| format!("\"serialization error: {ser_err}\""))
}
