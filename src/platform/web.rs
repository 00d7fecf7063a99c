//! Browser sensor and iframe handles
//!
//! Every handle releases what it acquired in `Drop`, so dropping the owner
//! (view torn down, sensors restarted, error half-way through setup) always
//! stops tracks, closes contexts and removes listeners.

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    AnalyserNode, AudioContext, GeolocationPosition, GeolocationPositionError, HtmlIFrameElement,
    MediaStream, MediaStreamAudioSourceNode, MediaStreamConstraints, MediaStreamTrack, MessageEvent,
};

use crate::bridge::OutboundMessage;
use crate::consts::FFT_SIZE;
use crate::sensors::{GeoFix, SensorError};

/// Read the `name`/`message` of a rejected promise or thrown exception
fn js_error_text(value: &JsValue) -> (String, String) {
    let field = |key: &str| {
        js_sys::Reflect::get(value, &JsValue::from_str(key))
            .ok()
            .and_then(|v| v.as_string())
            .unwrap_or_default()
    };
    let message = value.as_string().unwrap_or_else(|| field("message"));
    (field("name"), message)
}

fn sensor_error(sensor: &'static str, value: &JsValue) -> SensorError {
    let (name, message) = js_error_text(value);
    match name.as_str() {
        "NotAllowedError" | "SecurityError" => SensorError::PermissionDenied(sensor),
        "NotFoundError" | "NotSupportedError" => SensorError::Unsupported(sensor),
        _ => SensorError::Failed { sensor, message },
    }
}

/// Stops every track of a media stream when dropped
struct StreamGuard(MediaStream);

impl Drop for StreamGuard {
    fn drop(&mut self) {
        for track in self.0.get_tracks().iter() {
            if let Ok(track) = track.dyn_into::<MediaStreamTrack>() {
                track.stop();
            }
        }
    }
}

async fn user_media(sensor: &'static str, audio: bool, video: bool) -> Result<StreamGuard, SensorError> {
    let window = web_sys::window().ok_or(SensorError::Unsupported(sensor))?;
    let devices = window
        .navigator()
        .media_devices()
        .map_err(|_| SensorError::Unsupported(sensor))?;

    let constraints = MediaStreamConstraints::new();
    constraints.set_audio(&JsValue::from_bool(audio));
    constraints.set_video(&JsValue::from_bool(video));

    let promise = devices
        .get_user_media_with_constraints(&constraints)
        .map_err(|e| sensor_error(sensor, &e))?;
    let stream = JsFuture::from(promise)
        .await
        .map_err(|e| sensor_error(sensor, &e))?
        .dyn_into::<MediaStream>()
        .map_err(|e| sensor_error(sensor, &e))?;
    Ok(StreamGuard(stream))
}

/// Ask for the camera once so a denial shows up as a capability flag.
///
/// The AR iframe opens its own camera feed; the probe stream is released at once.
pub async fn probe_camera() -> Result<(), SensorError> {
    let _stream = user_media("camera", false, true).await?;
    Ok(())
}

/// Microphone analyser feeding the audio envelope
pub struct MicrophoneTap {
    stream: StreamGuard,
    context: AudioContext,
    analyser: AnalyserNode,
    _source: MediaStreamAudioSourceNode,
    bins: Vec<u8>,
}

impl MicrophoneTap {
    /// Request the microphone and wire it into an analyser
    pub async fn open() -> Result<Self, SensorError> {
        let stream = user_media("microphone", true, false).await?;
        let fail = |e: JsValue| sensor_error("microphone", &e);

        let context = AudioContext::new().map_err(fail)?;
        let wire = || -> Result<(AnalyserNode, MediaStreamAudioSourceNode), JsValue> {
            let analyser = context.create_analyser()?;
            analyser.set_fft_size(FFT_SIZE);
            let source = context.create_media_stream_source(&stream.0)?;
            source.connect_with_audio_node(&analyser)?;
            Ok((analyser, source))
        };
        let (analyser, source) = match wire() {
            Ok(nodes) => nodes,
            Err(e) => {
                let _ = context.close();
                return Err(fail(e));
            }
        };

        let bins = vec![0u8; analyser.frequency_bin_count() as usize];
        log::info!("Microphone open ({} bins)", bins.len());
        Ok(Self {
            stream,
            context,
            analyser,
            _source: source,
            bins,
        })
    }

    /// Latest frequency frame
    pub fn spectrum(&mut self) -> &[u8] {
        self.analyser.get_byte_frequency_data(&mut self.bins);
        &self.bins
    }
}

impl Drop for MicrophoneTap {
    fn drop(&mut self) {
        // Tracks stop when `stream` drops right after this
        let _ = self.context.close();
        log::info!("Microphone released ({} tracks)", self.stream.0.get_tracks().length());
    }
}

/// Active `watchPosition` subscription
pub struct GeoWatch {
    geolocation: web_sys::Geolocation,
    id: i32,
    _on_fix: Closure<dyn FnMut(JsValue)>,
    _on_error: Closure<dyn FnMut(JsValue)>,
}

impl GeoWatch {
    pub fn start(
        mut on_fix: impl FnMut(GeoFix) + 'static,
        mut on_error: impl FnMut(SensorError) + 'static,
    ) -> Result<Self, SensorError> {
        let window = web_sys::window().ok_or(SensorError::Unsupported("geolocation"))?;
        let geolocation = window
            .navigator()
            .geolocation()
            .map_err(|_| SensorError::Unsupported("geolocation"))?;

        let on_fix = Closure::<dyn FnMut(JsValue)>::new(move |value: JsValue| {
            if let Ok(position) = value.dyn_into::<GeolocationPosition>() {
                let coords = position.coords();
                on_fix(GeoFix::new(coords.latitude(), coords.longitude()));
            }
        });
        let on_error = Closure::<dyn FnMut(JsValue)>::new(move |value: JsValue| {
            let err = match value.dyn_into::<GeolocationPositionError>() {
                Ok(e) if e.code() == GeolocationPositionError::PERMISSION_DENIED => {
                    SensorError::PermissionDenied("geolocation")
                }
                Ok(e) => SensorError::Failed {
                    sensor: "geolocation",
                    message: e.message(),
                },
                Err(v) => sensor_error("geolocation", &v),
            };
            on_error(err);
        });

        let id = geolocation
            .watch_position_with_error_callback(
                on_fix.as_ref().unchecked_ref(),
                Some(on_error.as_ref().unchecked_ref()),
            )
            .map_err(|e| sensor_error("geolocation", &e))?;

        log::info!("Geolocation watch {} started", id);
        Ok(Self {
            geolocation,
            id,
            _on_fix: on_fix,
            _on_error: on_error,
        })
    }
}

impl Drop for GeoWatch {
    fn drop(&mut self) {
        self.geolocation.clear_watch(self.id);
        log::info!("Geolocation watch {} cleared", self.id);
    }
}

/// The sandboxed AR iframe and its `message` listener
pub struct RenderFrame {
    window: web_sys::Window,
    iframe: HtmlIFrameElement,
    listener: Closure<dyn FnMut(MessageEvent)>,
}

impl RenderFrame {
    /// Create the iframe inside `container_id`; `on_message` receives JSON from it
    pub fn attach(container_id: &str, mut on_message: impl FnMut(String) + 'static) -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document = window.document().ok_or_else(|| JsValue::from_str("no document"))?;
        let container = document
            .get_element_by_id(container_id)
            .ok_or_else(|| JsValue::from_str("no AR container"))?;

        let iframe: HtmlIFrameElement = document.create_element("iframe")?.dyn_into()?;
        iframe.set_attribute("allow", "camera; microphone; accelerometer; gyroscope")?;
        iframe.set_attribute("style", "width: 100%; height: 100%; border: none;")?;
        container.set_inner_html("");
        container.append_child(&iframe)?;

        let source = iframe.clone();
        let listener = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            // Only our own iframe may talk to the store
            let from_frame = match (event.source(), source.content_window()) {
                (Some(src), Some(frame)) => JsValue::from(src) == JsValue::from(frame),
                _ => false,
            };
            if !from_frame {
                return;
            }
            if let Ok(text) = js_sys::JSON::stringify(&event.data()) {
                on_message(String::from(text));
            }
        });
        window.add_event_listener_with_callback("message", listener.as_ref().unchecked_ref())?;

        Ok(Self {
            window,
            iframe,
            listener,
        })
    }

    /// Replace the scene document wholesale
    pub fn load(&self, document: &str) {
        self.iframe.set_srcdoc(document);
    }

    /// Post a message to the scene
    pub fn post(&self, message: &OutboundMessage) {
        let Some(target) = self.iframe.content_window() else {
            return;
        };
        let payload = match message.to_json() {
            Ok(json) => js_sys::JSON::parse(&json),
            Err(e) => {
                log::warn!("Could not encode {:?}: {}", message, e);
                return;
            }
        };
        if let Ok(payload) = payload {
            if let Err(e) = target.post_message(&payload, "*") {
                log::warn!("postMessage failed: {:?}", e);
            }
        }
    }
}

impl Drop for RenderFrame {
    fn drop(&mut self) {
        let _ = self
            .window
            .remove_event_listener_with_callback("message", self.listener.as_ref().unchecked_ref());
        self.iframe.remove();
    }
}
