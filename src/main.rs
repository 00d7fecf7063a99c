//! Hush Hunt entry point
//!
//! Handles platform-specific initialization and runs the session loop.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::rc::{Rc, Weak};
    use wasm_bindgen::prelude::*;

    use hush_hunt::platform::web::{GeoWatch, MicrophoneTap, RenderFrame, probe_camera};
    use hush_hunt::sensors::{SensorKind, SensorStatus};
    use hush_hunt::shell::{FoundFlash, Intent, Screen, ShellView};
    use hush_hunt::{Session, Settings};

    /// App instance holding the session and every browser handle
    struct App {
        session: Session,
        settings: Settings,
        frame: Option<RenderFrame>,
        microphone: Option<MicrophoneTap>,
        geo: Option<GeoWatch>,
        last_screen: Option<Screen>,
        flash: FoundFlash,
    }

    impl App {
        fn new(settings: Settings) -> Self {
            Self {
                session: Session::new(&settings),
                settings,
                frame: None,
                microphone: None,
                geo: None,
                last_screen: None,
                flash: FoundFlash::default(),
            }
        }

        /// Sample sensors, advance the bridge and push work to the iframe
        fn update(&mut self, time: f64) {
            if let Some(mic) = self.microphone.as_mut() {
                self.session.on_audio_frame(mic.spectrum(), time);
            }

            let out = self.session.frame(time);
            if let Some(frame) = &self.frame {
                if let Some(document) = &out.document {
                    frame.load(document);
                }
                for message in &out.outbound {
                    frame.post(message);
                }
            }
            if out.cleared {
                log::info!("All treasures found!");
            }
        }

        /// Update screens and HUD elements in DOM
        fn update_shell(&mut self, time: f64) {
            let Some(document) = web_sys::window().and_then(|w| w.document()) else {
                return;
            };
            let view = self.session.view();

            if self.last_screen != Some(view.screen) {
                log::info!("Screen: {:?}", view.screen);
                self.last_screen = Some(view.screen);
            }

            set_visible(&document, "start-screen", view.screen == Screen::Start);
            set_visible(&document, "hud", view.screen == Screen::Playing);
            set_visible(&document, "clear-screen", view.screen == Screen::Clear);
            set_visible(&document, "permission-overlay", view.permission_overlay());
            set_visible(
                &document,
                "debug-panel",
                self.settings.debug_panel && view.screen != Screen::Start,
            );

            update_hud(&document, &view);

            let flash = self.flash.update(&view.hud, time);
            set_visible(&document, "found-flash", flash.is_some());
            if let Some(text) = flash {
                set_text(&document, "found-flash-text", text);
            }
        }
    }

    fn set_visible(document: &web_sys::Document, id: &str, visible: bool) {
        if let Some(el) = document.get_element_by_id(id) {
            let _ = el.set_attribute("class", if visible { "" } else { "hidden" });
        }
    }

    fn set_text(document: &web_sys::Document, id: &str, text: &str) {
        if let Some(el) = document.get_element_by_id(id) {
            if el.text_content().as_deref() != Some(text) {
                el.set_text_content(Some(text));
            }
        }
    }

    fn update_hud(document: &web_sys::Document, view: &ShellView) {
        let hud = &view.hud;
        set_text(document, "hud-found", &hud.found.to_string());
        set_text(document, "hud-total", &hud.total.to_string());
        set_text(document, "hud-percent", &format!("{}%", hud.percent));
        set_text(document, "hud-hint", hud.hint);
        set_text(document, "hud-threat", &format!("{:.0}", hud.threat_level));

        if let Some(bar) = document.get_element_by_id("hud-bar") {
            let _ = bar.set_attribute("style", &format!("width: {}%", hud.percent));
        }
        if let Some(el) = document.get_element_by_id("hud-warning") {
            let class = if hud.monster_near { "warning" } else { "hidden" };
            let _ = el.set_attribute("class", class);
        }

        let missing: Vec<&str> = view.missing_sensors.iter().map(|k| k.as_str()).collect();
        set_text(document, "permission-list", &missing.join(", "));
    }

    pub async fn run() {
        console_error_panic_hook::set_once();
        let _ = console_log::init_with_level(log::Level::Info);

        log::info!("Hush Hunt starting...");

        let Some(document) = web_sys::window().and_then(|w| w.document()) else {
            log::error!("No document");
            return;
        };

        // Hide loading indicator
        if let Some(loading) = document.get_element_by_id("loading") {
            let _ = loading.set_attribute("class", "hidden");
        }

        let settings = Settings::load();
        let app = Rc::new(RefCell::new(App::new(settings)));

        setup_start_button(app.clone());
        setup_restart_button(app.clone());
        setup_retry_button(app.clone());
        setup_debug_panel(app.clone());
        setup_debug_toggle(app.clone());

        app.borrow_mut().update_shell(0.0);

        // Start session loop
        request_animation_frame(app);

        log::info!("Hush Hunt running!");
    }

    /// Attach `handler` to the click event of element `id`
    fn on_click(id: &str, mut handler: impl FnMut() + 'static) {
        let Some(document) = web_sys::window().and_then(|w| w.document()) else {
            return;
        };
        if let Some(btn) = document.get_element_by_id(id) {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| handler());
            let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        } else {
            log::warn!("Button #{} not found", id);
        }
    }

    fn attach_frame(app: &Rc<RefCell<App>>) {
        if app.borrow().frame.is_some() {
            return;
        }
        let weak: Weak<RefCell<App>> = Rc::downgrade(app);
        let frame = RenderFrame::attach("ar-container", move |text| {
            if let Some(app) = weak.upgrade() {
                app.borrow_mut().session.on_message_json(&text);
            }
        });
        match frame {
            Ok(frame) => {
                let mut a = app.borrow_mut();
                a.frame = Some(frame);
                a.session.attach_surface();
            }
            Err(e) => log::error!("Could not create AR frame: {:?}", e),
        }
    }

    /// Release any open sensors, then request all three again.
    ///
    /// Must run from a user gesture so the permission prompts are allowed.
    fn start_sensors(app: Rc<RefCell<App>>) {
        {
            let mut a = app.borrow_mut();
            a.microphone = None;
            a.geo = None;
            a.session.restart_sensors();
            for kind in SensorKind::ALL {
                a.session.set_sensor_status(kind, SensorStatus::Pending);
            }
        }

        wasm_bindgen_futures::spawn_local(async move {
            let camera = probe_camera().await;
            let microphone = MicrophoneTap::open().await;

            let mut a = app.borrow_mut();
            a.session.set_sensor_status(
                SensorKind::Camera,
                camera.as_ref().map_or_else(SensorStatus::from, |_| SensorStatus::Active),
            );
            match microphone {
                Ok(mic) => {
                    a.microphone = Some(mic);
                    a.session.set_sensor_status(SensorKind::Microphone, SensorStatus::Active);
                }
                Err(e) => {
                    a.session.set_sensor_status(SensorKind::Microphone, (&e).into());
                }
            }

            let on_fix = Rc::downgrade(&app);
            let on_error = Rc::downgrade(&app);
            let watch = GeoWatch::start(
                move |fix| {
                    if let Some(app) = on_fix.upgrade() {
                        let mut a = app.borrow_mut();
                        // Logged only on the first fix
                        a.session.set_sensor_status(SensorKind::Geolocation, SensorStatus::Active);
                        a.session.on_geo_fix(fix);
                    }
                },
                move |err| {
                    if let Some(app) = on_error.upgrade() {
                        app.borrow_mut()
                            .session
                            .set_sensor_status(SensorKind::Geolocation, (&err).into());
                    }
                },
            );
            match watch {
                Ok(watch) => a.geo = Some(watch),
                Err(e) => {
                    a.session.set_sensor_status(SensorKind::Geolocation, (&e).into());
                }
            }
        });
    }

    fn setup_start_button(app: Rc<RefCell<App>>) {
        on_click("start-btn", move || {
            attach_frame(&app);
            app.borrow_mut().session.intent(Intent::StartGame);
            start_sensors(app.clone());
        });
    }

    fn setup_restart_button(app: Rc<RefCell<App>>) {
        on_click("restart-btn", move || {
            app.borrow_mut().session.intent(Intent::Restart);
        });
    }

    fn setup_retry_button(app: Rc<RefCell<App>>) {
        on_click("retry-sensors-btn", move || {
            start_sensors(app.clone());
        });
    }

    fn setup_debug_panel(app: Rc<RefCell<App>>) {
        let buttons = [
            ("debug-show-btn", Intent::ForceShow),
            ("debug-hide-btn", Intent::ForceHide),
            ("debug-find-btn", Intent::FindNext),
            ("debug-reset-btn", Intent::ResetTreasures),
        ];
        for (id, intent) in buttons {
            let app = app.clone();
            on_click(id, move || app.borrow_mut().session.intent(intent));
        }
    }

    /// Show/hide the debug panel and remember the choice
    fn setup_debug_toggle(app: Rc<RefCell<App>>) {
        on_click("debug-toggle-btn", move || {
            let mut a = app.borrow_mut();
            a.settings.debug_panel = !a.settings.debug_panel;
            a.settings.save();
            log::info!("Debug panel: {}", a.settings.debug_panel);
        });
    }

    fn request_animation_frame(app: Rc<RefCell<App>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::once(move |time: f64| {
            session_loop(app, time);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn session_loop(app: Rc<RefCell<App>>, time: f64) {
        {
            let mut a = app.borrow_mut();
            a.update(time);
            a.update_shell(time);
        }

        request_animation_frame(app);
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn wasm_main() {
    wasm_game::run().await;
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Hush Hunt (native) starting...");
    log::info!("The AR view needs a browser - run with `trunk serve` for the web version");

    println!("\nRunning headless session...");
    headless_session();
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

/// Scripted play-through: noise, a walk, then every treasure
#[cfg(not(target_arch = "wasm32"))]
fn headless_session() {
    use hush_hunt::platform::now_ms;
    use hush_hunt::sensors::GeoFix;
    use hush_hunt::shell::Intent;
    use hush_hunt::{Session, Settings};

    let settings = Settings::load();
    let mut session = Session::new(&settings);
    let mut now = now_ms();

    session.intent(Intent::StartGame);
    let scene = session.frame(now);
    println!(
        "Scene document: {} bytes",
        scene.document.as_ref().map_or(0, String::len)
    );

    // Shouting at the marker
    for _ in 0..settings.tuning.burst_min_samples {
        session.on_amplitude(200, now);
        now += 16.0;
    }
    println!("Threat after noise: {:.0}", session.state().threat_level());

    // ~22 m north
    session.on_geo_fix(GeoFix::new(35.6812, 139.7671));
    session.on_geo_fix(GeoFix::new(35.6814, 139.7671));
    println!("Threat after walking: {:.0}", session.state().threat_level());

    for index in 0..session.state().total_count() {
        session.on_message_json(&format!(r#"{{"type":"box-click","index":{}}}"#, index));
        now += 100.0;
        if session.frame(now).document.is_some() {
            let ack = format!(
                r#"{{"type":"scene-loaded","revision":{}}}"#,
                session.store().revision()
            );
            session.on_message_json(&ack);
        }
        for message in session.frame(now).outbound {
            if let Ok(json) = message.to_json() {
                println!("-> iframe: {}", json);
            }
        }
    }

    let view = session.view();
    match serde_json::to_string_pretty(&view) {
        Ok(json) => println!("Final view:\n{}", json),
        Err(e) => log::error!("Could not encode view: {}", e),
    }
    println!("Bridge stats: {:?}", session.bridge_stats());
}
