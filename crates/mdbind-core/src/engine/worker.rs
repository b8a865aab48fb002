// MouseDirectionBinder Engine Worker
// Event loop owning the event source and the output device

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{EngineOptions, Lifecycle, Shared};
use crate::config::default_filter;
use crate::event::{DeviceId, DeviceInfo, EventSource, SourceEvent};
use crate::input::{BrandFilter, Capability};
use crate::key::Key;
use crate::notify::{ErrorKind, ErrorReport, Notification, Notifier, Status};
use crate::output::{KeySink, KeySynthesizer, OutputError};
use crate::random::Randomizer;
use crate::translate::{KeyIntent, MotionTranslator};

/// Trigger key and the device holding it down, if any
#[derive(Debug, Clone, Copy)]
struct ActivationState {
    key: Key,
    pressed_by: Option<DeviceId>,
}

impl ActivationState {
    fn new(key: Key) -> Self {
        Self {
            key,
            pressed_by: None,
        }
    }

    fn is_pressed(&self) -> bool {
        self.pressed_by.is_some()
    }
}

pub(super) struct Worker<E: EventSource, S: KeySink> {
    shared: Arc<Shared>,
    notifier: Notifier,
    source: E,
    synth: KeySynthesizer<S>,
    translator: MotionTranslator,
    randomizer: Randomizer,
    activation: ActivationState,
    pointer_filter: BrandFilter,
    keyboard_filter: BrandFilter,
    devices: BTreeMap<DeviceId, DeviceInfo>,
    active_pointer: Option<DeviceId>,
    active_keyboard: Option<DeviceId>,
    devices_reported: bool,
    idle_release: Duration,
    poll_timeout: Duration,
}

impl<E: EventSource, S: KeySink> Worker<E, S> {
    /// Thread entry point: Starting, Running, Stopping, Stopped.
    pub(super) fn run<FE, FS>(
        shared: Arc<Shared>,
        notifier: Notifier,
        options: EngineOptions,
        make_source: FE,
        make_sink: FS,
    ) where
        FE: FnOnce() -> E,
        FS: FnOnce() -> Result<S, OutputError>,
    {
        notifier.status(Status::Initializing);

        let sink = match make_sink() {
            Ok(sink) => sink,
            Err(e) => {
                notifier.error(ErrorReport::new(ErrorKind::Initialization, e.to_string()));
                finish(&shared, &notifier);
                return;
            }
        };
        let synth = KeySynthesizer::new(sink).with_notifier(notifier.clone());

        let mut source = make_source();
        let opened = source.open(&shared.handshake);
        if let Err(e) = &opened {
            notifier.error(ErrorReport::new(
                ErrorKind::Initialization,
                format!("Cannot open input devices: {}", e),
            ));
        }
        // A stop may arrive while open waits on an access request.
        if opened.is_err() || !shared.is_running() {
            source.close();
            drop(synth);
            finish(&shared, &notifier);
            return;
        }

        let mut worker = Self {
            shared,
            notifier,
            source,
            synth,
            translator: MotionTranslator::new(
                options.left_key,
                options.right_key,
                options.dead_zone,
                options.dead_zone_policy,
            ),
            randomizer: options
                .randomizer_seed
                .map(Randomizer::with_seed)
                .unwrap_or_default(),
            activation: ActivationState::new(options.activation_key),
            pointer_filter: default_filter(),
            keyboard_filter: default_filter(),
            devices: BTreeMap::new(),
            active_pointer: None,
            active_keyboard: None,
            devices_reported: false,
            idle_release: options.idle_release,
            poll_timeout: options.poll_timeout,
        };

        worker.shared.set_lifecycle(Lifecycle::Running);
        worker.notifier.status(Status::Ready);
        worker.apply_pending();
        worker.drain_events();
        worker.resolve_initial_trigger();
        worker.main_loop();
        worker.teardown();
    }

    fn main_loop(&mut self) {
        while self.shared.is_running() {
            self.apply_pending();

            match self.source.poll(self.poll_timeout) {
                Ok(()) => {}
                Err(e) if e.is_transient() => continue,
                Err(e) => {
                    self.notifier.error(ErrorReport::fatal(
                        ErrorKind::Runtime,
                        format!("Input stopped: {}", e),
                    ));
                    self.shared.running.store(false, Ordering::SeqCst);
                    break;
                }
            }

            self.drain_events();

            if !self.devices_reported {
                self.publish_devices();
            }
            self.check_idle(Instant::now());
        }
    }

    fn drain_events(&mut self) {
        while let Some(event) = self.source.next_event() {
            self.dispatch(event);
        }
    }

    /// Startup trigger: resolved against the devices present after `open`.
    fn resolve_initial_trigger(&mut self) {
        let key = self.activation.key;
        if self.resolves(key) {
            return;
        }
        self.notifier.error(ErrorReport::new(
            ErrorKind::Configuration,
            format!(
                "Activation key {} is not available; using {}",
                key,
                Key::LEFT_SHIFT
            ),
        ));
        self.activation = ActivationState::new(Key::LEFT_SHIFT);
    }

    fn teardown(mut self) {
        self.shared.set_lifecycle(Lifecycle::Stopping);
        self.release();
        self.source.close();

        let Self {
            shared,
            notifier,
            synth,
            ..
        } = self;
        drop(synth);
        finish(&shared, &notifier);
    }

    /// Apply the configuration snapshot taken under one lock.
    fn apply_pending(&mut self) {
        let Some(snapshot) = self.shared.config.take_pending() else {
            return;
        };

        if let Some(key) = snapshot.activation_key {
            self.apply_activation_key(key);
        }

        let mut filters_changed = false;
        if let Some(filter) = snapshot.pointer_filter {
            self.pointer_filter = filter;
            filters_changed = true;
        }
        if let Some(filter) = snapshot.keyboard_filter {
            self.keyboard_filter = filter;
            filters_changed = true;
        }
        if filters_changed {
            if let Some(device) = self.activation.pressed_by {
                if !self.accepts_trigger_from(device, self.activation.key) {
                    self.deactivate();
                }
            }
            self.refresh_active_devices();
        }
    }

    fn apply_activation_key(&mut self, key: Key) {
        if !self.resolves(key) {
            self.notifier.error(ErrorReport::new(
                ErrorKind::Configuration,
                format!(
                    "Activation key {} cannot be resolved; keeping {}",
                    key, self.activation.key
                ),
            ));
            return;
        }

        self.activation = ActivationState::new(key);
        self.translator.reset();
        self.release();
        self.notifier.status(Status::TriggerUpdated);
    }

    fn dispatch(&mut self, event: SourceEvent) {
        match event {
            SourceEvent::Motion { device, delta } => self.on_motion(device, delta.horizontal()),
            SourceEvent::Key {
                device,
                key,
                pressed,
            } => self.on_key(device, key, pressed),
            SourceEvent::DeviceAdded(info) => self.on_device_added(info),
            SourceEvent::DeviceRemoved(id) => self.on_device_removed(id),
            SourceEvent::AccessNeeded { path } => self.on_access_needed(path),
            SourceEvent::DeviceUnavailable { path, reason } => {
                self.notifier.error(ErrorReport::new(
                    ErrorKind::Permission,
                    format!("Cannot use {}: {}", path.display(), reason),
                ));
            }
            SourceEvent::DeviceFailed { path, reason } => {
                self.notifier.error(ErrorReport::new(
                    ErrorKind::Runtime,
                    format!("Device {} failed: {}", path.display(), reason),
                ));
            }
        }
    }

    fn on_motion(&mut self, device: DeviceId, dx: f64) {
        if !self.admits(device, Capability::Pointer) {
            return;
        }

        let enabled = self.shared.config.randomizer_enabled();
        let (min, max) = self.shared.config.randomizer_range();
        let randomizer = &mut self.randomizer;
        let active = self.activation.is_pressed();
        let intent = self.translator.translate(dx, active, Instant::now(), || {
            randomizer.should_apply(enabled, min, max)
        });

        match intent {
            KeyIntent::Press(key) => {
                if let Err(e) = self.synth.press(key) {
                    self.notifier
                        .error(ErrorReport::new(ErrorKind::Runtime, e.to_string()));
                }
            }
            KeyIntent::Release => self.release(),
            KeyIntent::Keep => {}
        }
    }

    /// Press edges need an admitted source; the release edge is taken only
    /// from the device that pressed, whatever the filters say now.
    fn on_key(&mut self, device: DeviceId, key: Key, pressed: bool) {
        if key != self.activation.key {
            return;
        }

        if !pressed {
            if self.activation.pressed_by == Some(device) {
                self.deactivate();
            }
            return;
        }

        if self.activation.is_pressed() || !self.accepts_trigger_from(device, key) {
            return;
        }
        self.activation.pressed_by = Some(device);
        self.notifier.status(Status::Active);
    }

    fn deactivate(&mut self) {
        if self.activation.pressed_by.take().is_some() {
            self.release();
            self.translator.reset();
            self.notifier.status(Status::Paused);
        }
    }

    fn on_device_added(&mut self, info: DeviceInfo) {
        log::debug!("Device added: {} ({:?})", info.descriptor, info.id);
        self.devices.insert(info.id, info);
        self.refresh_active_devices();
    }

    fn on_device_removed(&mut self, id: DeviceId) {
        let Some(info) = self.devices.remove(&id) else {
            return;
        };
        log::debug!("Device removed: {} ({:?})", info.descriptor, id);

        if self.activation.pressed_by == Some(id) {
            self.deactivate();
        }
        self.refresh_active_devices();
    }

    /// The handshake blocks the loop, so the output is released first.
    fn on_access_needed(&mut self, path: PathBuf) {
        if self.synth.held().is_some() {
            self.release();
            self.notifier.status(Status::Paused);
        }
        self.translator.reset();
        self.source.negotiate_access(&path, &self.shared.handshake);
    }

    /// Keyboards may carry any trigger; pointers only buttons they report.
    fn accepts_trigger_from(&self, device: DeviceId, key: Key) -> bool {
        self.admits(device, Capability::Keyboard)
            || (self.admits(device, Capability::Pointer) && self.reports_key(device, key))
    }

    fn reports_key(&self, device: DeviceId, key: Key) -> bool {
        self.devices
            .get(&device)
            .is_some_and(|info| info.capabilities.supports_key(key.code()))
    }

    /// Named keys always resolve; other codes need an admitted device
    /// that reports them.
    fn resolves(&self, key: Key) -> bool {
        key.is_known()
            || self
                .devices
                .keys()
                .any(|&id| self.reports_key(id, key) && self.accepts_trigger_from(id, key))
    }

    fn admits(&self, device: DeviceId, capability: Capability) -> bool {
        let filter = match capability {
            Capability::Pointer => &self.pointer_filter,
            Capability::Keyboard => &self.keyboard_filter,
        };
        self.devices
            .get(&device)
            .is_some_and(|info| filter.admits(&info.descriptor, &info.capabilities, capability))
    }

    /// Keep the active devices if still admitted, else pick the first admitted.
    fn refresh_active_devices(&mut self) {
        let pointer = self.select(self.active_pointer, Capability::Pointer);
        let keyboard = self.select(self.active_keyboard, Capability::Keyboard);
        if pointer != self.active_pointer || keyboard != self.active_keyboard {
            self.active_pointer = pointer;
            self.active_keyboard = keyboard;
            self.publish_devices();
        }
    }

    fn select(&self, current: Option<DeviceId>, capability: Capability) -> Option<DeviceId> {
        if let Some(id) = current.filter(|id| self.admits(*id, capability)) {
            return Some(id);
        }
        self.devices
            .keys()
            .copied()
            .find(|id| self.admits(*id, capability))
    }

    fn publish_devices(&mut self) {
        let describe = |id: Option<DeviceId>| {
            id.and_then(|id| self.devices.get(&id))
                .map(|info| info.descriptor.to_string())
                .unwrap_or_default()
        };
        let pointer = describe(self.active_pointer);
        let keyboard = describe(self.active_keyboard);

        {
            let mut detected = self.shared.detected.lock();
            detected.pointer = pointer.clone();
            detected.keyboard = keyboard.clone();
        }
        log::info!(
            "Pointer: {}; keyboard: {}",
            if pointer.is_empty() { "none" } else { &pointer },
            if keyboard.is_empty() { "none" } else { &keyboard }
        );
        self.notifier
            .send(Notification::DevicesDetected { pointer, keyboard });
        self.devices_reported = true;
    }

    fn check_idle(&mut self, now: Instant) {
        if self.synth.held().is_some() && self.translator.idle_expired(now, self.idle_release) {
            self.release();
            self.notifier.status(Status::Paused);
        }
    }

    fn release(&mut self) {
        if let Err(e) = self.synth.release() {
            self.notifier.error(ErrorReport::new(
                ErrorKind::Runtime,
                format!("Failed to release key: {}", e),
            ));
        }
    }
}

fn finish(shared: &Shared, notifier: &Notifier) {
    shared.running.store(false, Ordering::SeqCst);
    *shared.detected.lock() = Default::default();
    shared.set_lifecycle(Lifecycle::Stopped);
    notifier.send(Notification::Stopped);
}
