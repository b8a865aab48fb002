// MouseDirectionBinder Engine
// Handle owned by the collaborator; the worker thread does the actual work

mod worker;

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use crate::access::AccessHandshake;
use crate::config::SharedConfig;
use crate::event::EventSource;
use crate::input::BrandList;
use crate::key::Key;
use crate::notify::{Notification, Notifier};
use crate::output::{KeySink, OutputError};
use crate::translate::{DeadZonePolicy, DEFAULT_DEAD_ZONE, DEFAULT_IDLE_RELEASE};

use worker::Worker;

pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(20);

/// Errors starting the engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Worker lifecycle stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Lifecycle {
    Starting = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl Lifecycle {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Lifecycle::Starting,
            1 => Lifecycle::Running,
            2 => Lifecycle::Stopping,
            _ => Lifecycle::Stopped,
        }
    }
}

/// Descriptor strings of the devices currently in use
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectedDevices {
    pub pointer: String,
    pub keyboard: String,
}

/// Startup parameters fixed for the engine's lifetime
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Key held for negative horizontal motion
    pub left_key: Key,
    /// Key held for positive horizontal motion
    pub right_key: Key,
    pub activation_key: Key,
    pub dead_zone: f64,
    pub dead_zone_policy: DeadZonePolicy,
    pub idle_release: Duration,
    pub poll_timeout: Duration,
    pub randomizer_enabled: bool,
    pub randomizer_range: (i32, i32),
    /// Fixed randomizer seed; entropy-seeded when `None`
    pub randomizer_seed: Option<u64>,
    pub pointer_allow: BrandList,
    pub pointer_block: BrandList,
    pub keyboard_allow: BrandList,
    pub keyboard_block: BrandList,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            left_key: Key::A,
            right_key: Key::D,
            activation_key: Key::LEFT_SHIFT,
            dead_zone: DEFAULT_DEAD_ZONE,
            dead_zone_policy: DeadZonePolicy::default(),
            idle_release: DEFAULT_IDLE_RELEASE,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            randomizer_enabled: false,
            randomizer_range: (
                crate::config::DEFAULT_RANDOMIZER_MIN,
                crate::config::DEFAULT_RANDOMIZER_MAX,
            ),
            randomizer_seed: None,
            pointer_allow: BrandList::new(),
            pointer_block: BrandList::new(),
            keyboard_allow: BrandList::new(),
            keyboard_block: BrandList::new(),
        }
    }
}

/// State shared between the handle and the worker
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) config: SharedConfig,
    pub(crate) handshake: AccessHandshake,
    pub(crate) detected: Mutex<DetectedDevices>,
    pub(crate) running: AtomicBool,
    lifecycle: AtomicU8,
}

impl Shared {
    pub(crate) fn set_lifecycle(&self, stage: Lifecycle) {
        log::debug!("Engine lifecycle: {:?}", stage);
        self.lifecycle.store(stage as u8, Ordering::SeqCst);
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn request_stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            log::info!("Stopping engine");
        }
        self.handshake.shutdown();
    }
}

/// Stops an [`Engine`] from another thread
#[derive(Debug, Clone)]
pub struct StopHandle {
    shared: Arc<Shared>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.shared.request_stop();
    }
}

/// Capture-and-synthesis engine.
///
/// All configuration setters are thread-safe and fire-and-forget. The
/// worker observes them at its next loop iteration. Dropping the engine
/// stops the worker and waits for it.
pub struct Engine {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl Engine {
    /// Start the worker thread.
    ///
    /// Both factories run on the worker thread, which then owns the event
    /// source and the output sink exclusively.
    pub fn start<E, S, FE, FS>(
        source: FE,
        sink: FS,
        options: EngineOptions,
    ) -> Result<(Self, Receiver<Notification>), EngineError>
    where
        E: EventSource + 'static,
        S: KeySink + 'static,
        FE: FnOnce() -> E + Send + 'static,
        FS: FnOnce() -> Result<S, OutputError> + Send + 'static,
    {
        let (notifier, notifications) = Notifier::channel();

        let config = SharedConfig::new();
        config.set_randomizer_enabled(options.randomizer_enabled);
        config.set_randomizer_range(options.randomizer_range.0, options.randomizer_range.1);
        config.set_pointer_brand_filters(options.pointer_allow.clone(), options.pointer_block.clone());
        config.set_keyboard_brand_filters(
            options.keyboard_allow.clone(),
            options.keyboard_block.clone(),
        );

        let shared = Arc::new(Shared {
            config,
            handshake: AccessHandshake::new(notifier.clone()),
            detected: Mutex::new(DetectedDevices::default()),
            running: AtomicBool::new(true),
            lifecycle: AtomicU8::new(Lifecycle::Starting as u8),
        });

        let worker = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("mdbind-worker".to_string())
                .spawn(move || Worker::run(shared, notifier, options, source, sink))?
        };

        Ok((
            Self {
                shared,
                worker: Some(worker),
            },
            notifications,
        ))
    }

    /// Start with the evdev event source and a uinput virtual keyboard.
    #[cfg(feature = "pure-rust")]
    pub fn spawn_default(
        options: EngineOptions,
    ) -> Result<(Self, Receiver<Notification>), EngineError> {
        let keys = [options.left_key, options.right_key];
        Self::start(
            crate::event::EvdevSource::new,
            move || crate::output::VirtualKeyboard::new(keys),
            options,
        )
    }

    /// Takes effect on the next iteration and clears activation and held state.
    pub fn set_activation_key(&self, key: impl Into<Key>) {
        self.shared.config.set_activation_key(key.into());
    }

    pub fn set_randomizer_enabled(&self, enabled: bool) {
        self.shared.config.set_randomizer_enabled(enabled);
    }

    pub fn set_randomizer_range(&self, minimum_percent: i32, maximum_percent: i32) {
        self.shared
            .config
            .set_randomizer_range(minimum_percent, maximum_percent);
    }

    pub fn set_pointer_brand_filters(&self, allow: BrandList, block: BrandList) {
        self.shared.config.set_pointer_brand_filters(allow, block);
    }

    pub fn set_keyboard_brand_filters(&self, allow: BrandList, block: BrandList) {
        self.shared.config.set_keyboard_brand_filters(allow, block);
    }

    /// Answer the outstanding access request. No-op when none is pending.
    pub fn deliver_access_confirmation(&self, granted: bool) {
        self.shared.handshake.deliver_decision(granted);
    }

    pub fn detected_devices(&self) -> DetectedDevices {
        self.shared.detected.lock().clone()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_u8(self.shared.lifecycle.load(Ordering::SeqCst))
    }

    /// Whether the worker has not yet been asked to stop or failed.
    pub fn is_running(&self) -> bool {
        self.shared.is_running() && self.lifecycle() != Lifecycle::Stopped
    }

    /// Ask the worker to stop. Also unblocks a pending access request.
    pub fn stop(&self) {
        self.shared.request_stop();
    }

    /// Cloneable handle that can only stop the engine, for signal handlers.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Stop and wait for the worker to release its resources.
    pub fn join(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!("Engine worker panicked");
            }
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
