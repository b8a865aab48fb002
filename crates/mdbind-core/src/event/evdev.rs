// MouseDirectionBinder evdev Event Source
// Direct /dev/input access with permission negotiation and hotplug

use std::collections::{HashSet, VecDeque};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::Duration;

use evdev::{AbsoluteAxisType, Device, EventType, InputEvent, RelativeAxisType};

use super::hotplug::{event_nodes, Hotplug, HotplugChange};
use super::source::{
    open_with_access, DeviceId, DeviceInfo, EventSource, MotionDelta, SourceError, SourceEvent,
    SourceResult,
};
use crate::access::AccessHandshake;
use crate::input::{is_pointer, DeviceCapabilities, DeviceDescriptor, BTN_TOUCH};
use crate::key::Key;

const DEFAULT_INPUT_DIR: &str = "/dev/input";

/// Absolute-axis touch state, turning positions into deltas.
#[derive(Debug, Default)]
struct TouchTracker {
    last_x: Option<i32>,
}

struct OpenDevice {
    id: DeviceId,
    path: PathBuf,
    device: Device,
    touchpad: bool,
    touch: TouchTracker,
}

/// Event source reading evdev nodes directly.
///
/// Works on both X11 and Wayland. Devices the process may not open are
/// negotiated through the access handshake.
pub struct EvdevSource {
    input_dir: PathBuf,
    devices: Vec<OpenDevice>,
    hotplug: Option<Hotplug>,
    queue: VecDeque<SourceEvent>,
    // Nodes whose access was refused; not asked about again until they reappear.
    refused: HashSet<PathBuf>,
    next_id: u32,
}

impl Default for EvdevSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EvdevSource {
    pub fn new() -> Self {
        Self::with_input_dir(DEFAULT_INPUT_DIR)
    }

    pub fn with_input_dir(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            devices: Vec::new(),
            hotplug: None,
            queue: VecDeque::new(),
            refused: HashSet::new(),
            next_id: 1,
        }
    }

    /// List every input device that can currently be opened.
    ///
    /// This is useful for the --list-devices CLI flag.
    pub fn list_devices() -> Vec<DeviceInfo> {
        evdev::enumerate()
            .enumerate()
            .map(|(index, (path, device))| DeviceInfo {
                id: DeviceId(index as u32),
                path: Some(path),
                descriptor: descriptor_of(&device),
                capabilities: capabilities_of(&device),
            })
            .collect()
    }

    /// Number of devices currently open
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Open `path` and queue the outcome.
    ///
    /// With a handshake, a refused open is negotiated on the spot. Without
    /// one it is queued as `AccessNeeded` for the worker to negotiate.
    fn add_device(&mut self, path: &Path, access: Option<&AccessHandshake>) {
        if self.devices.iter().any(|d| d.path == path) || self.refused.contains(path) {
            return;
        }

        let opened = match access {
            Some(access) => open_with_access(path, access, |p| Device::open(p)),
            None => Device::open(path).map_err(SourceError::Io),
        };
        match opened {
            Ok(device) => self.push_device(path, device),
            Err(SourceError::Io(e)) if e.kind() == io::ErrorKind::PermissionDenied => {
                self.queue.push_back(SourceEvent::AccessNeeded {
                    path: path.to_path_buf(),
                });
            }
            Err(e) => self.queue_failure(path, e),
        }
    }

    fn push_device(&mut self, path: &Path, device: Device) {
        let id = DeviceId(self.next_id);
        self.next_id += 1;

        let info = DeviceInfo {
            id,
            path: Some(path.to_path_buf()),
            descriptor: descriptor_of(&device),
            capabilities: capabilities_of(&device),
        };
        log::debug!("Opened {} as {:?}: {}", path.display(), id, info.descriptor);

        self.devices.push(OpenDevice {
            id,
            path: path.to_path_buf(),
            device,
            touchpad: is_pointer(&info.capabilities) && !info.capabilities.has_rel_x,
            touch: TouchTracker::default(),
        });
        self.queue.push_back(SourceEvent::DeviceAdded(info));
    }

    fn queue_failure(&mut self, path: &Path, error: SourceError) {
        match failure_event(path, error) {
            Some(event) => {
                if matches!(event, SourceEvent::DeviceUnavailable { .. }) {
                    self.refused.insert(path.to_path_buf());
                }
                self.queue.push_back(event);
            }
            None => log::debug!("Skipping {}: not an input device", path.display()),
        }
    }

    fn remove_path(&mut self, path: &Path) {
        self.refused.remove(path);
        if let Some(index) = self.devices.iter().position(|d| d.path == path) {
            self.remove_index(index);
        }
    }

    fn remove_index(&mut self, index: usize) {
        let removed = self.devices.swap_remove(index);
        log::debug!("Closed {} ({:?})", removed.path.display(), removed.id);
        self.queue.push_back(SourceEvent::DeviceRemoved(removed.id));
    }

    fn apply_hotplug(&mut self, readable: bool) {
        let changes = match self.hotplug.as_mut() {
            Some(hotplug) => hotplug.changes(readable),
            None => return,
        };
        for change in changes {
            match change {
                HotplugChange::Added(path) => self.add_device(&path, None),
                HotplugChange::Removed(path) => self.remove_path(&path),
            }
        }
    }
}

impl EventSource for EvdevSource {
    fn open(&mut self, access: &AccessHandshake) -> SourceResult<()> {
        let nodes = event_nodes(&self.input_dir).map_err(|e| {
            SourceError::Unavailable(format!("cannot read {}: {}", self.input_dir.display(), e))
        })?;
        self.hotplug = Some(Hotplug::new(&self.input_dir)?);

        for path in nodes {
            self.add_device(&path, Some(access));
        }
        log::info!(
            "Opened {} input device(s) under {}",
            self.devices.len(),
            self.input_dir.display()
        );
        Ok(())
    }

    /// Poll for events with timeout
    ///
    /// Uses libc::poll() to wait across the hotplug monitor and every open
    /// device without busy-waiting. EINTR is returned as a transient error.
    fn poll(&mut self, timeout: Duration) -> SourceResult<()> {
        let hotplug_fd = self.hotplug.as_ref().and_then(Hotplug::fd);
        let mut poll_fds: Vec<libc::pollfd> = hotplug_fd
            .into_iter()
            .chain(self.devices.iter().map(|d| d.device.as_raw_fd()))
            .map(|fd| libc::pollfd {
                fd,
                events: libc::POLLIN,
                revents: 0,
            })
            .collect();

        let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as i32;
        let poll_result = unsafe {
            libc::poll(
                poll_fds.as_mut_ptr(),
                poll_fds.len() as libc::nfds_t,
                timeout_ms,
            )
        };
        if poll_result < 0 {
            return Err(SourceError::Io(io::Error::last_os_error()));
        }

        let (hotplug_revents, device_revents) = match hotplug_fd {
            Some(_) => (poll_fds[0].revents, &poll_fds[1..]),
            None => (0, &poll_fds[..]),
        };
        let device_revents: Vec<libc::c_short> = device_revents.iter().map(|p| p.revents).collect();

        let mut lost = Vec::new();
        for (index, revents) in device_revents.into_iter().enumerate() {
            let open = &mut self.devices[index];
            if revents & libc::POLLIN != 0 {
                match open.device.fetch_events() {
                    Ok(events) => {
                        for event in events {
                            if let Some(translated) = translate(open.id, open.touchpad, &mut open.touch, &event) {
                                self.queue.push_back(translated);
                            }
                        }
                    }
                    Err(e) if e.raw_os_error() == Some(libc::ENODEV) => lost.push(index),
                    Err(e)
                        if matches!(
                            e.kind(),
                            io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                        ) => {}
                    Err(e) => {
                        log::warn!("Read from {} failed: {}", open.path.display(), e);
                        self.queue.push_back(SourceEvent::DeviceFailed {
                            path: open.path.clone(),
                            reason: format!("read failed: {}", e),
                        });
                        lost.push(index);
                    }
                }
            } else if revents & (libc::POLLHUP | libc::POLLERR | libc::POLLNVAL) != 0 {
                lost.push(index);
            }
        }
        // Highest index first so swap_remove keeps earlier indices valid.
        for index in lost.into_iter().rev() {
            self.remove_index(index);
        }

        self.apply_hotplug(hotplug_revents & libc::POLLIN != 0);
        Ok(())
    }

    fn negotiate_access(&mut self, path: &Path, access: &AccessHandshake) {
        if self.devices.iter().any(|d| d.path == path) || self.refused.contains(path) {
            return;
        }
        match open_with_access(path, access, |p| Device::open(p)) {
            Ok(device) => self.push_device(path, device),
            Err(e) => self.queue_failure(path, e),
        }
    }

    fn next_event(&mut self) -> Option<SourceEvent> {
        self.queue.pop_front()
    }

    fn close(&mut self) {
        if !self.devices.is_empty() {
            log::info!("Closing {} input device(s)", self.devices.len());
        }
        self.devices.clear();
        self.hotplug = None;
        self.queue.clear();
    }
}

impl Drop for EvdevSource {
    fn drop(&mut self) {
        self.close();
    }
}

fn descriptor_of(device: &Device) -> DeviceDescriptor {
    let input_id = device.input_id();
    DeviceDescriptor::new(
        device.name().unwrap_or("Unknown"),
        input_id.vendor(),
        input_id.product(),
    )
}

fn capabilities_of(device: &Device) -> DeviceCapabilities {
    let supported_keys = device
        .supported_keys()
        .map(|keys| keys.iter().map(|k| k.code()).collect())
        .unwrap_or_default();
    let mut capabilities =
        DeviceCapabilities::new(device.supported_events().contains(EventType::KEY), supported_keys);
    capabilities.has_rel_x = device
        .supported_relative_axes()
        .is_some_and(|axes| axes.contains(RelativeAxisType::REL_X));
    capabilities.has_abs_x = device
        .supported_absolute_axes()
        .is_some_and(|axes| axes.contains(AbsoluteAxisType::ABS_X));
    capabilities
}

/// Event reported for a failed open, or `None` for nodes that are not
/// input devices or vanished before they could be opened.
fn failure_event(path: &Path, error: SourceError) -> Option<SourceEvent> {
    let path = path.to_path_buf();
    let reason = error.to_string();
    match error {
        SourceError::AccessRefused { .. } | SourceError::PermissionDenied { .. } => {
            Some(SourceEvent::DeviceUnavailable { path, reason })
        }
        SourceError::Io(e)
            if matches!(
                e.raw_os_error(),
                Some(libc::ENOTTY) | Some(libc::ENOENT) | Some(libc::ENODEV)
            ) =>
        {
            None
        }
        _ => Some(SourceEvent::DeviceFailed { path, reason }),
    }
}

/// Convert one evdev event into a source event.
///
/// Touchpads report absolute positions; the horizontal delta is the change
/// between successive samples of the same touch.
fn translate(
    id: DeviceId,
    touchpad: bool,
    touch: &mut TouchTracker,
    event: &InputEvent,
) -> Option<SourceEvent> {
    let event_type = event.event_type();
    let code = event.code();
    let value = event.value();

    if event_type == EventType::RELATIVE && code == RelativeAxisType::REL_X.0 {
        return Some(SourceEvent::Motion {
            device: id,
            delta: MotionDelta::raw(f64::from(value)),
        });
    }

    if event_type == EventType::ABSOLUTE && code == AbsoluteAxisType::ABS_X.0 && touchpad {
        let previous = touch.last_x.replace(value);
        return previous.map(|last| SourceEvent::Motion {
            device: id,
            delta: MotionDelta::raw(f64::from(value - last)),
        });
    }

    if event_type == EventType::KEY {
        if code == BTN_TOUCH {
            touch.last_x = None;
        }
        // Value 2 is autorepeat; activation only tracks edges.
        return match value {
            0 | 1 => Some(SourceEvent::Key {
                device: id,
                key: Key(code),
                pressed: value == 1,
            }),
            _ => None,
        };
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Notifier;

    fn motion_dx(event: Option<SourceEvent>) -> Option<f64> {
        match event {
            Some(SourceEvent::Motion { delta, .. }) => Some(delta.horizontal()),
            _ => None,
        }
    }

    #[test]
    fn test_translate_relative_motion() {
        let mut touch = TouchTracker::default();
        let event = InputEvent::new(EventType::RELATIVE, RelativeAxisType::REL_X.0, -4);
        assert_eq!(motion_dx(translate(DeviceId(1), false, &mut touch, &event)), Some(-4.0));

        let vertical = InputEvent::new(EventType::RELATIVE, RelativeAxisType::REL_Y.0, 9);
        assert!(translate(DeviceId(1), false, &mut touch, &vertical).is_none());
    }

    #[test]
    fn test_translate_touchpad_positions_to_deltas() {
        let mut touch = TouchTracker::default();
        let abs = |x| InputEvent::new(EventType::ABSOLUTE, AbsoluteAxisType::ABS_X.0, x);

        assert!(translate(DeviceId(2), true, &mut touch, &abs(1000)).is_none());
        assert_eq!(motion_dx(translate(DeviceId(2), true, &mut touch, &abs(1012))), Some(12.0));

        let lift = InputEvent::new(EventType::KEY, BTN_TOUCH, 0);
        translate(DeviceId(2), true, &mut touch, &lift);
        assert!(translate(DeviceId(2), true, &mut touch, &abs(400)).is_none());
    }

    #[test]
    fn test_translate_keys_skip_autorepeat() {
        let mut touch = TouchTracker::default();
        let press = InputEvent::new(EventType::KEY, 42, 1);
        let repeat = InputEvent::new(EventType::KEY, 42, 2);
        match translate(DeviceId(3), false, &mut touch, &press) {
            Some(SourceEvent::Key { key, pressed, .. }) => {
                assert_eq!(key, Key::LEFT_SHIFT);
                assert!(pressed);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(translate(DeviceId(3), false, &mut touch, &repeat).is_none());
    }

    #[test]
    fn test_open_missing_directory_is_unavailable() {
        let access = AccessHandshake::new(Notifier::channel().0);
        let mut source = EvdevSource::with_input_dir("/nonexistent/input");
        assert!(matches!(source.open(&access), Err(SourceError::Unavailable(_))));
    }

    #[test]
    fn test_open_failures_are_classified() {
        let path = Path::new("/dev/input/event5");
        let os = |code| SourceError::Io(io::Error::from_raw_os_error(code));

        assert!(failure_event(path, os(libc::ENOTTY)).is_none());
        assert!(failure_event(path, os(libc::ENOENT)).is_none());
        assert!(matches!(
            failure_event(path, os(libc::EIO)),
            Some(SourceEvent::DeviceFailed { .. })
        ));
        assert!(matches!(
            failure_event(path, SourceError::AccessRefused { path: path.to_path_buf() }),
            Some(SourceEvent::DeviceUnavailable { .. })
        ));
    }

    #[test]
    fn test_non_evdev_nodes_are_skipped() {
        // Regular files are not evdev nodes; opening them fails with ENOTTY.
        let dir = tempfile::tempdir().unwrap();
        std::fs::File::create(dir.path().join("event0")).unwrap();
        let (notifier, rx) = Notifier::channel();
        let access = AccessHandshake::new(notifier);
        let mut source = EvdevSource::with_input_dir(dir.path());
        source.open(&access).unwrap();
        assert_eq!(source.device_count(), 0);
        assert!(source.next_event().is_none());
        assert!(rx.try_recv().is_err());
    }
}
