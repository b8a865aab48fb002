// MouseDirectionBinder Device Hotplug
// Detects event nodes appearing and disappearing under /dev/input

use std::fs;
use std::io;
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};

#[cfg(not(feature = "udev"))]
use std::collections::BTreeSet;
#[cfg(not(feature = "udev"))]
use std::time::{Duration, Instant};

use super::source::{SourceError, SourceResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HotplugChange {
    Added(PathBuf),
    Removed(PathBuf),
}

/// `eventN` character devices in `dir`, sorted by path.
pub(crate) fn event_nodes(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut nodes: Vec<PathBuf> = fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| is_event_node(path))
        .collect();
    nodes.sort();
    Ok(nodes)
}

pub(crate) fn is_event_node(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with("event"))
}

/// Rescans the input directory at a fixed interval.
#[cfg(not(feature = "udev"))]
pub(crate) struct Hotplug {
    input_dir: PathBuf,
    known: BTreeSet<PathBuf>,
    last_scan: Instant,
}

#[cfg(not(feature = "udev"))]
impl Hotplug {
    const RESCAN_INTERVAL: Duration = Duration::from_secs(1);

    pub(crate) fn new(input_dir: &Path) -> SourceResult<Self> {
        let known = event_nodes(input_dir)
            .map_err(|e| {
                SourceError::Unavailable(format!("cannot read {}: {}", input_dir.display(), e))
            })?
            .into_iter()
            .collect();
        Ok(Self {
            input_dir: input_dir.to_path_buf(),
            known,
            last_scan: Instant::now(),
        })
    }

    /// No pollable descriptor; changes are found by rescanning.
    pub(crate) fn fd(&self) -> Option<RawFd> {
        None
    }

    pub(crate) fn changes(&mut self, _readable: bool) -> Vec<HotplugChange> {
        if self.last_scan.elapsed() < Self::RESCAN_INTERVAL {
            return Vec::new();
        }
        self.last_scan = Instant::now();

        let current: BTreeSet<PathBuf> = match event_nodes(&self.input_dir) {
            Ok(nodes) => nodes.into_iter().collect(),
            Err(e) => {
                log::warn!("Rescan of {} failed: {}", self.input_dir.display(), e);
                return Vec::new();
            }
        };

        let mut changes: Vec<HotplugChange> = self
            .known
            .difference(&current)
            .cloned()
            .map(HotplugChange::Removed)
            .collect();
        changes.extend(
            current
                .difference(&self.known)
                .cloned()
                .map(HotplugChange::Added),
        );
        self.known = current;
        changes
    }
}

/// Listens on a udev monitor socket for input subsystem events.
#[cfg(feature = "udev")]
pub(crate) struct Hotplug {
    socket: udev::MonitorSocket,
}

#[cfg(feature = "udev")]
impl Hotplug {
    pub(crate) fn new(_input_dir: &Path) -> SourceResult<Self> {
        let socket = udev::MonitorBuilder::new()
            .and_then(|builder| builder.match_subsystem("input"))
            .and_then(|builder| builder.listen())
            .map_err(|e| SourceError::Unavailable(format!("udev monitor: {}", e)))?;
        Ok(Self { socket })
    }

    pub(crate) fn fd(&self) -> Option<RawFd> {
        use std::os::unix::io::AsRawFd;
        Some(self.socket.as_raw_fd())
    }

    pub(crate) fn changes(&mut self, readable: bool) -> Vec<HotplugChange> {
        if !readable {
            return Vec::new();
        }
        self.socket
            .iter()
            .filter_map(|event| {
                let node = event.devnode().filter(|path| is_event_node(path))?.to_path_buf();
                match event.event_type() {
                    udev::EventType::Add => Some(HotplugChange::Added(node)),
                    udev::EventType::Remove => Some(HotplugChange::Removed(node)),
                    _ => None,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn test_event_nodes_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["event3", "mouse0", "event10", "by-id"] {
            File::create(dir.path().join(name)).unwrap();
        }
        let nodes = event_nodes(dir.path()).unwrap();
        assert_eq!(
            nodes,
            vec![dir.path().join("event10"), dir.path().join("event3")]
        );
    }

    #[test]
    #[cfg(not(feature = "udev"))]
    fn test_rescan_reports_added_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("event0")).unwrap();
        let mut hotplug = Hotplug::new(dir.path()).unwrap();

        std::fs::remove_file(dir.path().join("event0")).unwrap();
        File::create(dir.path().join("event1")).unwrap();
        hotplug.last_scan -= Hotplug::RESCAN_INTERVAL;

        let changes = hotplug.changes(false);
        assert_eq!(
            changes,
            vec![
                HotplugChange::Removed(dir.path().join("event0")),
                HotplugChange::Added(dir.path().join("event1")),
            ]
        );
        assert!(hotplug.changes(false).is_empty());
    }

    #[test]
    #[cfg(not(feature = "udev"))]
    fn test_missing_directory_is_unavailable() {
        assert!(matches!(
            Hotplug::new(Path::new("/nonexistent/input")),
            Err(SourceError::Unavailable(_))
        ));
    }
}
