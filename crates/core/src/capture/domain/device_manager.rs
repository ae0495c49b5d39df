use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::capture::domain::capture_device::{CaptureDevice, CaptureError, DeviceOpener};
use crate::shared::frame::Frame;

type SharedDevice = Arc<Mutex<Box<dyn CaptureDevice>>>;

struct OpenDevice {
    device: SharedDevice,
    refs: usize,
}

/// Serialises access to local capture devices.
///
/// Every consumer of a device goes through one manager, so a camera is opened
/// once no matter how many sessions want it. Each `acquire` hands out a
/// [`DeviceLease`]; the device is closed when the last lease goes away.
pub struct DeviceManager {
    opener: Box<dyn DeviceOpener>,
    devices: Mutex<HashMap<String, OpenDevice>>,
}

impl DeviceManager {
    pub fn new(opener: Box<dyn DeviceOpener>) -> Arc<Self> {
        Arc::new(Self {
            opener,
            devices: Mutex::new(HashMap::new()),
        })
    }

    pub fn acquire(self: &Arc<Self>, device_id: &str) -> Result<DeviceLease, CaptureError> {
        let mut devices = self.devices();
        let device = match devices.get_mut(device_id) {
            Some(open) => {
                open.refs += 1;
                open.device.clone()
            }
            None => {
                let device = self.opener.open(device_id).map_err(|e| {
                    CaptureError::DeviceUnavailable {
                        device: device_id.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                log::info!("Opened capture device '{device_id}'");
                let device: SharedDevice = Arc::new(Mutex::new(device));
                devices.insert(
                    device_id.to_string(),
                    OpenDevice {
                        device: device.clone(),
                        refs: 1,
                    },
                );
                device
            }
        };

        Ok(DeviceLease {
            manager: Arc::clone(self),
            device_id: device_id.to_string(),
            device,
            released: false,
        })
    }

    /// Number of devices currently open.
    pub fn active_handles(&self) -> usize {
        self.devices().len()
    }

    pub fn ref_count(&self, device_id: &str) -> usize {
        self.devices().get(device_id).map_or(0, |d| d.refs)
    }

    fn release(&self, device_id: &str) {
        let mut devices = self.devices();
        let Some(open) = devices.get_mut(device_id) else {
            return;
        };
        open.refs = open.refs.saturating_sub(1);
        if open.refs > 0 {
            return;
        }
        if let Some(open) = devices.remove(device_id) {
            lock(&open.device).close();
            log::info!("Closed capture device '{device_id}'");
        }
    }

    fn devices(&self) -> MutexGuard<'_, HashMap<String, OpenDevice>> {
        lock(&self.devices)
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scoped hold on a shared device. Released exactly once, on `release` or drop.
pub struct DeviceLease {
    manager: Arc<DeviceManager>,
    device_id: String,
    device: SharedDevice,
    released: bool,
}

impl DeviceLease {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn read_frame(&self) -> Result<Option<Frame>, CaptureError> {
        if self.released {
            return Err(CaptureError::NotStarted);
        }
        lock(&self.device)
            .read_frame()
            .map_err(|e| CaptureError::Decode(e.to_string()))
    }

    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.manager.release(&self.device_id);
        }
    }
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        self.release();
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::CountingOpener;
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_acquire_opens_once_and_shares() {
        let opener = CountingOpener::default();
        let manager = DeviceManager::new(Box::new(opener.clone()));

        let a = manager.acquire("cam0").unwrap();
        let b = manager.acquire("cam0").unwrap();

        assert_eq!(opener.opened.load(Ordering::SeqCst), 1);
        assert_eq!(manager.ref_count("cam0"), 2);
        assert_eq!(manager.active_handles(), 1);
        drop(a);
        drop(b);
    }

    #[test]
    fn test_last_release_closes_device() {
        let opener = CountingOpener::default();
        let manager = DeviceManager::new(Box::new(opener.clone()));

        let mut a = manager.acquire("cam0").unwrap();
        let b = manager.acquire("cam0").unwrap();
        a.release();
        assert_eq!(opener.closed.load(Ordering::SeqCst), 0);
        drop(b);
        assert_eq!(opener.closed.load(Ordering::SeqCst), 1);
        assert_eq!(manager.active_handles(), 0);
    }

    #[test]
    fn test_release_twice_counts_once() {
        let opener = CountingOpener::default();
        let manager = DeviceManager::new(Box::new(opener.clone()));

        let mut a = manager.acquire("cam0").unwrap();
        let _b = manager.acquire("cam0").unwrap();
        a.release();
        a.release();
        drop(a);
        assert_eq!(manager.ref_count("cam0"), 1);
    }

    #[test]
    fn test_open_failure_is_device_unavailable() {
        let opener = CountingOpener {
            fail: true,
            ..CountingOpener::default()
        };
        let manager = DeviceManager::new(Box::new(opener));
        match manager.acquire("cam0") {
            Err(CaptureError::DeviceUnavailable { device, reason }) => {
                assert_eq!(device, "cam0");
                assert!(reason.contains("permission denied"));
            }
            _ => panic!("expected DeviceUnavailable"),
        }
        assert_eq!(manager.active_handles(), 0);
    }

    #[test]
    fn test_released_lease_refuses_reads() {
        let manager = DeviceManager::new(Box::new(CountingOpener::default()));
        let mut lease = manager.acquire("cam0").unwrap();
        assert!(lease.read_frame().unwrap().is_some());
        lease.release();
        assert!(matches!(lease.read_frame(), Err(CaptureError::NotStarted)));
    }

    #[test]
    fn test_distinct_devices_tracked_separately() {
        let manager = DeviceManager::new(Box::new(CountingOpener::default()));
        let _a = manager.acquire("cam0").unwrap();
        let _b = manager.acquire("cam1").unwrap();
        assert_eq!(manager.active_handles(), 2);
        assert_eq!(manager.ref_count("cam1"), 1);
        assert_eq!(manager.ref_count("missing"), 0);
    }
}
